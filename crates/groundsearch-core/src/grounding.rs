//! Vertex AI grounding metadata, as typed structs.
//!
//! Wire shape (one block):
//!
//! ```json
//! {
//!   "groundingChunks": [{"web": {"uri": "https://vertexaisearch.cloud.google.com/...", "title": "idigbio.org"}}],
//!   "groundingSupports": [{"segment": {"startIndex": 341, "endIndex": 521, "text": "..."}, "groundingChunkIndices": [0]}]
//! }
//! ```
//!
//! Each struct implements [`Attributes`] using the wire (camelCase) field
//! names, so typed and raw-JSON metadata read the same way.

use crate::record::{Attributes, Record};
use serde::{Deserialize, Serialize};

/// Completion field carrying the grounding blocks.
pub const METADATA_FIELD: &str = "vertex_ai_grounding_metadata";
pub const CHUNKS_FIELD: &str = "groundingChunks";
pub const SUPPORTS_FIELD: &str = "groundingSupports";
pub const CHUNK_INDICES_FIELD: &str = "groundingChunkIndices";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingBlock {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_search_queries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_chunks: Vec<GroundingChunk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_supports: Vec<GroundingSupport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<TextSegment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grounding_chunk_indices: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence_scores: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Attributes for GroundingBlock {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            CHUNKS_FIELD => Record::list(&self.grounding_chunks),
            SUPPORTS_FIELD => Record::list(&self.grounding_supports),
            "webSearchQueries" => Record::List(
                self.web_search_queries
                    .iter()
                    .map(|q| Record::Text(q))
                    .collect(),
            ),
            _ => Record::Absent,
        }
    }
}

impl Attributes for GroundingChunk {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            "web" => Record::object(self.web.as_ref()),
            _ => Record::Absent,
        }
    }
}

impl Attributes for WebSource {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            "uri" => Record::text(self.uri.as_deref()),
            "title" => Record::text(self.title.as_deref()),
            "domain" => Record::text(self.domain.as_deref()),
            _ => Record::Absent,
        }
    }
}

impl Attributes for GroundingSupport {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            "segment" => Record::object(self.segment.as_ref()),
            CHUNK_INDICES_FIELD => Record::List(
                self.grounding_chunk_indices
                    .iter()
                    .map(|i| Record::Integer(*i))
                    .collect(),
            ),
            _ => Record::Absent,
        }
    }
}

impl Attributes for TextSegment {
    fn attribute(&self, name: &str) -> Record<'_> {
        match name {
            "text" => Record::text(self.text.as_deref()),
            "startIndex" => self.start_index.map(Record::Integer).unwrap_or(Record::Absent),
            "endIndex" => self.end_index.map(Record::Integer).unwrap_or(Record::Absent),
            _ => Record::Absent,
        }
    }
}
