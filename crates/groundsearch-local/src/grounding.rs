//! Turn grounding metadata into `{quote, source}` pairs.
//!
//! The work splits into a pure pass ([`collect_citations`]) that walks blocks,
//! supports and chunk indices, and an I/O pass that resolves each distinct
//! citation URI once ([`ResolutionCache`]) before deduplicating in encounter
//! order. Malformed metadata only ever drops entries.

use futures_util::stream::{self, StreamExt};
use groundsearch_core::grounding::{
    CHUNKS_FIELD, CHUNK_INDICES_FIELD, METADATA_FIELD, SUPPORTS_FIELD,
};
use groundsearch_core::{Record, RedirectResolver, SourcePair};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Chunk position -> citation URI. Chunks without a non-empty `web.uri` are omitted.
pub fn index_chunks<'a>(chunks: &[Record<'a>]) -> BTreeMap<usize, &'a str> {
    chunks
        .iter()
        .enumerate()
        .filter_map(|(i, chunk)| {
            let uri = chunk.get("web").get("uri").as_text()?;
            (!uri.is_empty()).then_some((i, uri))
        })
        .collect()
}

/// A quote paired with the raw (unresolved) URI of one chunk it cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub quote: String,
    pub uri: String,
}

/// Walk the completion's grounding metadata and list every usable
/// (quote, chunk URI) reference, in block/support/index order.
///
/// No network. Returns empty when the metadata field is missing or empty.
pub fn collect_citations(completion: &Record<'_>) -> Vec<Citation> {
    let meta = completion.get(METADATA_FIELD);
    if meta.is_empty() {
        return Vec::new();
    }
    // Providers normally send a list of blocks; accept a bare block too.
    let blocks = if meta.is_sequence() {
        meta.items()
    } else {
        vec![meta]
    };

    let mut out = Vec::new();
    for block in &blocks {
        let chunk_uris = index_chunks(&block.get(CHUNKS_FIELD).items());
        for support in block.get(SUPPORTS_FIELD).items() {
            let quote = support
                .get("segment")
                .get("text")
                .as_text()
                .filter(|q| !q.is_empty());
            for idx in support.get(CHUNK_INDICES_FIELD).items() {
                let uri = idx.as_index().and_then(|i| chunk_uris.get(&i));
                let (Some(quote), Some(uri)) = (quote, uri) else {
                    continue;
                };
                out.push(Citation {
                    quote: quote.to_string(),
                    uri: (*uri).to_string(),
                });
            }
        }
    }
    out
}

/// Original URI -> resolved URL, owned by one extraction call.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    resolved: HashMap<String, String>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<&str> {
        self.resolved.get(uri).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Resolve one URI, reusing an earlier result when there is one.
    pub async fn resolve<R>(&mut self, resolver: &R, uri: &str) -> String
    where
        R: RedirectResolver + ?Sized,
    {
        if let Some(hit) = self.resolved.get(uri) {
            return hit.clone();
        }
        let final_url = resolver.resolve(uri).await;
        self.resolved.insert(uri.to_string(), final_url.clone());
        final_url
    }

    /// Resolve every not-yet-cached URI, at most `parallelism` at a time.
    /// Each distinct URI is handed to the resolver exactly once.
    pub async fn resolve_all<'u, R, I>(&mut self, resolver: &R, uris: I, parallelism: usize)
    where
        R: RedirectResolver + ?Sized,
        I: IntoIterator<Item = &'u str>,
    {
        let mut pending: Vec<&str> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();
        for uri in uris {
            if !self.resolved.contains_key(uri) && queued.insert(uri) {
                pending.push(uri);
            }
        }
        if pending.is_empty() {
            return;
        }

        if parallelism <= 1 {
            for uri in pending {
                self.resolve(resolver, uri).await;
            }
            return;
        }

        // Owned URIs keep the stream future `Send`.
        let results: Vec<(String, String)> =
            stream::iter(pending.into_iter().map(str::to_owned))
                .map(|uri: String| async move {
                    let final_url = resolver.resolve(&uri).await;
                    (uri, final_url)
                })
                .buffer_unordered(parallelism)
                .collect()
                .await;
        for (uri, final_url) in results {
            self.resolved.insert(uri, final_url);
        }
    }
}

/// Extracts deduplicated `{quote, source}` pairs from a model completion.
pub struct GroundingExtractor<'r, R: RedirectResolver + ?Sized> {
    resolver: &'r R,
    parallelism: usize,
}

impl<'r, R: RedirectResolver + ?Sized> GroundingExtractor<'r, R> {
    pub fn new(resolver: &'r R) -> Self {
        Self {
            resolver,
            parallelism: 1,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub async fn extract(&self, completion: &Record<'_>) -> Vec<SourcePair> {
        let citations = collect_citations(completion);
        if citations.is_empty() {
            return Vec::new();
        }

        let mut cache = ResolutionCache::new();
        cache
            .resolve_all(
                self.resolver,
                citations.iter().map(|c| c.uri.as_str()),
                self.parallelism,
            )
            .await;
        tracing::debug!(
            citations = citations.len(),
            distinct_uris = cache.len(),
            "resolved grounding citations"
        );

        dedup_sources(citations, &cache)
    }
}

fn dedup_sources(citations: Vec<Citation>, cache: &ResolutionCache) -> Vec<SourcePair> {
    let mut seen: HashSet<SourcePair> = HashSet::new();
    let mut out = Vec::new();
    for c in citations {
        let source = match cache.get(&c.uri) {
            Some(s) => s.to_string(),
            None => c.uri,
        };
        let pair = SourcePair {
            quote: c.quote,
            source,
        };
        if seen.insert(pair.clone()) {
            out.push(pair);
        }
    }
    out
}
