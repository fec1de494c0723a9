//! Uniform read access to provider payloads.
//!
//! Grounding metadata reaches us in two shapes: raw JSON (when a provider
//! extension field is passed through untouched) and typed structs (when we
//! decoded it ourselves). [`Record`] puts both behind one lookup so the
//! extraction code never cares which shape it got. A missing key is
//! [`Record::Absent`], never an error.

use serde_json::Value;

/// A typed object that exposes named fields as [`Record`]s.
pub trait Attributes: Sync {
    fn attribute(&self, name: &str) -> Record<'_>;
}

#[derive(Clone)]
pub enum Record<'a> {
    Absent,
    Json(&'a Value),
    Object(&'a dyn Attributes),
    Text(&'a str),
    Integer(i64),
    List(Vec<Record<'a>>),
}

impl<'a> Record<'a> {
    pub fn text(s: Option<&'a str>) -> Self {
        s.map(Record::Text).unwrap_or(Record::Absent)
    }

    pub fn object<T: Attributes>(o: Option<&'a T>) -> Self {
        match o {
            Some(o) => Record::Object(o),
            None => Record::Absent,
        }
    }

    pub fn list<T: Attributes>(items: &'a [T]) -> Self {
        Record::List(
            items
                .iter()
                .map(|i| Record::Object(i as &dyn Attributes))
                .collect(),
        )
    }

    /// Field lookup. Works on JSON objects and typed objects; anything else
    /// (or a missing key) is `Absent`.
    pub fn get(&self, name: &str) -> Record<'a> {
        match *self {
            Record::Json(Value::Object(m)) => m.get(name).map(Record::Json).unwrap_or(Record::Absent),
            Record::Object(o) => o.attribute(name),
            _ => Record::Absent,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Record::Json(v) => v.as_str(),
            Record::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Non-negative integer, as a sequence position. Whole-number floats
    /// (`1.0`) count; fractional ones do not.
    pub fn as_index(&self) -> Option<usize> {
        match *self {
            Record::Json(v) => match v.as_u64() {
                Some(n) => usize::try_from(n).ok(),
                None => v
                    .as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= usize::MAX as f64)
                    .map(|f| f as usize),
            },
            Record::Integer(n) => usize::try_from(n).ok(),
            _ => None,
        }
    }

    /// Sequence elements; non-sequences yield nothing.
    pub fn items(&self) -> Vec<Record<'a>> {
        match self {
            Record::Json(Value::Array(a)) => a.iter().map(Record::Json).collect(),
            Record::List(l) => l.clone(),
            _ => Vec::new(),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Record::Json(Value::Array(_)) | Record::List(_))
    }

    /// True for absent, null, and empty strings/sequences/mappings.
    pub fn is_empty(&self) -> bool {
        match self {
            Record::Absent => true,
            Record::Json(v) => match v {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(a) => a.is_empty(),
                Value::Object(m) => m.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            },
            Record::Text(s) => s.is_empty(),
            Record::List(l) => l.is_empty(),
            Record::Object(_) | Record::Integer(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        label: String,
        x: i64,
    }

    impl Attributes for Point {
        fn attribute(&self, name: &str) -> Record<'_> {
            match name {
                "label" => Record::Text(&self.label),
                "x" => Record::Integer(self.x),
                _ => Record::Absent,
            }
        }
    }

    #[test]
    fn json_lookup_and_missing_keys() {
        let v = serde_json::json!({"a": {"b": "hi"}, "n": 3, "list": [1, 2]});
        let r = Record::Json(&v);
        assert_eq!(r.get("a").get("b").as_text(), Some("hi"));
        assert_eq!(r.get("n").as_index(), Some(3));
        assert_eq!(r.get("list").items().len(), 2);
        assert!(r.get("missing").is_empty());
        assert!(r.get("missing").get("deeper").is_empty());
        assert!(r.get("a").get("b").get("not_a_map").is_empty());
    }

    #[test]
    fn typed_lookup_matches_json_lookup() {
        let p = Point {
            label: "p".to_string(),
            x: 7,
        };
        let r = Record::Object(&p);
        assert_eq!(r.get("label").as_text(), Some("p"));
        assert_eq!(r.get("x").as_index(), Some(7));
        assert!(r.get("y").is_empty());
        assert!(!r.is_empty());
    }

    #[test]
    fn negative_and_non_integer_indices_are_rejected() {
        let v = serde_json::json!([-1, 1.5, "2"]);
        let items = Record::Json(&v).items();
        assert!(items.iter().all(|i| i.as_index().is_none()));
        assert_eq!(Record::Integer(-4).as_index(), None);
    }

    #[test]
    fn whole_number_float_index_is_accepted() {
        let v = serde_json::json!([1.0, 0.0, -1.0, 2.5]);
        let idx: Vec<_> = Record::Json(&v).items().iter().map(|i| i.as_index()).collect();
        assert_eq!(idx, vec![Some(1), Some(0), None, None]);
    }

    #[test]
    fn emptiness_follows_value_shape() {
        let null = serde_json::Value::Null;
        let empty_s = serde_json::json!("");
        let empty_a = serde_json::json!([]);
        let empty_o = serde_json::json!({});
        let zero = serde_json::json!(0);
        assert!(Record::Json(&null).is_empty());
        assert!(Record::Json(&empty_s).is_empty());
        assert!(Record::Json(&empty_a).is_empty());
        assert!(Record::Json(&empty_o).is_empty());
        assert!(!Record::Json(&zero).is_empty());
        assert!(Record::Text("").is_empty());
        assert!(Record::List(Vec::new()).is_empty());
    }
}
