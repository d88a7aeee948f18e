use crate::schema::Schema;
use serde_json::Value;

/// Object key of an archived record: `{source}/{schema}/{pk}###{sk}.json`.
///
/// `pk` and `sk` are embedded verbatim. A `/` inside them adds extra path levels; the
/// source of record is trusted to keep its key formats path-safe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArchiveKey(String);

impl ArchiveKey {
    pub fn derive(source: &str, schema: Schema, pk: &str, sk: &str) -> Self {
        Self(format!("{}/{}/{}###{}.json", source, schema.as_str(), pk, sk))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text of a key attribute. Strings are taken as-is, numbers as their decimal form.
pub fn key_segment(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
