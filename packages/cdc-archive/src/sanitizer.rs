//! Column-name sanitization and image flattening.
//!
//! Query engines reading the archive only accept lowercase `[a-z0-9_]` column names that
//! don't start with a digit, and infer one type per column. Nested values are therefore
//! stored as JSON text instead of structs.
//!
//! Two raw keys that sanitize to the same column collide; the later one in image order wins.

use crate::event::Image;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref INVALID_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_]").unwrap();
    static ref LEADING_DIGIT: Regex = Regex::new(r"^([0-9])").unwrap();
    static ref TRAILING_UNDERSCORES: Regex = Regex::new(r"_+$").unwrap();
}

/// Map a raw field name to an archive-safe column name. Idempotent; may return `""`.
pub fn sanitize_column_name(name: &str) -> String {
    let sanitized = INVALID_CHARS.replace_all(name, "");
    let sanitized = LEADING_DIGIT.replace(&sanitized, "_$1");
    let sanitized = TRAILING_UNDERSCORES.replace(&sanitized, "");
    sanitized.to_lowercase()
}

/// Sanitize every key and serialize composite values to compact JSON strings.
pub fn flatten_image(image: &Image) -> Image {
    let mut flat = Image::new();
    for (key, value) in image {
        let value = match value {
            Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
            scalar => scalar.clone(),
        };
        flat.insert(sanitize_column_name(key), value);
    }
    flat
}
