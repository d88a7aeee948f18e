use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record image: column name -> value, in source order.
pub type Image = Map<String, Value>;

/// Row-level mutation kind as emitted by the source of record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Insert,
    Modify,
    Remove,
    /// Anything the source emits that we don't recognise. Archived like a write.
    Other(String),
    #[default]
    Missing,
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Modify => "MODIFY",
            Operation::Remove => "REMOVE",
            Operation::Other(s) => s.as_str(),
            Operation::Missing => "",
        }
    }

    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Operation::Remove)
    }
}

impl From<String> for Operation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "INSERT" => Operation::Insert,
            "MODIFY" => Operation::Modify,
            "REMOVE" => Operation::Remove,
            "" => Operation::Missing,
            _ => Operation::Other(s),
        }
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope delivered by the event bus.
///
/// Only `source` is mandatory; everything below `detail` falls back to defaults so
/// that events without an image reach the no-op guard instead of failing to parse.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChangeEvent {
    pub source: String,
    #[serde(rename = "detail-type", default, skip_serializing_if = "Option::is_none")]
    pub detail_type: Option<String>,
    #[serde(default)]
    pub detail: EventDetail,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventDetail {
    #[serde(default)]
    pub data: ChangeData,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChangeData {
    #[serde(default)]
    pub operation: Operation,
    #[serde(rename = "newImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Image>,
    #[serde(rename = "oldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Image>,
}

impl ChangeEvent {
    pub fn new(source: impl Into<String>, operation: Operation) -> Self {
        Self {
            source: source.into(),
            detail_type: None,
            detail: EventDetail {
                data: ChangeData {
                    operation,
                    new_image: None,
                    old_image: None,
                },
            },
        }
    }

    pub fn with_new_image(mut self, image: Image) -> Self {
        self.detail.data.new_image = Some(image);
        self
    }

    pub fn with_old_image(mut self, image: Image) -> Self {
        self.detail.data.old_image = Some(image);
        self
    }

    #[inline]
    pub fn operation(&self) -> &Operation {
        &self.detail.data.operation
    }

    /// The image to archive: the new image when present, otherwise the old one.
    #[inline]
    pub fn image(&self) -> Option<&Image> {
        self.detail.data.image()
    }
}

impl ChangeData {
    pub fn image(&self) -> Option<&Image> {
        self.new_image.as_ref().or(self.old_image.as_ref())
    }
}
