//! Call parameters: JSON values and binary attachments.
//!
//! The caller decides at the call site whether a field is an ordinary value or
//! a file upload by choosing the [`Param`] variant. The pipeline never sniffs
//! value types at runtime.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A binary payload uploaded as its own multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    data: Vec<u8>,
    file_name: Option<String>,
}

impl Attachment {
    /// Creates an attachment from raw bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            file_name: None,
        }
    }

    /// Sets the file name sent with the part (defaults to the field name).
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The explicit file name, if one was set.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Scalar or structured value; sent as JSON or as a form field.
    Value(Value),
    /// Binary payload; forces the multipart path.
    Attachment(Attachment),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Attachment> for Param {
    fn from(value: Attachment) -> Self {
        Self::Attachment(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Named parameters for one remote call.
///
/// ```rust,ignore
/// let params = Params::new()
///     .with("chat_id", 42)
///     .with("caption", "look")
///     .with("photo", Attachment::new(png_bytes).with_file_name("cat.png"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    fields: BTreeMap<String, Param>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Param>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Inserts a parameter (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a parameter.
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.fields.get(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if any parameter is a binary attachment.
    pub fn has_attachments(&self) -> bool {
        self.fields
            .values()
            .any(|p| matches!(p, Param::Attachment(_)))
    }

    /// Splits into plain fields and attachments.
    pub fn partition(self) -> (Map<String, Value>, Vec<(String, Attachment)>) {
        let mut values = Map::new();
        let mut attachments = Vec::new();
        for (key, param) in self.fields {
            match param {
                Param::Value(v) => {
                    values.insert(key, v);
                }
                Param::Attachment(a) => attachments.push((key, a)),
            }
        }
        (values, attachments)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<Param>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TryFrom<Value> for Params {
    type Error = Value;

    /// Accepts a JSON object (or `null` as the empty set).
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(map.into()),
            Value::Null => Ok(Self::new()),
            other => Err(other),
        }
    }
}

/// Renders a plain value as multipart form text.
///
/// Strings go as-is, `null` is omitted, everything else is sent as JSON text
/// (the Bot API decodes structured fields like `reply_markup` from JSON).
pub(crate) fn form_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
