//! The update envelope delivered by the Bot API.
//!
//! An [`Update`] is kept as an opaque JSON object: the core only ever looks at
//! field *names* (for structural matching) and at the text payload of a
//! message or channel post (for content matching). The full schema of the
//! remote data types is deliberately not modelled here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of payload kinds an update can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
}

impl UpdateKind {
    /// Every kind, in Bot API documentation order.
    pub const ALL: [UpdateKind; 9] = [
        Self::Message,
        Self::EditedMessage,
        Self::ChannelPost,
        Self::EditedChannelPost,
        Self::InlineQuery,
        Self::ChosenInlineResult,
        Self::CallbackQuery,
        Self::ShippingQuery,
        Self::PreCheckoutQuery,
    ];

    /// The JSON field name carrying this kind's payload.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// One event delivered by the remote service.
///
/// Serializes transparently as the underlying JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Update {
    fields: Map<String, Value>,
}

impl Update {
    /// Wraps a JSON object as an update.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Converts an arbitrary JSON value, returning `None` if it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// The monotonically assigned identifier, if the envelope carries one.
    pub fn update_id(&self) -> Option<i64> {
        self.fields.get("update_id").and_then(Value::as_i64)
    }

    /// Returns `true` if a field with this name exists on the envelope.
    ///
    /// Presence is by key: a field explicitly set to `null` still counts.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns the named field if it exists and is not `null`.
    pub fn populated(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// The first populated payload kind, if any.
    pub fn kind(&self) -> Option<UpdateKind> {
        UpdateKind::ALL
            .into_iter()
            .find(|kind| self.populated(kind.field_name()).is_some())
    }

    /// The payload object for the given kind.
    pub fn payload(&self, kind: UpdateKind) -> Option<&Value> {
        self.populated(kind.field_name())
    }

    /// Non-empty text of the `message` payload.
    pub fn message_text(&self) -> Option<&str> {
        self.payload_text(UpdateKind::Message)
    }

    /// Non-empty text of the `channel_post` payload.
    pub fn channel_post_text(&self) -> Option<&str> {
        self.payload_text(UpdateKind::ChannelPost)
    }

    /// The text content matchers run against: the message text, falling back
    /// to the channel post text.
    pub fn text(&self) -> Option<&str> {
        self.message_text().or_else(|| self.channel_post_text())
    }

    /// Returns `true` if the payload carries a non-empty `text` field.
    pub fn is_message_type(payload: &Value) -> bool {
        payload
            .get("text")
            .and_then(Value::as_str)
            .is_some_and(|t| !t.is_empty())
    }

    /// Iterates over the field names present on the envelope.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Borrows the raw JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the update, returning the raw JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    fn payload_text(&self, kind: UpdateKind) -> Option<&str> {
        self.payload(kind)
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

impl TryFrom<Value> for Update {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: Value) -> Update {
        Update::from_value(value).unwrap()
    }

    #[test]
    fn test_update_id_and_kind() {
        let u = update(json!({
            "update_id": 42,
            "callback_query": { "id": "1", "data": "x" }
        }));
        assert_eq!(u.update_id(), Some(42));
        assert_eq!(u.kind(), Some(UpdateKind::CallbackQuery));
        assert!(u.has_field("callback_query"));
        assert!(!u.has_field("message"));
    }

    #[test]
    fn test_text_prefers_message_then_channel_post() {
        let u = update(json!({ "update_id": 1, "channel_post": { "text": "hi" } }));
        assert_eq!(u.text(), Some("hi"));
        assert_eq!(u.message_text(), None);

        let u = update(json!({ "update_id": 1, "message": { "text": "" } }));
        assert_eq!(u.text(), None);
    }

    #[test]
    fn test_null_field_is_present_but_not_populated() {
        let u = update(json!({ "update_id": 1, "message": null }));
        assert!(u.has_field("message"));
        assert!(u.populated("message").is_none());
        assert_eq!(u.kind(), None);
    }

    #[test]
    fn test_is_message_type() {
        assert!(Update::is_message_type(&json!({ "text": "a" })));
        assert!(!Update::is_message_type(&json!({ "text": "" })));
        assert!(!Update::is_message_type(&json!({ "photo": [] })));
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(Update::from_value(json!([1, 2])).is_none());
        assert!(Update::try_from(json!("x")).is_err());
    }
}
