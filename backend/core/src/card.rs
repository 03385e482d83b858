//! Response cards, alternate renderings, and the app-context side channel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatError;

/// Content type of the versioned generic card envelope.
pub const GENERIC_CARD_CONTENT_TYPE: &str = "application/vnd.amazonaws.card.generic";

/// Structured suggestion/button payload attached to a bot message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCard {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub generic_attachments: Vec<GenericAttachment>,
}

impl ResponseCard {
    /// Wrap a single attachment in the version "1" generic envelope.
    pub fn generic(attachment: GenericAttachment) -> Self {
        Self {
            version: "1".to_string(),
            content_type: GENERIC_CARD_CONTENT_TYPE.to_string(),
            generic_attachments: vec![attachment],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The newer card shape spells this `subtitle`.
    #[serde(default, alias = "subtitle", skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_link_url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<CardButton>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardButton {
    pub text: String,
    pub value: String,
}

/// Alternate renderings of a bot message (markdown, ssml, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AltRenderings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssml: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AltRenderings {
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            markdown: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Payload carried JSON-encoded in the `appContext` session attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_card: Option<ResponseCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_messages: Option<AltRenderings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AppContext {
    /// Name of the session attribute that carries the encoded context.
    pub const ATTRIBUTE: &'static str = "appContext";

    /// Parse the encoded attribute value.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        serde_json::from_str(raw).map_err(|e| {
            ChatError::Decode(format!("error parsing appContext in sessionAttributes: {e}"))
        })
    }

    /// Extract the context from a session-attribute bag, if one is present.
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Option<Self>, ChatError> {
        match attributes.get(Self::ATTRIBUTE) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => Self::parse(raw).map(Some),
            Some(other) => serde_json::from_value(other.clone())
                .map(Some)
                .map_err(|e| ChatError::Decode(format!("invalid appContext: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_app_context_with_card_and_alts() {
        let raw = json!({
            "responseCard": {
                "version": "1",
                "contentType": GENERIC_CARD_CONTENT_TYPE,
                "genericAttachments": [{"title": "Pick", "buttons": [{"text": "A", "value": "a"}]}]
            },
            "altMessages": {"markdown": "**hi**"}
        })
        .to_string();
        let ctx = AppContext::parse(&raw).unwrap();
        let card = ctx.response_card.unwrap();
        assert_eq!(card.generic_attachments[0].buttons[0].value, "a");
        assert_eq!(ctx.alt_messages.unwrap().markdown.as_deref(), Some("**hi**"));
    }

    #[test]
    fn missing_attribute_is_none() {
        let attrs = Map::new();
        assert!(AppContext::from_attributes(&attrs).unwrap().is_none());
    }

    #[test]
    fn garbage_attribute_is_a_decode_error() {
        let mut attrs = Map::new();
        attrs.insert("appContext".into(), Value::String("{not json".into()));
        let err = AppContext::from_attributes(&attrs).unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }

    #[test]
    fn subtitle_alias_is_accepted() {
        let att: GenericAttachment =
            serde_json::from_value(json!({"title": "t", "subtitle": "s"})).unwrap();
        assert_eq!(att.sub_title.as_deref(), Some("s"));
    }
}
