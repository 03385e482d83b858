//! Reply normalization.
//!
//! The backend answers in one of two shapes. The legacy shape carries
//! `dialogState`, `intentName`, `message`, ... at the top level. The newer
//! shape nests them under `sessionState` and returns a list of typed
//! message fragments. Newer replies are rewritten into the legacy shape so
//! the rest of the widget only deals with one.

use serde_json::{Map, Value};
use tracing::debug;

use chatframe_core::{AppContext, ChatError, ResponseCard};

use crate::wire::{LegacyMessage, MessageEnvelope, TextResponse};

const IMAGE_RESPONSE_CARD: &str = "ImageResponseCard";

/// Normalize a `POST /text` reply body.
pub fn normalize_text_response(body: Value) -> Result<TextResponse, ChatError> {
    let legacy = if body.get("sessionState").is_some_and(Value::is_object) {
        debug!("Normalizing sessionState-shaped reply");
        rewrite_session_state(&body)?
    } else {
        body.clone()
    };

    let mut response: TextResponse = serde_json::from_value(legacy)
        .map_err(|e| ChatError::Decode(format!("invalid text response: {e}")))?;
    response.app_context = AppContext::from_attributes(&response.session_attributes)?;
    response.raw = body;
    Ok(response)
}

fn rewrite_session_state(body: &Value) -> Result<Value, ChatError> {
    let mut out = body.as_object().cloned().unwrap_or_default();
    let session_state = &body["sessionState"];

    out.insert(
        "sessionAttributes".into(),
        object_or_empty(&session_state["sessionAttributes"]),
    );

    match session_state.get("intent").filter(|i| i.is_object()) {
        Some(intent) => {
            out.insert("intentName".into(), string_or_empty(&intent["name"]));
            out.insert("slots".into(), object_or_empty(&intent["slots"]));
            out.insert("dialogState".into(), string_or_empty(&intent["state"]));
            out.insert(
                "slotToElicit".into(),
                string_or_empty(&session_state["dialogAction"]["slotToElicit"]),
            );
        }
        None => {
            // ElicitIntent and similar replies carry no active intent.
            let intent = &body["interpretations"][0]["intent"];
            out.insert("intentName".into(), string_or_empty(&intent["name"]));
            out.insert("slots".into(), object_or_empty(&intent["slots"]));
            out.insert("dialogState".into(), Value::String(String::new()));
            out.insert("slotToElicit".into(), Value::String(String::new()));
        }
    }

    let mut entries = Vec::new();
    let mut cards = Vec::new();
    for fragment in body["messages"].as_array().into_iter().flatten() {
        let content_type = fragment["contentType"].as_str().unwrap_or_default();
        if content_type == IMAGE_RESPONSE_CARD {
            let attachment = serde_json::from_value(fragment["imageResponseCard"].clone())
                .map_err(|e| ChatError::Decode(format!("invalid imageResponseCard: {e}")))?;
            cards.push(ResponseCard::generic(attachment));
        } else if !content_type.is_empty() {
            entries.push(LegacyMessage::new(content_type, fragment["content"].clone(), false));
        }
    }

    match entries.last_mut() {
        Some(last) => last.is_last_message_in_group = true,
        // Most likely only an image card came back.
        None => entries.push(LegacyMessage::new("PlainText", Value::String(String::new()), true)),
    }

    out.insert("message".into(), Value::String(MessageEnvelope { messages: entries }.encode()));
    if !cards.is_empty() {
        let cards = serde_json::to_value(cards)
            .map_err(|e| ChatError::Decode(format!("cannot encode response cards: {e}")))?;
        out.insert("responseCardLexV2".into(), cards);
    }
    Ok(Value::Object(out))
}

fn string_or_empty(value: &Value) -> Value {
    Value::String(value.as_str().unwrap_or_default().to_string())
}

fn object_or_empty(value: &Value) -> Value {
    match value {
        Value::Object(_) => value.clone(),
        _ => Value::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(resp: &TextResponse) -> MessageEnvelope {
        MessageEnvelope::parse(&resp.message).unwrap()
    }

    #[test]
    fn session_state_reply_becomes_legacy_list_and_cards() {
        let body = json!({
            "sessionState": {
                "sessionAttributes": {"topic": "orders"},
                "intent": {"name": "OrderFlowers", "slots": {"FlowerType": null}, "state": "InProgress"},
                "dialogAction": {"type": "ElicitSlot", "slotToElicit": "FlowerType"}
            },
            "messages": [
                {"contentType": "PlainText", "content": "Which flowers?"},
                {"contentType": "ImageResponseCard", "imageResponseCard": {
                    "title": "Flowers", "subtitle": "Pick one",
                    "buttons": [{"text": "Roses", "value": "roses"}]
                }}
            ]
        });

        let resp = normalize_text_response(body.clone()).unwrap();
        assert_eq!(resp.intent_name, "OrderFlowers");
        assert_eq!(resp.dialog_state, "InProgress");
        assert_eq!(resp.slot_to_elicit, "FlowerType");
        assert_eq!(resp.session_attributes["topic"], "orders");

        let env = envelope(&resp);
        assert_eq!(env.messages.len(), 1);
        assert_eq!(env.messages[0].text(), "Which flowers?");
        assert!(env.messages[0].is_last_message_in_group);

        assert_eq!(resp.response_card_lex_v2.len(), 1);
        let card = &resp.response_card_lex_v2[0];
        assert_eq!(card.version, "1");
        assert_eq!(card.content_type, "application/vnd.amazonaws.card.generic");
        assert_eq!(card.generic_attachments[0].sub_title.as_deref(), Some("Pick one"));
        assert_eq!(resp.raw, body);
    }

    #[test]
    fn only_last_fragment_is_last_in_group() {
        let body = json!({
            "sessionState": {"intent": {"name": "A", "state": "Fulfilled"}, "dialogAction": {}},
            "messages": [
                {"contentType": "PlainText", "content": "one"},
                {"contentType": "CustomPayload", "content": "**two**"},
                {"contentType": "PlainText", "content": "three"}
            ]
        });
        let env = envelope(&normalize_text_response(body).unwrap());
        let flags: Vec<_> = env.messages.iter().map(|m| m.is_last_message_in_group).collect();
        assert_eq!(flags, vec![false, false, true]);
        assert_eq!(env.messages[1].content_type, "CustomPayload");
    }

    #[test]
    fn card_only_reply_gets_placeholder_message() {
        let body = json!({
            "sessionState": {"intent": {"name": "A", "state": "ElicitSlot"}, "dialogAction": {}},
            "messages": [{"contentType": "ImageResponseCard", "imageResponseCard": {"title": "t"}}]
        });
        let resp = normalize_text_response(body).unwrap();
        let env = envelope(&resp);
        assert_eq!(env.messages, vec![LegacyMessage::new("PlainText", json!(""), true)]);
        assert_eq!(resp.response_card_lex_v2.len(), 1);
    }

    #[test]
    fn missing_intent_falls_back_to_first_interpretation() {
        let body = json!({
            "sessionState": {"sessionAttributes": {}, "dialogAction": {"type": "ElicitIntent"}},
            "interpretations": [{"intent": {"name": "FallbackIntent", "slots": {}}}],
            "messages": []
        });
        let resp = normalize_text_response(body).unwrap();
        assert_eq!(resp.intent_name, "FallbackIntent");
        assert_eq!(resp.dialog_state, "");
        assert_eq!(resp.slot_to_elicit, "");
    }

    #[test]
    fn legacy_reply_passes_through() {
        let body = json!({
            "dialogState": "Fulfilled",
            "intentName": "Greet",
            "message": "Hello there",
            "messageFormat": "PlainText",
            "sessionAttributes": {"appContext": "{\"altMessages\":{\"markdown\":\"**Hello**\"}}"}
        });
        let resp = normalize_text_response(body).unwrap();
        assert_eq!(resp.message, "Hello there");
        assert_eq!(resp.dialog_state, "Fulfilled");
        let ctx = resp.app_context.unwrap();
        assert_eq!(ctx.alt_messages.unwrap().markdown.as_deref(), Some("**Hello**"));
    }

    #[test]
    fn unparsable_app_context_is_decode_error() {
        let body = json!({"sessionAttributes": {"appContext": "{broken"}});
        let err = normalize_text_response(body).unwrap_err();
        assert!(matches!(err, ChatError::Decode(_)));
    }
}
