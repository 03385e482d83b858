//! Turning a normalized reply into transcript entries.

use tracing::warn;

use chatframe_client::{MessageEnvelope, TextResponse};
use chatframe_core::{AltRenderings, ConversationTurnState, MessageDraft, ResponseCard};

/// Content type whose value doubles as the markdown rendering.
pub const CUSTOM_PAYLOAD: &str = "CustomPayload";

/// Bot messages for one reply, in display order.
///
/// A multi-message envelope yields one message per entry; the response
/// card rides only on the last one. `turn` is the state after the reply
/// was absorbed, so its dialog state is the reply's.
pub fn bot_messages(response: &TextResponse, turn: &ConversationTurnState) -> Vec<MessageDraft> {
    let context = response.app_context.as_ref();
    let base_alts = context.and_then(|ctx| ctx.alt_messages.clone());
    let card = context
        .and_then(|ctx| ctx.response_card.clone())
        .or_else(|| turn.response_card.clone());

    if MessageEnvelope::is_envelope(&response.message) {
        match MessageEnvelope::parse(&response.message) {
            Some(envelope) => return from_envelope(envelope, response, turn, base_alts, card),
            None => warn!("Unparsable message envelope; showing it as text"),
        }
    }

    let mut alts = base_alts;
    if response.message_format == CUSTOM_PAYLOAD {
        alts.get_or_insert_with(AltRenderings::default).markdown = Some(response.message.clone());
    }
    vec![MessageDraft {
        response_card: card,
        alts,
        ..MessageDraft::bot(response.message.clone()).with_dialog_state(turn.dialog_state.clone())
    }]
}

fn from_envelope(
    envelope: MessageEnvelope,
    response: &TextResponse,
    turn: &ConversationTurnState,
    base_alts: Option<AltRenderings>,
    card: Option<ResponseCard>,
) -> Vec<MessageDraft> {
    let last = envelope.messages.len().saturating_sub(1);
    envelope
        .messages
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let text = entry.text();
            let mut alts = base_alts.clone();
            if entry.content_type == CUSTOM_PAYLOAD {
                alts.get_or_insert_with(AltRenderings::default).markdown = Some(text.clone());
            }
            MessageDraft {
                response_card: if index == last { card.clone() } else { None },
                alts,
                response_cards_v2: response.response_card_lex_v2.clone(),
                is_last_in_group: entry.is_last_message_in_group,
                ..MessageDraft::bot(text).with_dialog_state(turn.dialog_state.clone())
            }
        })
        .collect()
}
