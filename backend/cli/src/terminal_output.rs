//! Terminal output: ANSI styling, notes, and transcript rendering.

use std::io::Write;

use chatframe_core::{Message, MessageKind, ResponseCard};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn paint(text: &str, style: &str, color: bool) -> String {
    if color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

/// One transcript entry as printed in the chat REPL.
///
/// Bot messages prefer their markdown rendering. Card buttons are listed
/// underneath, numbered so the user can pick one.
pub fn render_message(message: &Message, color: bool) -> String {
    let (label, style) = match message.kind {
        MessageKind::Bot => ("bot", CYAN),
        MessageKind::Human => ("you", GREEN),
        MessageKind::Button => ("you", GREEN),
        MessageKind::Feedback => ("feedback", YELLOW),
    };
    let text = message
        .alts
        .as_ref()
        .and_then(|alts| alts.markdown.as_deref())
        .unwrap_or(&message.text);

    let mut out = format!("{} {text}", paint(&format!("{label}>"), &format!("{BOLD}{style}"), color));
    if !message.dialog_state.is_empty() && message.kind == MessageKind::Bot {
        out.push(' ');
        out.push_str(&paint(&format!("[{}]", message.dialog_state), DIM, color));
    }
    for (index, button) in card_buttons(message).into_iter().enumerate() {
        out.push_str(&format!("\n  {} {button}", paint(&format!("{}.", index + 1), DIM, color)));
    }
    out
}

/// Button labels offered by a message's cards, in order.
pub fn card_buttons(message: &Message) -> Vec<String> {
    let cards = message.response_card.iter().chain(message.response_cards_v2.iter());
    cards.flat_map(buttons_of).collect()
}

/// Value to submit when the user picks the `choice`-th button (1-based).
pub fn button_value(message: &Message, choice: usize) -> Option<String> {
    let cards = message.response_card.iter().chain(message.response_cards_v2.iter());
    cards
        .flat_map(|card| card.generic_attachments.iter())
        .flat_map(|attachment| attachment.buttons.iter())
        .nth(choice.checked_sub(1)?)
        .map(|button| button.value.clone())
}

fn buttons_of(card: &ResponseCard) -> Vec<String> {
    card.generic_attachments
        .iter()
        .flat_map(|attachment| attachment.buttons.iter().map(|b| b.text.clone()))
        .collect()
}

/// Write a chunk and flush.
pub fn stream_write(writer: &mut impl Write, chunk: &str) -> std::io::Result<()> {
    writer.write_all(chunk.as_bytes())?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatframe_core::{AltRenderings, CardButton, GenericAttachment, MessageDraft};
    use chrono::Utc;

    fn bot_with_card() -> Message {
        let card = ResponseCard::generic(GenericAttachment {
            title: Some("Size".into()),
            buttons: vec![
                CardButton { text: "Small".into(), value: "small".into() },
                CardButton { text: "Large".into(), value: "large".into() },
            ],
            ..Default::default()
        });
        MessageDraft {
            response_card: Some(card),
            ..MessageDraft::bot("Which size?").with_dialog_state("ElicitSlot")
        }
        .into_message(1, Utc::now())
    }

    #[test]
    fn strips_ansi() {
        let colored = format!("{GREEN}hello{RESET}");
        assert_eq!(strip_ansi(&colored), "hello");
    }

    #[test]
    fn bot_message_lists_numbered_buttons() {
        let rendered = render_message(&bot_with_card(), false);
        assert_eq!(rendered, "bot> Which size? [ElicitSlot]\n  1. Small\n  2. Large");
    }

    #[test]
    fn colored_output_strips_to_plain() {
        let message = bot_with_card();
        assert_eq!(strip_ansi(&render_message(&message, true)), render_message(&message, false));
    }

    #[test]
    fn button_choice_maps_to_value() {
        let message = bot_with_card();
        assert_eq!(button_value(&message, 2).as_deref(), Some("large"));
        assert_eq!(button_value(&message, 0), None);
        assert_eq!(button_value(&message, 3), None);
    }

    #[test]
    fn markdown_rendering_wins() {
        let message = MessageDraft::bot("plain")
            .with_alts(AltRenderings::markdown("**rich**"))
            .into_message(0, Utc::now());
        assert_eq!(render_message(&message, false), "bot> **rich**");
    }
}
