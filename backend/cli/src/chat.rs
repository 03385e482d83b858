//! Interactive chat REPL over a [`ConversationSession`].

use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use chatframe_core::{Message, MessageKind, Submission};
use chatframe_session::{ConversationSession, SoundCue, SubmitOutcome};
use chatframe_store::Store;

use crate::terminal_output::{
    button_value, note_error, note_info, note_success, render_message, stream_write, supports_color, DIM,
    RESET,
};

/// Rings the terminal bell for the send/receive cues.
pub struct TerminalBell;

impl SoundCue for TerminalBell {
    fn play(&self, url: &str) {
        debug!(cue = %url, "Sound cue");
        let _ = stream_write(&mut std::io::stderr(), "\x07");
    }
}

/// What the user typed, decoded.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Quit,
    NewSession,
    EndSession,
    ToggleSfx,
    Feedback { positive: bool },
    Help,
    Say(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/new" => Input::NewSession,
        "/end" => Input::EndSession,
        "/sfx" => Input::ToggleSfx,
        "/good" => Input::Feedback { positive: true },
        "/bad" => Input::Feedback { positive: false },
        "/help" => Input::Help,
        text => Input::Say(text.to_string()),
    }
}

/// A bare number picks a button from the latest bot message.
fn to_submission(text: &str, last_bot: Option<&Message>) -> Submission {
    let picked = text
        .parse::<usize>()
        .ok()
        .zip(last_bot)
        .and_then(|(choice, message)| button_value(message, choice));
    match picked {
        Some(value) => Submission::new(MessageKind::Button, value),
        None => Submission::human(text),
    }
}

pub async fn run(session: ConversationSession) -> Result<()> {
    let color = supports_color();
    session
        .init_message_list()
        .await
        .context("Failed to restore the transcript")?;
    let mut printed = print_new(session.store(), 0, color).await;
    note_info("Type a message or a button number. Commands: /good /bad /help /new /end /sfx /quit");

    let echo = spawn_stream_echo(session.store().clone(), color);
    if let Some(SubmitOutcome::Failed { error }) = session.send_initial_utterance().await {
        debug!(%error, "Initial utterance failed");
    }
    printed = print_new(session.store(), printed, color).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stream_write(&mut std::io::stdout(), "> ")?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::NewSession => match session.start_new_session().await {
                Ok(_) => note_success("Started a new session"),
                Err(e) => note_error(&format!("Could not start a session: {e}")),
            },
            Input::EndSession => match session.delete_session().await {
                Ok(_) => note_success("Session ended"),
                Err(e) => note_error(&format!("Could not end the session: {e}")),
            },
            Input::ToggleSfx => {
                session.toggle_sfx().await;
                let on = session.store().read(|s| s.is_sfx_on).await;
                note_info(if on { "Sound cues on" } else { "Sound cues off" });
            }
            Input::Feedback { positive } => {
                let submission = session
                    .store()
                    .read(|s| {
                        let intent = if positive {
                            &s.config.ui.positive_feedback_intent
                        } else {
                            &s.config.ui.negative_feedback_intent
                        };
                        let response = s
                            .messages
                            .iter()
                            .rev()
                            .find(|m| m.kind == MessageKind::Bot)
                            .map(|m| m.text.clone());
                        Submission::feedback(intent.clone(), s.last_utterance().map(str::to_string), response)
                    })
                    .await;
                session.submit(submission).await;
            }
            Input::Help => {
                let intent = session.store().read(|s| s.config.ui.help_intent.clone()).await;
                if intent.is_empty() {
                    note_info("No help intent is configured");
                } else {
                    session.submit(Submission::human(intent)).await;
                }
            }
            Input::Say(text) => {
                let last_bot = session
                    .store()
                    .read(|s| s.messages.iter().rev().find(|m| m.kind == MessageKind::Bot).cloned())
                    .await;
                session.submit(to_submission(&text, last_bot.as_ref())).await;
            }
        }
        printed = print_new(session.store(), printed, color).await;
    }
    echo.abort();
    Ok(())
}

/// Print bot messages added since `from`; returns the new transcript length.
async fn print_new(store: &Store, from: usize, color: bool) -> usize {
    let (messages, len) = store
        .read(|s| (s.messages.iter().skip(from).cloned().collect::<Vec<_>>(), s.messages.len()))
        .await;
    let mut stdout = std::io::stdout().lock();
    for message in messages.iter().filter(|m| m.kind == MessageKind::Bot) {
        let _ = writeln!(stdout, "{}", render_message(message, color));
    }
    len
}

/// Echo streamed text as it is typed, ahead of the final message.
fn spawn_stream_echo(store: Store, color: bool) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        let mut shown = 0;
        loop {
            match changes.recv().await {
                Ok(change) if change.mutation == "typeStreamChunk" => {
                    let text = store.read(|s| s.streaming.text.clone()).await;
                    if text.len() < shown {
                        shown = 0;
                    }
                    if let Some(fresh) = text.get(shown..).filter(|t| !t.is_empty()) {
                        let fresh = if color { format!("{DIM}{fresh}{RESET}") } else { fresh.to_string() };
                        let _ = stream_write(&mut std::io::stdout(), &fresh);
                        shown = text.len();
                    }
                }
                Ok(change) if change.mutation == "setStreamingActive" && shown > 0 => {
                    let _ = stream_write(&mut std::io::stdout(), "\n");
                    shown = 0;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}
