use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{AltRenderings, ResponseCard};

/// Who (or what) produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Human,
    Bot,
    Button,
    Feedback,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Human => "human",
            MessageKind::Bot => "bot",
            MessageKind::Button => "button",
            MessageKind::Feedback => "feedback",
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(MessageKind::Human),
            "bot" => Ok(MessageKind::Bot),
            "button" => Ok(MessageKind::Button),
            "feedback" => Ok(MessageKind::Feedback),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// A transcript entry owned by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: usize,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
    #[serde(default)]
    pub dialog_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_card: Option<ResponseCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alts: Option<AltRenderings>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_cards_v2: Vec<ResponseCard>,
    #[serde(default = "default_true")]
    pub is_last_in_group: bool,
}

fn default_true() -> bool {
    true
}

/// A message before the store assigns its id and date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageDraft {
    pub kind: MessageKind,
    pub text: String,
    pub dialog_state: String,
    pub response_card: Option<ResponseCard>,
    pub alts: Option<AltRenderings>,
    pub response_cards_v2: Vec<ResponseCard>,
    pub is_last_in_group: bool,
}

impl MessageDraft {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            is_last_in_group: true,
            ..Default::default()
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Bot, text)
    }

    pub fn with_dialog_state(mut self, dialog_state: impl Into<String>) -> Self {
        self.dialog_state = dialog_state.into();
        self
    }

    pub fn with_alts(mut self, alts: AltRenderings) -> Self {
        self.alts = Some(alts);
        self
    }

    /// Stamp the draft with its transcript position.
    pub fn into_message(self, id: usize, date: DateTime<Utc>) -> Message {
        Message {
            id,
            date,
            kind: self.kind,
            text: self.text,
            dialog_state: self.dialog_state,
            response_card: self.response_card,
            alts: self.alts,
            response_cards_v2: self.response_cards_v2,
            is_last_in_group: self.is_last_in_group,
        }
    }
}

/// Extra data the backend needs to attribute a feedback submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackContext {
    pub prompt: Option<String>,
    pub response: Option<String>,
}

/// A user submission headed for the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kind: MessageKind,
    pub text: String,
    pub feedback: Option<FeedbackContext>,
}

impl Submission {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            feedback: None,
        }
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, text)
    }

    pub fn feedback(
        text: impl Into<String>,
        prompt: Option<String>,
        response: Option<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Feedback,
            text: text.into(),
            feedback: Some(FeedbackContext { prompt, response }),
        }
    }

    /// The transcript entry echoing this submission.
    pub fn to_draft(&self) -> MessageDraft {
        MessageDraft::new(self.kind, self.text.clone())
    }
}
