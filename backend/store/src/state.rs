//! The widget state tree.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use chatframe_config::WidgetConfig;
use chatframe_core::{ConversationTurnState, Message};

/// Maximum number of utterances kept for recall; the oldest is evicted.
pub const UTTERANCE_HISTORY_CAP: usize = 1000;

/// Who answers the user's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatMode {
    #[default]
    Bot,
    LiveChat,
}

/// Streamed reply being typed into the transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    /// Chunks received so far.
    pub buffer: Vec<String>,
    /// Index of the next chunk to type.
    pub cursor: usize,
    /// Text typed so far.
    pub text: String,
    pub is_active: bool,
}

impl StreamState {
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.text.clear();
    }

    /// Whether buffered chunks remain to be typed.
    pub fn has_pending(&self) -> bool {
        self.cursor < self.buffer.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub config: WidgetConfig,
    /// Origin of the document this widget runs in.
    pub current_origin: String,
    pub messages: Vec<Message>,
    pub utterances: VecDeque<String>,
    pub turn: ConversationTurnState,
    pub is_running_embedded: bool,
    /// The widget starts open; a host that loads it minimized toggles it.
    pub is_ui_minimized: bool,
    pub is_ui_expanded: bool,
    pub initial_utterance_sent: bool,
    pub is_back_processing: bool,
    pub is_sfx_on: bool,
    pub chat_mode: ChatMode,
    pub streaming: StreamState,
}

impl WidgetState {
    pub fn new(config: WidgetConfig, current_origin: impl Into<String>) -> Self {
        let turn = ConversationTurnState {
            session_attributes: config.backend.session_attributes.clone(),
            ..Default::default()
        };
        Self {
            config,
            current_origin: current_origin.into(),
            messages: Vec::new(),
            utterances: VecDeque::new(),
            turn,
            is_running_embedded: false,
            is_ui_minimized: false,
            is_ui_expanded: false,
            initial_utterance_sent: false,
            is_back_processing: false,
            is_sfx_on: true,
            chat_mode: ChatMode::Bot,
            streaming: StreamState::default(),
        }
    }

    /// Most recent utterance, if any.
    pub fn last_utterance(&self) -> Option<&str> {
        self.utterances.back().map(String::as_str)
    }

    pub fn is_processing(&self) -> bool {
        self.turn.is_processing
    }
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::new(WidgetConfig::default(), "")
    }
}
