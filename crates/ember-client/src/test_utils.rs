use std::collections::VecDeque;

use ember_crypto::KdfParams;
use ember_types::models::RoomName;

use crate::config::ClientConfig;
use crate::frontend::{DisplayedMessage, Frontend, RoomSummary};

/// A message as it reached the frontend, with the body already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub room: RoomName,
    pub sender: String,
    pub text: String,
    pub is_own: bool,
}

/// Frontend that answers prompts from a script and records every call.
#[derive(Debug, Default)]
pub struct ScriptedFrontend {
    /// Answers handed out in order. `None` dismisses the prompt; an empty
    /// queue dismisses every further prompt.
    pub answers: VecDeque<Option<String>>,
    pub prompts: Vec<String>,
    /// Labels of the prompts that asked for a password.
    pub secret_prompts: Vec<String>,
    pub notices: Vec<String>,
    /// Every message displayed, oldest first. Pane resets do not clear it.
    pub messages: Vec<RecordedMessage>,
    pub room_lists: Vec<Vec<RoomSummary>>,
    /// Room shown in the message pane after the last reset.
    pub pane: Option<RoomName>,
    pub pane_resets: usize,
    /// User actions handled so far.
    pub settled: usize,
}

impl ScriptedFrontend {
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(|a| Some(a.into())).collect(),
            ..Self::default()
        }
    }

    pub fn push_answer(&mut self, answer: impl Into<String>) {
        self.answers.push_back(Some(answer.into()));
    }

    pub fn push_dismissal(&mut self) {
        self.answers.push_back(None);
    }

    pub fn last_room_list(&self) -> &[RoomSummary] {
        self.room_lists.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn last_notice(&self) -> Option<&str> {
        self.notices.last().map(String::as_str)
    }

    /// Texts displayed for `room`, oldest first.
    pub fn texts_in(&self, room: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.room == room)
            .map(|m| m.text.as_str())
            .collect()
    }
}

impl Frontend for ScriptedFrontend {
    fn render_room_list(&mut self, rooms: &[RoomSummary]) {
        self.room_lists.push(rooms.to_vec());
    }

    fn render_active_room_messages(&mut self, room: Option<&RoomName>) {
        self.pane = room.cloned();
        self.pane_resets += 1;
    }

    fn display_message(&mut self, message: DisplayedMessage<'_>) {
        self.messages.push(RecordedMessage {
            room: message.room.clone(),
            sender: message.sender.to_string(),
            text: message.body.to_string(),
            is_own: message.is_own,
        });
    }

    fn prompt_for_text(&mut self, label: &str) -> Option<String> {
        self.prompts.push(label.to_string());
        self.answers.pop_front().flatten()
    }

    fn prompt_for_secret(&mut self, label: &str) -> Option<String> {
        self.secret_prompts.push(label.to_string());
        self.prompt_for_text(label)
    }

    fn notify_user(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn action_settled(&mut self) {
        self.settled += 1;
    }
}

/// Client settings with the cheapest KDF, so tests do not spend seconds in
/// argon2.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        kdf: KdfParams::minimal(),
        display_name: None,
        ..ClientConfig::default()
    }
}
