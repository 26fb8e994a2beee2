use std::fmt;

use ember_types::models::RoomName;

use crate::messaging::MessageBody;
use crate::validation::ValidationState;

/// Presentation layer driven by [`crate::ChatClient`].
///
/// The client decides *what* to show and when; implementations decide how.
/// All calls happen on the task that owns the client, one at a time.
pub trait Frontend {
    /// Redraw the list of known rooms, in announcement order.
    fn render_room_list(&mut self, rooms: &[RoomSummary]);

    /// Reset the message pane for `room`, or show the "no room selected"
    /// state when `None`. History follows through [`Frontend::display_message`].
    fn render_active_room_messages(&mut self, room: Option<&RoomName>);

    fn display_message(&mut self, message: DisplayedMessage<'_>);

    /// Ask the user for a line of text. `None` means the prompt was dismissed.
    fn prompt_for_text(&mut self, label: &str) -> Option<String>;

    /// Ask for a password. Frontends that can keep the typed text off the
    /// screen should.
    fn prompt_for_secret(&mut self, label: &str) -> Option<String> {
        self.prompt_for_text(label)
    }

    fn notify_user(&mut self, message: &str);

    /// A user action has been fully handled, including any prompts it
    /// raised. Input typed after this belongs to the next action.
    fn action_settled(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: RoomName,
    pub countdown: Countdown,
    pub active: bool,
    pub joined: bool,
    pub validation: ValidationState,
    /// Messages received while the room was not open.
    pub unread: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayedMessage<'a> {
    pub room: &'a RoomName,
    pub sender: &'a str,
    pub body: &'a MessageBody,
    pub timestamp: &'a str,
    pub is_own: bool,
}

/// Remaining room lifetime as shown next to the room name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown(pub u64);

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "🕒 {}m {}s", self.0 / 60, self.0 % 60)
    }
}
