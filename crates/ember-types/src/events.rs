use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::{FrameError, Packet};
use crate::models::{ChatMessage, OutgoingMessage, RoomAnnouncement, RoomList, RoomName};

/// Events received FROM the server. Event names and payload shapes match
/// the existing room server exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full snapshot of live rooms, sent once on connect.
    InitialRoomList(RoomList),

    /// A room was created by some client (including this one).
    NewRoomCreated(RoomAnnouncement),

    /// Authoritative removal of a room, normally because its TTL ran out.
    RoomDestroyedGlobally(RoomName),

    /// One encrypted chat message.
    ChatMessage(ChatMessage),
}

/// Commands sent FROM this client TO the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Request room creation. Never carries the password, only the
    /// validation token derived from it.
    CreateRoom(RoomAnnouncement),

    /// Request membership; only sent after local validation succeeded.
    JoinRoom(RoomName),

    /// Drop local membership. The room itself keeps living server-side.
    LeaveRoom(RoomName),

    SendChatMessage(OutgoingMessage),
}

/// Outcome of reading an event packet that is not part of the contract.
#[derive(Debug)]
pub enum EventDecodeError {
    NotAnEvent,
    Unknown { name: String, source: serde_json::Error },
}

impl ServerEvent {
    /// Returns the room this event is scoped to, if any.
    pub fn room(&self) -> Option<&RoomName> {
        match self {
            Self::NewRoomCreated(announcement) => Some(&announcement.room_name),
            Self::RoomDestroyedGlobally(room) => Some(room),
            Self::ChatMessage(message) => Some(&message.room),
            // Snapshots cover every room
            Self::InitialRoomList(_) => None,
        }
    }

    pub fn from_packet(packet: Packet) -> Result<Self, EventDecodeError> {
        let Packet::Event { name, data } = packet else {
            return Err(EventDecodeError::NotAnEvent);
        };
        let envelope = serde_json::json!({ "event": &name, "data": data });
        serde_json::from_value(envelope).map_err(|source| EventDecodeError::Unknown { name, source })
    }
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "create-room",
            Self::JoinRoom(_) => "join-room",
            Self::LeaveRoom(_) => "leave-room",
            Self::SendChatMessage(_) => "send-chat-message",
        }
    }

    pub fn to_packet(&self) -> Result<Packet, FrameError> {
        let mut envelope = serde_json::to_value(self)?;
        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        Ok(Packet::Event {
            name: self.name().to_string(),
            data,
        })
    }
}
