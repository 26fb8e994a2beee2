use std::fmt;

use tracing::{debug, warn};

use ember_crypto::RoomCipher;
use ember_types::models::{ChatMessage, OutgoingMessage};

use crate::credentials::Credential;
use crate::error::{ClientError, InputField};
use crate::registry::RoomRegistry;

/// Why a stored message cannot be shown as plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreadable {
    NoCredential,
    DecryptionFailed,
}

/// What the frontend shows for a message. Plaintext only ever lives here,
/// transiently, at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Plaintext(String),
    Unavailable(Unreadable),
}

impl MessageBody {
    pub fn is_readable(&self) -> bool {
        matches!(self, MessageBody::Plaintext(_))
    }
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBody::Plaintext(text) => f.write_str(text),
            MessageBody::Unavailable(Unreadable::NoCredential) => f.write_str("[Encrypted Content]"),
            MessageBody::Unavailable(Unreadable::DecryptionFailed) => f.write_str("[Decryption Error]"),
        }
    }
}

/// Where an inbound message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Appended to the open room; render it now.
    Active,
    /// Appended to a room in the background; decrypted when opened.
    Background,
    /// The room is unknown (never announced or already destroyed).
    Dropped,
}

/// Encrypt `text` for the active room.
///
/// `Ok(None)` when there is no active room or no credential for it: sending
/// is silently impossible then.
pub fn compose(
    registry: &RoomRegistry,
    cipher: &RoomCipher,
    sender: &str,
    text: &str,
) -> Result<Option<OutgoingMessage>, ClientError> {
    let Some(room) = registry.active() else {
        return Ok(None);
    };
    let Some(credential) = registry.credential(room) else {
        return Ok(None);
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ClientError::EmptyInput(InputField::Message));
    }

    let message = cipher.encrypt(text, credential.password())?;
    Ok(Some(OutgoingMessage {
        room: room.clone(),
        name: sender.to_string(),
        message,
    }))
}

/// Store an inbound message in its room's history, whether or not the room
/// is open.
pub fn receive(registry: &mut RoomRegistry, message: ChatMessage) -> Delivery {
    let room = message.room.clone();
    match registry.append_message(message) {
        Some(true) => Delivery::Active,
        Some(false) => {
            debug!("Message for background room {}", room);
            Delivery::Background
        }
        None => {
            warn!("Dropping message for unknown room {}", room);
            Delivery::Dropped
        }
    }
}

/// Decrypt a stored message for display. Same ciphertext and credential
/// always give the same body.
pub fn open(cipher: &RoomCipher, credential: Option<&Credential>, message: &ChatMessage) -> MessageBody {
    let Some(credential) = credential else {
        return MessageBody::Unavailable(Unreadable::NoCredential);
    };

    match cipher.decrypt(&message.message, credential.password()) {
        Ok(text) if !text.is_empty() => MessageBody::Plaintext(text),
        Ok(_) => MessageBody::Unavailable(Unreadable::DecryptionFailed),
        Err(e) => {
            debug!("Message from {} in {} unreadable: {}", message.name, message.room, e);
            MessageBody::Unavailable(Unreadable::DecryptionFailed)
        }
    }
}
