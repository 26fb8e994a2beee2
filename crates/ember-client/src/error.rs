use std::fmt;

use ember_crypto::CryptoError;
use ember_types::models::{RoomName, TtlError};
use thiserror::Error;

use crate::validation::DenialReason;

/// Every failure a user action can hit. All of them are local and
/// recoverable; none ends the session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("❌ Access to {room} denied: {reason}")]
    ValidationFailure { room: RoomName, reason: DenialReason },

    #[error("{0} must not be empty")]
    EmptyInput(InputField),

    #[error(transparent)]
    TtlOutOfRange(#[from] TtlError),

    #[error("room {0} does not exist")]
    UnknownRoom(RoomName),

    #[error("room {0} already exists")]
    RoomExists(RoomName),

    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    RoomName,
    Message,
    Password,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputField::RoomName => write!(f, "room name"),
            InputField::Message => write!(f, "message"),
            InputField::Password => write!(f, "password"),
        }
    }
}
