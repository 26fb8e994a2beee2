/// Client core for ephemeral, end-to-end encrypted chat rooms.
///
/// The server relays opaque ciphertext and announces room lifetimes; all
/// password handling, encryption and room bookkeeping happens here. A
/// [`Frontend`] implementation renders state and collects input.
pub mod client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod frontend;
pub mod lifecycle;
pub mod messaging;
pub mod registry;
pub mod validation;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use client::{ChatClient, UserAction};
pub use config::ClientConfig;
pub use connection::{SessionEnd, run_session};
pub use error::ClientError;
pub use frontend::{Countdown, DisplayedMessage, Frontend, RoomSummary};
pub use messaging::MessageBody;
