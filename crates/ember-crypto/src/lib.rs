/// Ember Crypto Library
///
/// Password-based end-to-end encryption for rooms:
/// - Argon2id derives an AES-256 key from the room password
/// - AES-256-GCM seals messages and the room validation token
///
/// The server only ever relays ciphertext and validation tokens; room
/// passwords never leave the clients that know them.
pub mod encrypt;
pub mod keys;
pub mod validation;

use thiserror::Error;

pub use encrypt::RoomCipher;
pub use keys::{KdfParams, MAX_FOREIGN_DERIVATIONS};
pub use validation::{TokenCheck, VALIDATION_PHRASE, issue_token, verify_token};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("ciphertext too short")]
    TooShort,

    #[error("unsupported ciphertext version {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("key derivation parameters out of bounds")]
    KdfParamsRejected,

    #[error("too many distinct key derivations requested for this password")]
    DerivationBudgetExhausted,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,

    #[error("decrypted text is not valid UTF-8")]
    InvalidUtf8,
}
