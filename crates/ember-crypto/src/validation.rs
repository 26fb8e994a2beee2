use tracing::debug;

use crate::CryptoError;
use crate::encrypt::RoomCipher;

/// Fixed, publicly known plaintext sealed under a room password to form
/// the room's validation token.
pub const VALIDATION_PHRASE: &str = "VERIFY_ME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    /// The password opens the token and yields the validation phrase.
    Match,
    /// Wrong password, tampered token, or a token sealing some other text.
    Mismatch,
    /// The token is not a ciphertext this client understands.
    Malformed,
}

impl TokenCheck {
    pub fn is_match(self) -> bool {
        self == TokenCheck::Match
    }
}

/// Seal the validation phrase under `password`. The result is safe to hand
/// to the server: it reveals nothing about the password short of brute force.
pub fn issue_token(cipher: &RoomCipher, password: &str) -> Result<String, CryptoError> {
    cipher.encrypt(VALIDATION_PHRASE, password)
}

/// Check a candidate password against a room's validation token.
pub fn verify_token(cipher: &RoomCipher, token: &str, password: &str) -> TokenCheck {
    match cipher.decrypt(token, password) {
        Ok(phrase) if phrase == VALIDATION_PHRASE => TokenCheck::Match,
        Ok(_) => TokenCheck::Mismatch,
        Err(CryptoError::Decryption) | Err(CryptoError::InvalidUtf8) => TokenCheck::Mismatch,
        Err(e) => {
            debug!("validation token unreadable: {}", e);
            TokenCheck::Malformed
        }
    }
}
