use std::fmt;

use ember_crypto::{RoomCipher, TokenCheck, verify_token};

use crate::credentials::Credential;

/// Client-local proof-of-password state for one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    /// Token known, no credential held.
    #[default]
    Unvalidated,
    /// A password is being requested and checked.
    Validating,
    /// A correct credential is held.
    Validated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    IncorrectPassword,
    MalformedToken,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::IncorrectPassword => write!(f, "incorrect password"),
            DenialReason::MalformedToken => write!(f, "invalid password"),
        }
    }
}

/// Result of checking one supplied password against a room token.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted(Credential),
    Denied(DenialReason),
    /// The prompt was dismissed; nothing changes.
    Aborted,
    /// An empty or whitespace-only password was entered.
    Blank,
}

/// Second phase of a join: judge the password obtained from the prompt.
///
/// Pure apart from key derivation. The password is kept exactly as typed;
/// only the blank check looks at the trimmed text.
pub fn check_password(cipher: &RoomCipher, token: &str, supplied: Option<&str>) -> Verdict {
    let Some(password) = supplied else {
        return Verdict::Aborted;
    };
    if password.trim().is_empty() {
        return Verdict::Blank;
    }

    match verify_token(cipher, token, password) {
        TokenCheck::Match => Verdict::Accepted(Credential::new(password)),
        TokenCheck::Mismatch => Verdict::Denied(DenialReason::IncorrectPassword),
        TokenCheck::Malformed => Verdict::Denied(DenialReason::MalformedToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_crypto::{KdfParams, issue_token};

    #[test]
    fn verdicts() {
        let cipher = RoomCipher::new(KdfParams::minimal());
        let token = issue_token(&cipher, "hunter2").unwrap();

        assert_eq!(
            check_password(&cipher, &token, Some("hunter2")),
            Verdict::Accepted(Credential::new("hunter2"))
        );
        assert_eq!(
            check_password(&cipher, &token, Some("wrong")),
            Verdict::Denied(DenialReason::IncorrectPassword)
        );
        assert_eq!(check_password(&cipher, &token, None), Verdict::Aborted);
        assert_eq!(check_password(&cipher, &token, Some("   ")), Verdict::Blank);
        assert_eq!(
            check_password(&cipher, "garbage", Some("hunter2")),
            Verdict::Denied(DenialReason::MalformedToken)
        );
    }

    #[test]
    fn password_is_not_trimmed() {
        let cipher = RoomCipher::new(KdfParams::minimal());
        let token = issue_token(&cipher, " padded ").unwrap();

        assert!(matches!(
            check_password(&cipher, &token, Some("padded")),
            Verdict::Denied(_)
        ));
        assert!(matches!(
            check_password(&cipher, &token, Some(" padded ")),
            Verdict::Accepted(_)
        ));
    }
}
