use std::collections::HashMap;
use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use ember_types::models::RoomName;

/// A room password held by a client that created the room or proved it
/// knows the password. Never serialized, never sent anywhere.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub(crate) fn password(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal the password when printing debug info.
        f.debug_tuple("Credential").field(&"***").finish()
    }
}

/// Local-only mapping from room to password.
///
/// May hold a credential for a room that has not been announced yet: the
/// creator caches its password before the server confirms the room.
#[derive(Debug, Default)]
pub struct CredentialStore {
    secrets: HashMap<RoomName, Credential>,
}

impl CredentialStore {
    pub fn insert(&mut self, room: RoomName, credential: Credential) {
        self.secrets.insert(room, credential);
    }

    pub fn get(&self, room: &RoomName) -> Option<&Credential> {
        self.secrets.get(room)
    }

    pub fn contains(&self, room: &RoomName) -> bool {
        self.secrets.contains_key(room)
    }

    /// Forget the password for `room`. Returns whether one was held.
    pub fn forget(&mut self, room: &RoomName) -> bool {
        self.secrets.remove(room).is_some()
    }

    pub fn clear(&mut self) {
        self.secrets.clear();
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let credential = Credential::new("hunter2");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("hunter2"));

        let mut store = CredentialStore::default();
        store.insert("alpha".into(), credential);
        assert!(!format!("{:?}", store).contains("hunter2"));
    }

    #[test]
    fn forget_reports_whether_a_secret_was_held() {
        let mut store = CredentialStore::default();
        store.insert("alpha".into(), Credential::new("pw"));

        assert!(store.contains(&"alpha".into()));
        assert!(store.forget(&"alpha".into()));
        assert!(!store.forget(&"alpha".into()));
        assert!(store.is_empty());
    }
}
