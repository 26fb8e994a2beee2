use std::collections::HashMap;

use tracing::{debug, info};

use ember_types::models::{ChatMessage, RoomName};

use crate::credentials::{Credential, CredentialStore};
use crate::frontend::{Countdown, RoomSummary};
use crate::validation::ValidationState;

/// Local membership of a known room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Known from the server, not joined.
    Announced,
    /// Joined: history is being kept and shown.
    Joined,
}

/// Everything the client knows about one live room.
#[derive(Debug)]
pub struct RoomState {
    ttl_remaining: u64,
    validation_token: String,
    membership: Membership,
    validation: ValidationState,
    history: Vec<ChatMessage>,
    unread: usize,
}

impl RoomState {
    fn new(ttl: u64, validation_token: String) -> Self {
        Self {
            ttl_remaining: ttl,
            validation_token,
            membership: Membership::Announced,
            validation: ValidationState::Unvalidated,
            history: Vec::new(),
            unread: 0,
        }
    }

    /// Local mirror of the server TTL. Advisory only.
    pub fn ttl_remaining(&self) -> u64 {
        self.ttl_remaining
    }

    pub fn validation_token(&self) -> &str {
        &self.validation_token
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    pub fn validation(&self) -> ValidationState {
        self.validation
    }

    /// Ciphertext messages in arrival order.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn unread(&self) -> usize {
        self.unread
    }
}

/// What [`RoomRegistry::destroy`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purge {
    pub was_known: bool,
    pub was_active: bool,
}

/// Single owner of all per-room client state: known rooms with their
/// countdowns, tokens and history, the credential store, and the active
/// room. Empty at connect, filled by server events, cleared on disconnect.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    order: Vec<RoomName>,
    rooms: HashMap<RoomName, RoomState>,
    credentials: CredentialStore,
    active: Option<RoomName>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a room announced by the server. Returns `false` if it was
    /// already known, in which case nothing changes.
    pub fn announce(&mut self, room: RoomName, ttl: u64, validation_token: String) -> bool {
        if self.rooms.contains_key(&room) {
            return false;
        }
        info!("Room {} announced ({}s left)", room, ttl);
        self.order.push(room.clone());
        self.rooms.insert(room, RoomState::new(ttl, validation_token));
        true
    }

    /// Resynchronise a known room from a snapshot. A different token means
    /// the room was recreated under another password, so any credential
    /// held for it is dropped.
    pub fn refresh(&mut self, room: &RoomName, ttl: u64, validation_token: String) {
        let Some(state) = self.rooms.get_mut(room) else {
            return;
        };
        state.ttl_remaining = ttl;
        if state.validation_token != validation_token {
            debug!("Room {} token changed, dropping credential", room);
            state.validation_token = validation_token;
            state.validation = ValidationState::Unvalidated;
            self.credentials.forget(room);
        }
    }

    /// Purge a room: history, countdown, token and credential. The
    /// credential is forgotten even for rooms that were never announced.
    pub fn destroy(&mut self, room: &RoomName) -> Purge {
        let was_known = self.rooms.remove(room).is_some();
        self.order.retain(|name| name != room);
        self.credentials.forget(room);

        let was_active = self.active.as_ref() == Some(room);
        if was_active {
            self.active = None;
        }
        Purge { was_known, was_active }
    }

    pub fn contains(&self, room: &RoomName) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room(&self, room: &RoomName) -> Option<&RoomState> {
        self.rooms.get(room)
    }

    /// Known room names in announcement order.
    pub fn names(&self) -> impl Iterator<Item = &RoomName> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn active(&self) -> Option<&RoomName> {
        self.active.as_ref()
    }

    pub fn credential(&self, room: &RoomName) -> Option<&Credential> {
        self.credentials.get(room)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn validation_state(&self, room: &RoomName) -> ValidationState {
        self.rooms
            .get(room)
            .map(RoomState::validation)
            .unwrap_or_default()
    }

    /// Cache the creator's password before the server confirms the room.
    pub fn cache_pending_credential(&mut self, room: RoomName, credential: Credential) {
        self.credentials.insert(room, credential);
    }

    pub fn begin_validation(&mut self, room: &RoomName) {
        if let Some(state) = self.rooms.get_mut(room) {
            state.validation = ValidationState::Validating;
        }
    }

    /// Validation failed or was aborted.
    pub fn reset_validation(&mut self, room: &RoomName) {
        if let Some(state) = self.rooms.get_mut(room) {
            state.validation = ValidationState::Unvalidated;
        }
    }

    /// Store a proven credential and mark the room validated.
    pub fn grant(&mut self, room: &RoomName, credential: Credential) {
        if let Some(state) = self.rooms.get_mut(room) {
            state.validation = ValidationState::Validated;
        }
        self.credentials.insert(room.clone(), credential);
    }

    /// Forget the credential without touching history or membership.
    pub fn revoke(&mut self, room: &RoomName) {
        self.credentials.forget(room);
        self.reset_validation(room);
    }

    /// Focus a known room: joined, unread cleared.
    pub fn activate(&mut self, room: &RoomName) -> bool {
        let Some(state) = self.rooms.get_mut(room) else {
            return false;
        };
        state.membership = Membership::Joined;
        state.unread = 0;
        self.active = Some(room.clone());
        true
    }

    /// Drop focus and the credential of the active room. The room, its
    /// history and its countdown stay: it lives on for other members.
    pub fn leave(&mut self) -> Option<RoomName> {
        let room = self.active.take()?;
        if let Some(state) = self.rooms.get_mut(&room) {
            state.membership = Membership::Announced;
        }
        self.revoke(&room);
        Some(room)
    }

    /// Append to the room's history. Returns `None` for unknown rooms,
    /// otherwise whether the room is the active one.
    pub fn append_message(&mut self, message: ChatMessage) -> Option<bool> {
        let is_active = self.active.as_ref() == Some(&message.room);
        let state = self.rooms.get_mut(&message.room)?;
        if !is_active {
            state.unread += 1;
        }
        state.history.push(message);
        Some(is_active)
    }

    /// One second of local countdown. Never destroys anything: expiry is
    /// only ever announced by the server. Returns whether any TTL changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;
        for state in self.rooms.values_mut() {
            if state.ttl_remaining > 0 {
                state.ttl_remaining -= 1;
                changed = true;
            }
        }
        changed
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.order
            .iter()
            .filter_map(|name| {
                let state = self.rooms.get(name)?;
                Some(RoomSummary {
                    name: name.clone(),
                    countdown: Countdown(state.ttl_remaining),
                    active: self.active.as_ref() == Some(name),
                    joined: state.membership == Membership::Joined,
                    validation: state.validation,
                    unread: state.unread,
                })
            })
            .collect()
    }

    /// Forget everything, as on disconnect.
    pub fn clear(&mut self) {
        self.order.clear();
        self.rooms.clear();
        self.credentials.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(room: &str, text: &str) -> ChatMessage {
        ChatMessage {
            room: room.into(),
            name: "bob".into(),
            message: text.into(),
            time: "12:00".into(),
            id: "sock-bob".into(),
        }
    }

    #[test]
    fn announce_is_idempotent_and_ordered() {
        let mut registry = RoomRegistry::new();
        assert!(registry.announce("zeta".into(), 10, "t1".into()));
        assert!(registry.announce("alpha".into(), 20, "t2".into()));
        assert!(!registry.announce("zeta".into(), 99, "other".into()));

        let names: Vec<_> = registry.names().map(RoomName::as_str).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(registry.room(&"zeta".into()).unwrap().ttl_remaining(), 10);
        assert_eq!(registry.room(&"zeta".into()).unwrap().validation_token(), "t1");
    }

    #[test]
    fn tick_counts_down_and_stops_at_zero() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 2, "t".into());
        registry.announce("beta".into(), 0, "t".into());

        assert!(registry.tick());
        assert!(registry.tick());
        assert!(!registry.tick());

        // Reaching zero never removes the room
        assert!(registry.contains(&"alpha".into()));
        assert_eq!(registry.room(&"alpha".into()).unwrap().ttl_remaining(), 0);
    }

    #[test]
    fn destroy_purges_everything_for_the_room() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 60, "t".into());
        registry.announce("beta".into(), 60, "t".into());
        registry.grant(&"alpha".into(), Credential::new("pw"));
        registry.append_message(message("alpha", "c1"));

        let purge = registry.destroy(&"alpha".into());
        assert_eq!(purge, Purge { was_known: true, was_active: false });
        assert!(!registry.contains(&"alpha".into()));
        assert!(registry.credential(&"alpha".into()).is_none());
        assert_eq!(registry.names().count(), 1);

        // A credential cached for a never-announced room is purged as well
        registry.cache_pending_credential("gamma".into(), Credential::new("pw"));
        let purge = registry.destroy(&"gamma".into());
        assert!(!purge.was_known);
        assert!(registry.credentials().is_empty());
    }

    #[test]
    fn destroying_the_active_room_clears_focus() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 60, "t".into());
        registry.activate(&"alpha".into());

        assert!(registry.destroy(&"alpha".into()).was_active);
        assert!(registry.active().is_none());
    }

    #[test]
    fn leave_keeps_room_and_history_but_forgets_credential() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 60, "t".into());
        registry.grant(&"alpha".into(), Credential::new("pw"));
        registry.activate(&"alpha".into());
        registry.append_message(message("alpha", "c1"));

        assert_eq!(registry.leave(), Some("alpha".into()));
        assert_eq!(registry.leave(), None);

        let state = registry.room(&"alpha".into()).unwrap();
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.membership(), Membership::Announced);
        assert_eq!(state.validation(), ValidationState::Unvalidated);
        assert!(registry.credential(&"alpha".into()).is_none());
    }

    #[test]
    fn background_messages_count_as_unread() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 60, "t".into());
        registry.announce("beta".into(), 60, "t".into());
        registry.activate(&"alpha".into());

        assert_eq!(registry.append_message(message("alpha", "c1")), Some(true));
        assert_eq!(registry.append_message(message("beta", "c2")), Some(false));
        assert_eq!(registry.append_message(message("beta", "c3")), Some(false));
        assert_eq!(registry.append_message(message("nowhere", "c4")), None);

        assert_eq!(registry.room(&"beta".into()).unwrap().unread(), 2);
        registry.activate(&"beta".into());
        assert_eq!(registry.room(&"beta".into()).unwrap().unread(), 0);
        assert_eq!(registry.room(&"beta".into()).unwrap().history().len(), 2);
    }

    #[test]
    fn refresh_with_new_token_drops_credential() {
        let mut registry = RoomRegistry::new();
        registry.announce("alpha".into(), 60, "t1".into());
        registry.grant(&"alpha".into(), Credential::new("pw"));

        registry.refresh(&"alpha".into(), 30, "t1".into());
        assert!(registry.credential(&"alpha".into()).is_some());
        assert_eq!(registry.room(&"alpha".into()).unwrap().ttl_remaining(), 30);

        registry.refresh(&"alpha".into(), 30, "t2".into());
        assert!(registry.credential(&"alpha".into()).is_none());
        assert_eq!(registry.validation_state(&"alpha".into()), ValidationState::Unvalidated);
    }

    #[test]
    fn summaries_follow_announcement_order() {
        let mut registry = RoomRegistry::new();
        registry.announce("b".into(), 61, "t".into());
        registry.announce("a".into(), 5, "t".into());
        registry.activate(&"a".into());

        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "b");
        assert_eq!(summaries[0].countdown.to_string(), "🕒 1m 1s");
        assert!(!summaries[0].active);
        assert!(summaries[1].active);
        assert!(summaries[1].joined);
    }
}
