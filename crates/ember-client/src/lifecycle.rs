use tracing::{info, warn};

use ember_crypto::{RoomCipher, verify_token};
use ember_types::events::ServerEvent;
use ember_types::models::{ChatMessage, RoomAnnouncement, RoomList, RoomName};

use crate::registry::RoomRegistry;

/// Server events that create, refresh or destroy rooms.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Snapshot(RoomList),
    Created(RoomAnnouncement),
    Destroyed(RoomName),
}

/// A server event split by concern.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Lifecycle(LifecycleEvent),
    Message(ChatMessage),
}

impl From<ServerEvent> for Routed {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::InitialRoomList(rooms) => Routed::Lifecycle(LifecycleEvent::Snapshot(rooms)),
            ServerEvent::NewRoomCreated(announcement) => {
                Routed::Lifecycle(LifecycleEvent::Created(announcement))
            }
            ServerEvent::RoomDestroyedGlobally(room) => {
                Routed::Lifecycle(LifecycleEvent::Destroyed(room))
            }
            ServerEvent::ChatMessage(message) => Routed::Message(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    Synced {
        announced: Vec<RoomName>,
        purged: Vec<RoomName>,
        /// Set when the open room was missing from the snapshot.
        active_destroyed: Option<RoomName>,
    },
    Announced(RoomName),
    AlreadyKnown(RoomName),
    Destroyed {
        room: RoomName,
        was_active: bool,
    },
}

impl LifecycleOutcome {
    /// The open room that no longer exists, if this event removed it.
    pub fn destroyed_active_room(&self) -> Option<&RoomName> {
        match self {
            LifecycleOutcome::Synced { active_destroyed, .. } => active_destroyed.as_ref(),
            LifecycleOutcome::Destroyed { room, was_active: true } => Some(room),
            _ => None,
        }
    }
}

/// Apply one lifecycle event to the registry. Rooms only come into
/// existence or disappear through here; the local countdown never does
/// either.
pub fn apply(registry: &mut RoomRegistry, cipher: &RoomCipher, event: LifecycleEvent) -> LifecycleOutcome {
    match event {
        LifecycleEvent::Snapshot(rooms) => {
            let stale: Vec<RoomName> = registry
                .names()
                .filter(|name| !rooms.contains(name))
                .cloned()
                .collect();

            let mut active_destroyed = None;
            for room in &stale {
                if registry.destroy(room).was_active {
                    active_destroyed = Some(room.clone());
                }
            }

            let mut announced = Vec::new();
            for (room, snapshot) in rooms {
                if registry.contains(&room) {
                    registry.refresh(&room, snapshot.ttl, snapshot.validation);
                } else if registry.announce(room.clone(), snapshot.ttl, snapshot.validation) {
                    confirm_pending_credential(registry, cipher, &room);
                    announced.push(room);
                }
            }

            info!(
                "Room snapshot applied: {} rooms known, {} new, {} purged",
                registry.len(),
                announced.len(),
                stale.len()
            );
            LifecycleOutcome::Synced {
                announced,
                purged: stale,
                active_destroyed,
            }
        }

        LifecycleEvent::Created(RoomAnnouncement {
            room_name,
            ttl,
            validation,
        }) => {
            if !registry.announce(room_name.clone(), ttl, validation) {
                return LifecycleOutcome::AlreadyKnown(room_name);
            }
            confirm_pending_credential(registry, cipher, &room_name);
            LifecycleOutcome::Announced(room_name)
        }

        LifecycleEvent::Destroyed(room) => {
            let purge = registry.destroy(&room);
            info!(
                "Room {} destroyed by server (known: {}, active: {})",
                room, purge.was_known, purge.was_active
            );
            LifecycleOutcome::Destroyed {
                room,
                was_active: purge.was_active,
            }
        }
    }
}

/// A creator caches its password before the room is confirmed. Once the
/// token arrives the cached password must open it, otherwise someone else
/// owns this name and the cached password is useless.
fn confirm_pending_credential(registry: &mut RoomRegistry, cipher: &RoomCipher, room: &RoomName) {
    let Some(credential) = registry.credential(room).cloned() else {
        return;
    };
    let Some(state) = registry.room(room) else {
        return;
    };

    if verify_token(cipher, state.validation_token(), credential.password()).is_match() {
        registry.grant(room, credential);
    } else {
        warn!("Cached password for {} does not open its token, discarding", room);
        registry.revoke(room);
    }
}
