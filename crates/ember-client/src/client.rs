use tracing::{debug, info, warn};

use ember_crypto::{RoomCipher, issue_token};
use ember_types::events::{ClientCommand, ServerEvent};
use ember_types::models::{ChatMessage, RoomAnnouncement, RoomName, Ttl};

use crate::config::ClientConfig;
use crate::credentials::Credential;
use crate::error::{ClientError, InputField};
use crate::frontend::{DisplayedMessage, Frontend};
use crate::lifecycle::{self, LifecycleOutcome, Routed};
use crate::messaging::{self, Delivery};
use crate::registry::RoomRegistry;
use crate::validation::{Verdict, check_password};

pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Things a user can ask for through the frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Name and TTL exactly as typed; both are validated locally.
    CreateRoom { name: String, ttl: String },
    JoinRoom(String),
    LeaveRoom,
    SendMessage(String),
}

/// Client-side core of one chat session.
///
/// Owns the room registry and the cipher, turns user actions into wire
/// commands, applies server events, and tells the frontend what to show.
/// Every handler runs to completion before the next one starts.
pub struct ChatClient<F: Frontend> {
    cipher: RoomCipher,
    registry: RoomRegistry,
    frontend: F,
    display_name: Option<String>,
    connection_id: Option<String>,
}

impl<F: Frontend> ChatClient<F> {
    pub fn new(config: &ClientConfig, frontend: F) -> Self {
        Self {
            cipher: RoomCipher::new(config.kdf),
            registry: RoomRegistry::new(),
            frontend,
            display_name: config.display_name.clone(),
            connection_id: None,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn cipher(&self) -> &RoomCipher {
        &self.cipher
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn into_frontend(self) -> F {
        self.frontend
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    /// Socket id assigned by the server; used to recognise own messages.
    pub fn set_connection_id(&mut self, id: Option<String>) {
        self.connection_id = id;
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Dispatch one user action. Failures are shown to the user; the
    /// commands to send to the server are returned.
    pub fn handle_action(&mut self, action: UserAction) -> Vec<ClientCommand> {
        let result = match action {
            UserAction::CreateRoom { name, ttl } => self.create_room(&name, &ttl),
            UserAction::JoinRoom(name) => self.join_room(&name),
            UserAction::LeaveRoom => Ok(self.leave_room()),
            UserAction::SendMessage(text) => self.send_message(&text),
        };

        let commands = match result {
            Ok(command) => command.into_iter().collect(),
            Err(e) => {
                info!("Action rejected: {}", e);
                self.frontend.notify_user(&e.to_string());
                Vec::new()
            }
        };
        self.frontend.action_settled();
        commands
    }

    /// Validate the form, ask for a password and seal the validation token.
    /// The room only appears once the server announces it; the creator's
    /// password is cached right away.
    pub fn create_room(&mut self, name: &str, ttl: &str) -> Result<Option<ClientCommand>, ClientError> {
        let ttl = Ttl::parse(ttl)?;
        let room = RoomName::parse(name).ok_or(ClientError::EmptyInput(InputField::RoomName))?;
        if self.registry.contains(&room) {
            return Err(ClientError::RoomExists(room));
        }

        let Some(password) = self
            .frontend
            .prompt_for_secret(&format!("Set a secret password for \"{}\":", room))
        else {
            debug!("Room creation for {} aborted at password prompt", room);
            return Ok(None);
        };
        if password.trim().is_empty() {
            return Err(ClientError::EmptyInput(InputField::Password));
        }

        let validation = issue_token(&self.cipher, &password)?;
        self.registry
            .cache_pending_credential(room.clone(), Credential::new(password));

        info!("Requesting room {} with TTL {}", room, ttl);
        Ok(Some(ClientCommand::CreateRoom(RoomAnnouncement {
            room_name: room,
            ttl: ttl.seconds().into(),
            validation,
        })))
    }

    /// Open a room, proving knowledge of its password first if no
    /// credential is held. A denied or aborted check leaves every piece of
    /// state as it was and sends nothing.
    pub fn join_room(&mut self, name: &str) -> Result<Option<ClientCommand>, ClientError> {
        let room = RoomName::parse(name).ok_or(ClientError::EmptyInput(InputField::RoomName))?;
        if self.registry.active() == Some(&room) {
            return Ok(None);
        }
        let Some(token) = self
            .registry
            .room(&room)
            .map(|state| state.validation_token().to_string())
        else {
            return Err(ClientError::UnknownRoom(room));
        };

        self.ensure_display_name();

        if self.registry.credential(&room).is_none() {
            self.registry.begin_validation(&room);
            let supplied = self
                .frontend
                .prompt_for_secret(&format!("Enter the secret password for \"{}\":", room));

            match check_password(&self.cipher, &token, supplied.as_deref()) {
                Verdict::Accepted(credential) => {
                    info!("Password for {} validated", room);
                    self.registry.grant(&room, credential);
                }
                Verdict::Denied(reason) => {
                    self.registry.reset_validation(&room);
                    warn!("Join {} denied: {}", room, reason);
                    return Err(ClientError::ValidationFailure { room, reason });
                }
                Verdict::Aborted => {
                    self.registry.reset_validation(&room);
                    return Ok(None);
                }
                Verdict::Blank => {
                    self.registry.reset_validation(&room);
                    return Err(ClientError::EmptyInput(InputField::Password));
                }
            }
        }

        self.registry.activate(&room);
        self.render_rooms();
        self.render_messages();
        Ok(Some(ClientCommand::JoinRoom(room)))
    }

    /// Close the active room and forget its password. No-op without one.
    pub fn leave_room(&mut self) -> Option<ClientCommand> {
        let room = self.registry.leave()?;
        info!("Left room {}", room);
        self.frontend.render_active_room_messages(None);
        self.render_rooms();
        Some(ClientCommand::LeaveRoom(room))
    }

    pub fn send_message(&mut self, text: &str) -> Result<Option<ClientCommand>, ClientError> {
        let sender = self.display_name().to_string();
        let outgoing = messaging::compose(&self.registry, &self.cipher, &sender, text)?;
        Ok(outgoing.map(ClientCommand::SendChatMessage))
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match Routed::from(event) {
            Routed::Lifecycle(event) => {
                let outcome = lifecycle::apply(&mut self.registry, &self.cipher, event);
                if let Some(room) = outcome.destroyed_active_room() {
                    self.frontend.render_active_room_messages(None);
                    self.frontend
                        .notify_user(&format!("Room {} has SELF DESTRUCTED !", room));
                }
                if !matches!(outcome, LifecycleOutcome::AlreadyKnown(_)) {
                    self.render_rooms();
                }
            }
            Routed::Message(message) => {
                let room = message.room.clone();
                match messaging::receive(&mut self.registry, message) {
                    Delivery::Active => {
                        if let Some(stored) = self
                            .registry
                            .room(&room)
                            .and_then(|state| state.history().last())
                        {
                            show_message(
                                &self.cipher,
                                &self.registry,
                                self.connection_id.as_deref(),
                                &mut self.frontend,
                                stored,
                            );
                        }
                    }
                    Delivery::Background => self.render_rooms(),
                    Delivery::Dropped => {}
                }
            }
        }
    }

    /// One-second countdown step. Display only: never emits anything and
    /// never removes a room.
    pub fn tick(&mut self) {
        if self.registry.tick() {
            self.render_rooms();
        }
    }

    /// The connection is gone; everything learned from it is stale.
    pub fn disconnected(&mut self) {
        let had_active = self.registry.active().is_some();
        self.registry.clear();
        self.connection_id = None;
        if had_active {
            self.frontend.render_active_room_messages(None);
        }
        self.render_rooms();
    }

    fn ensure_display_name(&mut self) {
        if self.display_name.is_some() {
            return;
        }
        let name = self
            .frontend
            .prompt_for_text("What is your name?")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
        self.display_name = Some(name);
    }

    fn render_rooms(&mut self) {
        let summaries = self.registry.summaries();
        self.frontend.render_room_list(&summaries);
    }

    fn render_messages(&mut self) {
        let Some(room) = self.registry.active() else {
            self.frontend.render_active_room_messages(None);
            return;
        };
        self.frontend.render_active_room_messages(Some(room));

        if let Some(state) = self.registry.room(room) {
            for stored in state.history() {
                show_message(
                    &self.cipher,
                    &self.registry,
                    self.connection_id.as_deref(),
                    &mut self.frontend,
                    stored,
                );
            }
        }
    }
}

fn show_message<F: Frontend>(
    cipher: &RoomCipher,
    registry: &RoomRegistry,
    connection_id: Option<&str>,
    frontend: &mut F,
    message: &ChatMessage,
) {
    let body = messaging::open(cipher, registry.credential(&message.room), message);
    frontend.display_message(DisplayedMessage {
        room: &message.room,
        sender: &message.name,
        body: &body,
        timestamp: &message.time,
        is_own: connection_id == Some(message.id.as_str()),
    });
}
