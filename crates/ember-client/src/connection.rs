use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use ember_types::events::{ClientCommand, EventDecodeError, ServerEvent};
use ember_types::frame::Packet;

use crate::client::{ChatClient, UserAction};
use crate::frontend::Frontend;

/// Why [`run_session`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The action channel closed: the user is done.
    UserQuit,
    /// The server closed the socket, or stopped answering.
    ServerClosed,
}

/// Drive one connected session until either side goes away.
///
/// `inbound` yields raw text frames from the websocket and `outbound`
/// accepts raw text frames to write back. Server events, user actions and
/// the countdown tick are handled one at a time on this task, so the client
/// never sees interleaved handlers.
pub async fn run_session<F, S>(
    client: &mut ChatClient<F>,
    mut inbound: S,
    outbound: &UnboundedSender<String>,
    mut actions: UnboundedReceiver<UserAction>,
    tick_interval: Duration,
) -> anyhow::Result<SessionEnd>
where
    F: Frontend,
    S: Stream<Item = String> + Unpin,
{
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.tick().await;

    // Set from the open handshake; a silent server past this is gone
    let mut liveness: Option<Duration> = None;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            frame = inbound.next() => {
                let Some(text) = frame else {
                    info!("Server closed the connection");
                    client.disconnected();
                    return Ok(SessionEnd::ServerClosed);
                };
                last_seen = Instant::now();

                let packet = match Packet::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        warn!("Ignoring malformed frame {:?}: {}", text, e);
                        continue;
                    }
                };

                match packet {
                    Packet::Open(handshake) => {
                        debug!(
                            "Engine open: sid={} ping={}ms timeout={}ms",
                            handshake.sid, handshake.ping_interval, handshake.ping_timeout
                        );
                        liveness = Some(Duration::from_millis(
                            handshake.ping_interval + handshake.ping_timeout,
                        ));
                        send_frame(outbound, Packet::connect().encode())?;
                    }
                    Packet::Connect { sid } => {
                        info!("Connected to server (socket id {:?})", sid);
                        client.set_connection_id(sid);
                    }
                    Packet::ConnectError(message) => {
                        client.disconnected();
                        bail!("Server refused connection: {}", message);
                    }
                    Packet::Ping => send_frame(outbound, Packet::Pong.encode())?,
                    Packet::Pong | Packet::Noop => trace!("Engine keepalive"),
                    Packet::Close | Packet::Disconnect => {
                        info!("Server ended the session");
                        client.disconnected();
                        return Ok(SessionEnd::ServerClosed);
                    }
                    packet @ Packet::Event { .. } => match ServerEvent::from_packet(packet) {
                        Ok(event) => client.handle_server_event(event),
                        Err(EventDecodeError::Unknown { name, source }) => {
                            warn!("Ignoring unrecognised event {}: {}", name, source);
                        }
                        Err(EventDecodeError::NotAnEvent) => {}
                    },
                }
            }

            action = actions.recv() => {
                let Some(action) = action else {
                    info!("Input closed, leaving");
                    // Best effort: the writer may already be gone
                    let _ = outbound.send(Packet::Disconnect.encode());
                    return Ok(SessionEnd::UserQuit);
                };
                for command in client.handle_action(action) {
                    send_command(outbound, &command)?;
                }
            }

            _ = ticker.tick() => {
                client.tick();
                if let Some(limit) = liveness {
                    if last_seen.elapsed() > limit {
                        warn!("No traffic from server for {:?}, dropping connection", limit);
                        client.disconnected();
                        return Ok(SessionEnd::ServerClosed);
                    }
                }
            }
        }
    }
}

fn send_command(outbound: &UnboundedSender<String>, command: &ClientCommand) -> anyhow::Result<()> {
    let packet = command
        .to_packet()
        .with_context(|| format!("Failed to encode {}", command.name()))?;
    debug!("-> {}", command.name());
    send_frame(outbound, packet.encode())
}

fn send_frame(outbound: &UnboundedSender<String>, text: String) -> anyhow::Result<()> {
    outbound
        .send(text)
        .map_err(|_| anyhow::anyhow!("Connection writer has shut down"))
}
