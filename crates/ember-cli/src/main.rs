mod terminal;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt, future};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use ember_client::{ChatClient, ClientConfig, SessionEnd, run_session};

use crate::terminal::TerminalFrontend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they never interleave with prompts on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=info,ember_client=info".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;

    info!("Connecting to {}", config.server_url);
    let (ws_stream, _) = connect_async(config.server_url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", config.server_url))?;
    let (mut write, read) = ws_stream.split();

    // Writer task: frames produced by the session -> websocket
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                warn!("WebSocket send error: {}", e);
                break;
            }
        }
        let _ = write.close().await;
    });

    // Text frames only; a transport error ends the stream like a close
    let inbound = Box::pin(
        read.inspect(|msg| {
            if let Err(e) = msg {
                warn!("WebSocket error: {}", e);
            }
        })
        .take_while(|msg| future::ready(msg.is_ok()))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        }),
    );

    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let frontend = TerminalFrontend::spawn(action_tx).context("Failed to start input reader")?;
    let mut client = ChatClient::new(&config, frontend);

    // Prompts block on stdin, so the session runs on a worker thread
    let tick_interval = config.tick_interval;
    let session = tokio::spawn(async move {
        run_session(&mut client, inbound, &out_tx, action_rx, tick_interval).await
    });

    let end = session.await.context("Session task panicked")??;
    match end {
        SessionEnd::UserQuit => info!("Bye"),
        SessionEnd::ServerClosed => println!("Disconnected from server."),
    }

    let _ = writer.await;
    Ok(())
}
