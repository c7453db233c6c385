//! `yui chat`: line-oriented terminal client.

use anyhow::Result;
use companion_core::{
    Command, ConnectionError, Envelope, EnvelopeKind, Personality, ReconnectOutcome, Reconnector,
};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tracing::debug;

use super::{ClientError, endpoint_url};
use crate::config::ClientFileConfig;

const DEFAULT_USER_NAME: &str = "User";

pub async fn chat_command(
    client: &ClientFileConfig,
    url: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let base = url.unwrap_or_else(|| client.url.clone());
    let user_name = match name.or_else(|| client.name.clone()) {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => prompt_user_name()?,
    };
    let endpoint = endpoint_url(&base, &user_name)?;

    let reconnector = Reconnector::new(Duration::from_secs(client.reconnect_delay_secs));
    let cancel = reconnector.handle();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    // Lines survive reconnects; each attempt borrows the same receiver.
    let (line_tx, line_rx) = mpsc::channel::<String>(32);
    let eof = cancel.clone();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                return;
            }
        }
        drop(line_tx);
        // Give the open session a moment to send its close frame.
        tokio::time::sleep(Duration::from_millis(200)).await;
        eof.cancel();
    });
    let lines = Arc::new(Mutex::new(line_rx));

    println!("Connecting to {endpoint} as {user_name} (type /help for commands, /quit to leave)");
    let delay_secs = reconnector.delay().as_secs();
    let outcome = reconnector
        .run(|attempt| {
            let endpoint = endpoint.clone();
            let lines = lines.clone();
            async move {
                if attempt > 1 {
                    println!("[reconnecting to {endpoint}, attempt {attempt}]");
                }
                let mut lines = lines.lock().await;
                let result =
                    run_session(&endpoint, &mut lines, &mut |envelope: &Envelope| {
                        print_envelope(envelope)
                    })
                    .await;
                if let Err(e) = &result {
                    eprintln!("[{e}; retrying in {delay_secs}s]");
                }
                result
            }
        })
        .await;

    match outcome {
        ReconnectOutcome::Finished { .. } => {}
        ReconnectOutcome::Cancelled { .. } => println!("Goodbye! 👋"),
    }
    Ok(())
}

fn prompt_user_name() -> Result<String> {
    print!("What's your name? ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let name = input.trim();
    Ok(if name.is_empty() {
        DEFAULT_USER_NAME.to_string()
    } else {
        name.to_string()
    })
}

fn print_envelope(envelope: &Envelope) {
    match envelope.kind {
        EnvelopeKind::Error => eprintln!("{}", render(envelope)),
        _ => println!("{}", render(envelope)),
    }
}

/// One connection's worth of chat.
///
/// Returns `Ok` when the conversation ended on purpose (`/quit` answered by a
/// server close, or input exhausted) and `Err` when the connection failed or
/// dropped.
pub async fn run_session(
    endpoint: &Url,
    lines: &mut mpsc::Receiver<String>,
    output: &mut dyn FnMut(&Envelope),
) -> Result<(), ClientError> {
    let (ws, _) = tokio_tungstenite::connect_async(endpoint.as_str())
        .await
        .map_err(ClientError::from_tungstenite)?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut quit_sent = false;

    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => match Envelope::decode(text.as_str()) {
                    Ok(envelope) => output(&envelope),
                    Err(e) => debug!(error = %e, "ignoring undecodable frame"),
                },
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    return if quit_sent {
                        Ok(())
                    } else {
                        Err(ConnectionError::Lost.into())
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if quit_sent {
                        return Ok(());
                    }
                    return Err(ClientError::from_tungstenite(e));
                }
            },
            line = lines.recv(), if !quit_sent => {
                let Some(line) = line else {
                    let _ = ws_tx.send(tungstenite::Message::Close(None)).await;
                    return Ok(());
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let json = Envelope::user(line).encode().map_err(anyhow::Error::from)?;
                ws_tx
                    .send(tungstenite::Message::Text(json.into()))
                    .await
                    .map_err(ClientError::from_tungstenite)?;
                if Command::parse(line) == Command::Quit {
                    quit_sent = true;
                }
            }
        }
    }
}

/// Terminal line for an envelope.
pub fn render(envelope: &Envelope) -> String {
    match envelope.kind {
        EnvelopeKind::Assistant => {
            let speaker = envelope
                .personality
                .as_deref()
                .and_then(|p| p.parse::<Personality>().ok())
                .map(|p| p.display_name())
                .unwrap_or("Assistant");
            format!("{speaker}: {}", envelope.content)
        }
        EnvelopeKind::System => format!("* {}", envelope.content),
        EnvelopeKind::Tool => format!("[tool] {}", envelope.content),
        EnvelopeKind::Typing => format!("... {}", envelope.content),
        EnvelopeKind::Error => format!("error: {}", envelope.content),
        EnvelopeKind::User => format!("You: {}", envelope.content),
    }
}
