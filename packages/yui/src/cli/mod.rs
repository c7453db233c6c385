pub mod chat;

use anyhow::{Context, Result};
use companion_core::ConnectionError;
use reqwest::Url;
use tokio_tungstenite::tungstenite;

pub use chat::chat_command;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Io(io_err)
                if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                ConnectionError::Refused(err.to_string()).into()
            }
            tungstenite::Error::Http(_)
            | tungstenite::Error::HttpFormat(_)
            | tungstenite::Error::Url(_)
            | tungstenite::Error::Tls(_)
            | tungstenite::Error::Protocol(_) => ConnectionError::Handshake(err.to_string()).into(),
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                ConnectionError::Lost.into()
            }
            _ => Self::Other(err.into()),
        }
    }
}

/// `http://host:8000` + `alice` → `ws://host:8000/ws/alice`.
///
/// `https` maps to `wss`; the user name is percent-encoded as one path segment.
pub fn endpoint_url(base: &str, user_name: &str) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid server URL: {base}"))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("Unsupported URL scheme '{other}' (use http or https)"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("Cannot use scheme {scheme} for {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Server URL cannot have a path: {base}"))?
        .pop_if_empty()
        .extend(["ws", user_name]);
    url.set_query(None);
    Ok(url)
}
