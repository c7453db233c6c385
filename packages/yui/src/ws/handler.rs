//! WebSocket Handler
//!
//! One chat session per connection. The socket is split into a writer that
//! drains the session outbox, a reader that decodes frames into a bounded
//! inbound queue, and a worker that routes queued envelopes one at a time.
//!
//! Every reply, including the `error` for an undecodable frame, is produced
//! by the worker, so replies go out in the order their frames arrived.

use axum::extract::ws::{Message, WebSocket};
use companion_core::{ConversationRouter, Envelope, Outbox, Session, ValidationError};
use futures::stream::{SplitSink, SplitStream};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::AppState;
use crate::metrics::ServerMetrics;

/// Inbound envelopes waiting for the router, per session.
const INBOUND_QUEUE_CAPACITY: usize = 32;

const QUEUE_FULL_NOTICE: &str = "Too many messages at once. Please wait for a reply.";

/// A decoded frame, or the reason it could not be decoded.
type InboundFrame = Result<Envelope, ValidationError>;

pub async fn handle_chat_socket(socket: WebSocket, state: AppState, user_name: String) {
    let personality = state.chat.default_personality;
    let (session, outbox) = Session::open(&user_name, personality, state.chat.outbox_capacity);

    info!(user = %user_name, session = %session.id(), "chat session opened");
    state.metrics.connection_opened();

    if state
        .registry
        .register(&user_name, session.clone())
        .await
        .is_some()
    {
        state.metrics.session_replaced();
    }

    if let Err(e) = state.repository.touch_profile(&user_name).await {
        warn!(user = %user_name, "Failed to update profile: {:#}", e);
    }
    if let Err(e) = state
        .repository
        .start_session(session.id(), &user_name, personality.as_str())
        .await
    {
        warn!(user = %user_name, "Failed to record session start: {:#}", e);
    }

    let welcome = format!(
        "✨ Welcome {user_name}! I'm {}. How can I help you today?",
        personality.display_name()
    );
    if let Err(e) = session.send(Envelope::system(welcome)) {
        warn!(user = %user_name, "Failed to queue welcome: {}", e);
    }

    let (ws_sender, ws_receiver) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundFrame>(INBOUND_QUEUE_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));

    let writer = tokio::spawn(write_loop(ws_sender, outbox, state.metrics.clone()));
    let worker = tokio::spawn(route_loop(
        state.router.clone(),
        session.clone(),
        inbound_rx,
        dropped.clone(),
    ));

    read_loop(ws_receiver, &session, inbound_tx, &dropped, &state.metrics).await;

    // Reader is done: stop routing and let the writer flush what is queued.
    session.close();
    if let Err(e) = worker.await {
        error!(user = %user_name, "Router task failed: {}", e);
    }
    if let Err(e) = writer.await {
        error!(user = %user_name, "Writer task failed: {}", e);
    }

    state.registry.release(&session).await;
    state.metrics.connection_closed();

    let final_personality = session.personality().await;
    if let Err(e) = state
        .repository
        .end_session(
            session.id(),
            final_personality.as_str(),
            session.message_count() as i64,
        )
        .await
    {
        warn!(user = %user_name, "Failed to record session end: {:#}", e);
    }

    info!(
        user = %user_name,
        session = %session.id(),
        messages = session.message_count(),
        "chat session closed"
    );
}

async fn write_loop(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
    metrics: Arc<ServerMetrics>,
) {
    while let Some(envelope) = outbox.next().await {
        let json = match envelope.encode() {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize envelope: {}", e);
                continue;
            }
        };
        if ws_sender.send(Message::Text(json.into())).await.is_err() {
            metrics.websocket_error();
            return;
        }
        metrics.message_sent();
    }

    let _ = ws_sender.send(Message::Close(None)).await;
}

async fn read_loop(
    mut ws_receiver: SplitStream<WebSocket>,
    session: &Session,
    inbound: mpsc::Sender<InboundFrame>,
    dropped: &AtomicU64,
    metrics: &ServerMetrics,
) {
    loop {
        let msg = tokio::select! {
            _ = session.closed() => return,
            msg = ws_receiver.next() => msg,
        };

        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(user = %session.user_id(), "WebSocket receive error: {}", e);
                metrics.websocket_error();
                return;
            }
        };
        metrics.message_received();

        let frame = Envelope::decode(text.as_str());
        if frame.is_err() {
            metrics.malformed_frame();
        }
        match inbound.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // The worker reports drops once it has caught up.
                dropped.fetch_add(1, Ordering::Relaxed);
                metrics.message_dropped();
                warn!(user = %session.user_id(), "inbound queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return,
        }
    }
}

async fn route_loop(
    router: Arc<ConversationRouter>,
    session: Arc<Session>,
    mut inbound: mpsc::Receiver<InboundFrame>,
    dropped: Arc<AtomicU64>,
) {
    while let Some(frame) = inbound.recv().await {
        let result = match frame {
            Ok(envelope) => router.route(&session, envelope).await,
            Err(e) => session.send(Envelope::error(e.to_string())),
        };
        if let Err(e) = result {
            debug!(user = %session.user_id(), "stopping router: {}", e);
            // Nothing can reach the client any more; tear the connection down.
            session.close();
            break;
        }

        if inbound.is_empty() {
            report_dropped(&session, &dropped);
        }
    }
}

/// One `error` per frame dropped while the queue was full.
fn report_dropped(session: &Session, dropped: &AtomicU64) {
    let count = dropped.swap(0, Ordering::Relaxed);
    for _ in 0..count {
        if let Err(e) = session.send(Envelope::error(QUEUE_FULL_NOTICE)) {
            debug!(user = %session.user_id(), "skipping queue-full notices: {}", e);
            return;
        }
    }
}
