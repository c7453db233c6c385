use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::ws;

/// `GET /ws/{user_name}`: upgrade and hand the socket to a chat session.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_name = user_name.trim().to_string();
    if user_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "user name is required").into_response();
    }

    ws.on_upgrade(move |socket| ws::handle_chat_socket(socket, state, user_name))
}
