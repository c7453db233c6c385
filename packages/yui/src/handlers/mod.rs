pub mod health;
pub mod memory;
pub mod websocket;

pub use health::{
    api_health_handler, health_live_handler, health_ready_handler, metrics_handler, root_handler,
};
pub use memory::{
    get_database_stats, get_history, get_profile, get_session, get_user_stats, patch_preferences,
    search_history,
};
pub use websocket::websocket_handler;
