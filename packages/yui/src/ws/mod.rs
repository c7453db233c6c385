mod handler;


pub use handler::handle_chat_socket;
