pub mod client;
pub mod notification;
pub mod stream_handler;
