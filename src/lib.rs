pub mod chat;
pub mod constants;
pub mod error;
pub mod llm;
pub mod session;
pub mod table;
pub mod web_server;
