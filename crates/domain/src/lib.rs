pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod stream;
pub mod trace;
