//! Order Assist: conversational order taking over a small product database.

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod orders;
pub mod store;
