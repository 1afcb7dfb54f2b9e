//! The `services` module holds the SQL for each table, one sub-module per table.
//! Everything is re-exported so callers can use `crate::db::services::*`.

pub mod group_chat_service;
pub mod user_token_service;

pub use group_chat_service::*;
pub use user_token_service::*;
