//! Chat front end: intents, menus, sessions and update dispatch.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod intent;
pub mod menus;
pub mod session;

pub use context::BotContext;
pub use dispatcher::Dispatcher;
pub use error::BotError;
pub use guard::{DeadlineGuard, GuardTicket};
pub use handlers::{handle_update, locale_for};
pub use intent::{CallbackAction, Intent};
pub use session::{BroadcastTarget, ConversationState, SessionStore};
