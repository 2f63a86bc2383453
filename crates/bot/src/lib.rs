//! Bot-facing façade - the operations a chat transport is allowed to call.
//!
//! A transport adapter (webhook or long-polling) maps inbound messages and
//! button callbacks onto [`BotService`] calls and sends the returned text
//! back to the user. Nothing below this crate ever surfaces an internal
//! error into the chat layer: failures become typed outcomes or friendly
//! fallback strings.

pub mod facade;
pub mod locks;
pub mod messages;
pub mod resolver;

pub use facade::{AuthOutcome, BotService, OrdersPage, ResolveProbe, ServiceOptions};
pub use resolver::{resolve, ResolveError};
