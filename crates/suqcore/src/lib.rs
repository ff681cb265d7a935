//! Core library for the suq storefront bot.
//!
//! Everything here is platform-free: the conversational navigation engine,
//! the per-chat session store, the order lifecycle state machine and the
//! subscriber broadcast fan-out all talk to the chat platform through the
//! [`outbound::Messenger`] port. The Telegram binding lives in the `suqbot`
//! crate.

pub mod actions;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod nav;
pub mod outbound;
pub mod phone;
pub mod session;
pub mod storage;
pub mod text;

pub use error::{ShopError, ShopResult};
