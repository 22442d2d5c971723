//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Turns incoming messages into conversation events
//! - `dialogue_manager`: Drives the conversation machine and its effects
//! - `task_runner`: Downloads inputs, runs document tasks, delivers results
//! - `telegram`: The messaging platform seam
//! - `ui_builder`: Creates keyboards and formats messages

pub mod dialogue_manager;
pub mod message_handler;
pub mod task_runner;
pub mod telegram;
pub mod ui_builder;

pub use dialogue_manager::{drive, BotContext, UrlTracker};
pub use message_handler::{event_from_message, message_handler};
pub use telegram::{Messenger, TelegramMessenger};
