//! # PDF Telegram Bot
//!
//! A Telegram bot that runs PDF and image operations through guided,
//! per-chat conversations: send a document or photos, pick a task from the
//! reply keyboard, answer the follow-up questions and get the result back.

pub mod archive;
pub mod bot;
pub mod config;
pub mod conversation;
pub mod dialogue;
pub mod dispatch;
pub mod errors;
pub mod localization;
pub mod page_range;
pub mod pdf;
pub mod tasks;
pub mod workspace;
