//! Dialogue Manager module: drives the conversation machine for one chat.
//!
//! Each inbound event is applied to the chat's session; the requested
//! effects are executed in order and a task outcome is fed back into the
//! machine before the next message of the chat is handled. teloxide hands
//! updates of one chat to the handler one at a time, so a chat's session
//! has a single writer.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use teloxide::types::ChatId;
use tracing::{debug, error, info};

use super::task_runner::{convert_url, run_task};
use super::telegram::Messenger;
use super::ui_builder::{create_markup, format_file_list, format_reply};
use crate::config::BotConfig;
use crate::conversation::{ConversationMachine, Effect, Event, Limits};
use crate::dialogue::Session;
use crate::pdf::DocumentEngine;

/// Shared state handed to every handler
pub struct BotContext {
    pub machine: ConversationMachine,
    pub engine: Arc<dyn DocumentEngine>,
    pub messenger: Arc<dyn Messenger>,
    /// Parent of step workspaces, system temp dir when `None`
    pub temp_root: Option<PathBuf>,
    pub max_upload_size: u64,
    pub urls: UrlTracker,
}

impl BotContext {
    pub fn new(
        config: &BotConfig,
        engine: Arc<dyn DocumentEngine>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            machine: ConversationMachine::new(Limits::from(config)),
            engine,
            messenger,
            temp_root: config.temp_dir.clone(),
            max_upload_size: config.max_upload_size,
            urls: UrlTracker::default(),
        }
    }
}

/// URLs being converted, per chat
#[derive(Clone, Default)]
pub struct UrlTracker {
    in_flight: Arc<Mutex<HashSet<(ChatId, String)>>>,
}

impl UrlTracker {
    /// Mark `url` as in progress for `chat_id`; `None` if it already is
    pub fn begin(&self, chat_id: ChatId, url: &str) -> Option<UrlGuard> {
        let key = (chat_id, url.to_string());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(UrlGuard {
            tracker: self.clone(),
            key,
        })
    }

    pub fn is_running(&self, chat_id: ChatId, url: &str) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.contains(&(chat_id, url.to_string()))
    }
}

/// Clears the in-progress mark when the conversion ends
pub struct UrlGuard {
    tracker: UrlTracker,
    key: (ChatId, String),
}

impl Drop for UrlGuard {
    fn drop(&mut self) {
        let mut in_flight = self
            .tracker
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.key);
    }
}

/// Apply `event` to `session` and carry out everything it leads to.
/// Returns the session to persist. A reply that cannot be sent stops the
/// remaining effects and ends the conversation.
pub async fn drive(
    ctx: &Arc<BotContext>,
    chat_id: ChatId,
    language_code: Option<&str>,
    session: Session,
    event: Event,
) -> Session {
    let mut session = session;
    let mut next = Some(event);

    while let Some(event) = next.take() {
        let after_send_failure = matches!(event, Event::SendFailed);
        let transition = ctx.machine.transition(session, event, Utc::now());
        session = transition.session;

        for effect in transition.effects {
            if let Err(e) = execute(ctx, chat_id, language_code, effect, &mut next).await {
                error!(user_id = %chat_id, error = %format!("{e:#}"), "Failed to deliver reply");
                next = (!after_send_failure).then_some(Event::SendFailed);
                break;
            }
        }
    }

    session
}

async fn execute(
    ctx: &Arc<BotContext>,
    chat_id: ChatId,
    language_code: Option<&str>,
    effect: Effect,
    next: &mut Option<Event>,
) -> Result<()> {
    match effect {
        Effect::Reply(reply) => {
            let text = format_reply(&reply, language_code);
            let markup = create_markup(reply.keyboard, language_code);
            ctx.messenger
                .send_text(chat_id, &text, markup)
                .await
                .with_context(|| format!("Failed to send {}", reply.key))?;
        }
        Effect::ListFiles { header_key, names } => {
            let text = format_file_list(header_key, &names, language_code);
            ctx.messenger
                .send_text(chat_id, &text, None)
                .await
                .context("Failed to send file list")?;
        }
        Effect::Run(task) => {
            info!(user_id = %chat_id, task = %task, "Running task");
            let result = run_task(ctx, chat_id, language_code, &task).await;
            *next = Some(Event::TaskFinished { task, result });
        }
        Effect::ConvertUrl(url) => {
            debug!(user_id = %chat_id, url = %url, "Starting web page conversion");
            tokio::spawn(convert_url(
                Arc::clone(ctx),
                chat_id,
                language_code.map(str::to_string),
                url,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_tracker_rejects_duplicates_until_done() {
        let tracker = UrlTracker::default();
        let chat = ChatId(7);

        let guard = tracker.begin(chat, "https://example.org").unwrap();
        assert!(tracker.begin(chat, "https://example.org").is_none());
        assert!(tracker.begin(ChatId(8), "https://example.org").is_some());
        assert!(tracker.is_running(chat, "https://example.org"));

        drop(guard);
        assert!(!tracker.is_running(chat, "https://example.org"));
        assert!(tracker.begin(chat, "https://example.org").is_some());
    }
}
