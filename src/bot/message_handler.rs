//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use super::dialogue_manager::{drive, BotContext};
use crate::conversation::{Command, Event, IncomingFile};
use crate::dialogue::SessionDialogue;
use crate::dispatch::resolve_choice;
use crate::localization::t_lang;

/// Translate a Telegram message into a conversation event
pub fn event_from_message(msg: &Message, language_code: Option<&str>) -> Option<Event> {
    if let Some(text) = msg.text() {
        if let Some(command) = Command::parse(text) {
            return Some(Event::Command(command));
        }
        return Some(Event::Text {
            text: text.to_string(),
            choice: resolve_choice(text, language_code),
        });
    }

    if let Some(doc) = msg.document() {
        return Some(Event::Document(IncomingFile {
            file_id: doc.file.id.0.clone(),
            file_name: doc.file_name.clone(),
            mime_type: doc.mime_type.as_ref().map(|mime| mime.to_string()),
            size: u64::from(doc.file.size),
        }));
    }

    if let Some(photos) = msg.photo() {
        // sizes are ordered smallest first
        let largest = photos.last().map(|photo| IncomingFile {
            file_id: photo.file.id.0.clone(),
            file_name: None,
            mime_type: Some("image/jpeg".to_string()),
            size: u64::from(photo.file.size),
        });
        return Some(Event::Photo(largest));
    }

    None
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: SessionDialogue,
    ctx: Arc<BotContext>,
) -> Result<()> {
    // Extract user's language code from Telegram
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    let Some(event) = event_from_message(&msg, language_code) else {
        debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
        bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code))
            .await?;
        return Ok(());
    };

    let session = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = %msg.chat.id, state = ?session.state, "Handling message");

    let session = drive(&ctx, msg.chat.id, language_code, session, event).await;

    if session.is_idle() && session.is_empty() {
        dialogue.exit().await?;
    } else {
        dialogue.update(session).await?;
    }

    Ok(())
}
