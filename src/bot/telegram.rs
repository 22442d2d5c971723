//! Messaging platform seam.
//!
//! The conversation driver talks to Telegram only through [`Messenger`];
//! tests substitute a recording fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, ReplyMarkup};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::RetryConfig;

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str, markup: Option<ReplyMarkup>)
        -> Result<()>;

    /// Send a file as a document under `file_name`
    async fn send_document(&self, chat_id: ChatId, path: &Path, file_name: &str) -> Result<()>;

    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<()>;

    /// Download a platform file to `dest`
    async fn download(&self, file_id: &str, dest: &Path) -> Result<()>;
}

/// [`Messenger`] backed by the Bot API
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(retry.download_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { bot, client, retry })
    }

    async fn download_once(&self, file_id: &str, dest: &Path) -> Result<()> {
        let file = self.bot.get_file(FileId(file_id.to_string())).await?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let response = open_file_stream(&self.client, &url).await?;
        let mut stream = response.bytes_stream();
        let mut out = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(reqwest::Error::without_url)?;
            out.write_all(&chunk).await?;
            written += chunk.len();
        }
        out.flush().await?;

        debug!(file_id, bytes = written, "File downloaded");
        Ok(())
    }
}

/// GET a Bot API file URL. File URLs embed the bot token, so errors are
/// stripped of their URL before they can reach a log line.
async fn open_file_stream(client: &reqwest::Client, url: &str) -> reqwest::Result<reqwest::Response> {
    client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(reqwest::Error::without_url)
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        let request = self.bot.send_message(chat_id, text);
        match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, path: &Path, file_name: &str) -> Result<()> {
        let file = InputFile::file(path.to_path_buf()).file_name(file_name.to_string());
        self.bot.send_document(chat_id, file).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<()> {
        self.bot
            .send_photo(chat_id, InputFile::file(path.to_path_buf()))
            .await?;
        Ok(())
    }

    async fn download(&self, file_id: &str, dest: &Path) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.download_once(file_id, dest).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        file_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Download failed after {} attempts", attempt + 1)
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_errors_do_not_leak_token() {
        let client = reqwest::Client::new();
        // nothing listens on port 1
        let url = "http://127.0.0.1:1/file/bot123456:SECRET_TOKEN/documents/file_1.pdf";

        let err = open_file_stream(&client, url).await.unwrap_err();
        let logged = format!("{:#}", anyhow::Error::from(err));
        assert!(!logged.contains("SECRET_TOKEN"), "{logged}");
        assert!(!logged.contains("/file/bot"), "{logged}");
    }
}
