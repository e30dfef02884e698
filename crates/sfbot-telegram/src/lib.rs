//! Telegram adapter (teloxide).
//!
//! This crate implements the `sfbot-core` MessagingPort and FileSource over
//! the Telegram Bot API.

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*, types::ParseMode, DownloadError};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use sfbot_core::{
    domain::{ChatId, MessageId, MessageRef, RemoteFile},
    errors::Error,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    ports::FileSource,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Flood control: honour one `RetryAfter` before giving up.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }
}

/// Attachment download over the Bot API file endpoint, fully in memory.
#[derive(Clone)]
pub struct TelegramFiles {
    bot: Bot,
}

impl TelegramFiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileSource for TelegramFiles {
    async fn resolve(&self, file_id: &str) -> Result<RemoteFile> {
        let file = self
            .bot
            .get_file(file_id.to_string())
            .await
            .map_err(|e| Error::External(format!("telegram getFile failed: {e}")))?;

        Ok(RemoteFile {
            unique_id: file.meta.unique_id.clone(),
            path: file.path.clone(),
        })
    }

    async fn download(&self, file: &RemoteFile) -> Result<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(|e| match e {
                DownloadError::Io(io) => {
                    Error::Io(std::io::Error::new(io.kind(), io.to_string()))
                }
                other => Error::Transport(format!("telegram download failed: {other}")),
            })?;
        Ok(buf)
    }
}
