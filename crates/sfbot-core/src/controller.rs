//! Update dispatch: access guard, conversation transitions and the upload path.

use std::sync::Arc;

use crate::{
    conversation::{Action, Event, SessionStore},
    domain::{ChatId, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{AttachmentMessage, Command, IncomingUpdate},
    },
    notifier::{ErrorReport, ErrorReporter},
    ports::{FileSource, StorageGateway},
    security::AccessGuard,
    texts::Texts,
    utils::derive_file_name,
    Result,
};

/// Everything the controller talks to, injected at startup.
pub struct BotDeps {
    pub messenger: Arc<dyn MessagingPort>,
    pub files: Arc<dyn FileSource>,
    pub storage: Arc<dyn StorageGateway>,
}

pub struct BotController {
    guard: AccessGuard,
    texts: Arc<Texts>,
    sessions: SessionStore,
    messenger: Arc<dyn MessagingPort>,
    files: Arc<dyn FileSource>,
    storage: Arc<dyn StorageGateway>,
}

impl BotController {
    pub fn new(guard: AccessGuard, texts: Arc<Texts>, sessions: SessionStore, deps: BotDeps) -> Self {
        Self {
            guard,
            texts,
            sessions,
            messenger: deps.messenger,
            files: deps.files,
            storage: deps.storage,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one update to completion.
    ///
    /// Errors are returned to the caller, which owns operator reporting.
    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Attachment(att) => self.handle_attachment(att).await,
            IncomingUpdate::Text(t) => {
                let action = self.sessions.apply(t.chat_id, t.user_id, Event::Other).await;
                tracing::debug!(
                    chat_id = t.chat_id.0,
                    ?action,
                    "ignoring non-attachment message"
                );
                Ok(())
            }
        }
    }

    /// Handle one update; on failure log it and send an [`ErrorReport`] to
    /// the operator chat.
    ///
    /// `raw_update` is the platform's serialized update, quoted verbatim in
    /// the report. Only a failed report delivery is returned.
    pub async fn handle_and_report(
        &self,
        update: IncomingUpdate,
        raw_update: &serde_json::Value,
        reporter: &ErrorReporter,
    ) -> Result<()> {
        let chat_id = update.chat_id();
        let user_id = update.user_id();
        let what = describe_update(&update);

        let Err(e) = self.handle(update).await else {
            return Ok(());
        };

        let origin = match raw_update.get("update_id") {
            Some(id) => format!("{what} (update {id}) from chat {}", chat_id.0),
            None => format!("{what} from chat {}", chat_id.0),
        };
        let err = anyhow::Error::new(e).context(format!("failed to handle {origin}"));
        tracing::error!(error = ?err, "exception while handling an update");

        let report = ErrorReport::new(
            raw_update,
            self.sessions.describe_chat(chat_id).await,
            self.sessions.describe_user(user_id).await,
            &err,
        );
        reporter.report(&report).await.map(|_| ())
    }

    async fn handle_command(&self, cmd: Command) -> Result<()> {
        let user = cmd.user_id.map(|u| u.0);
        match cmd.name.as_str() {
            "start" | "help" => {
                tracing::debug!(user_id = user, "sent /{}", cmd.name);
                self.send(cmd.chat_id, &self.texts.start).await
            }
            "link" => {
                if !self.guard.permit(cmd.user_id, "link") {
                    return Ok(());
                }
                tracing::debug!(user_id = user, "sent /link");
                self.send(cmd.chat_id, &self.texts.link).await
            }
            "upload" => {
                if !self.guard.permit(cmd.user_id, "upload") {
                    return Ok(());
                }
                tracing::debug!(user_id = user, "sent /upload, starting upload conversation");
                self.apply(cmd.chat_id, cmd.user_id, Event::UploadCommand)
                    .await
            }
            "cancel" => {
                tracing::debug!(user_id = user, "sent /cancel");
                self.apply(cmd.chat_id, cmd.user_id, Event::Cancel).await
            }
            other => {
                tracing::debug!(user_id = user, command = other, "unknown command");
                self.sessions
                    .apply(cmd.chat_id, cmd.user_id, Event::Other)
                    .await;
                Ok(())
            }
        }
    }

    async fn apply(&self, chat_id: ChatId, user_id: Option<UserId>, event: Event) -> Result<()> {
        match self.sessions.apply(chat_id, user_id, event).await {
            Action::SendPrompt => self.send(chat_id, &self.texts.upload).await,
            Action::SendCancelNotice => {
                tracing::debug!(
                    user_id = user_id.map(|u| u.0),
                    "upload conversation cancelled"
                );
                self.send(chat_id, &self.texts.cancel).await
            }
            Action::Upload | Action::Ignore => Ok(()),
        }
    }

    async fn handle_attachment(&self, att: AttachmentMessage) -> Result<()> {
        match self
            .sessions
            .apply(att.chat_id, att.user_id, Event::Attachment)
            .await
        {
            Action::Upload => self.upload(att).await,
            _ => {
                tracing::debug!(
                    chat_id = att.chat_id.0,
                    kind = att.kind.as_str(),
                    "attachment outside of an upload conversation"
                );
                Ok(())
            }
        }
    }

    /// Download the attachment and push it to storage, editing the status
    /// message to the terminal outcome.
    async fn upload(&self, att: AttachmentMessage) -> Result<()> {
        let status = self
            .messenger
            .send_html(att.chat_id, &self.texts.upload_start)
            .await?;

        match self.transfer(&att).await {
            Ok(name) => {
                tracing::debug!(file_name = %name, "file uploaded successfully");
                self.messenger
                    .edit_html(status, &self.texts.upload_success)
                    .await
            }
            Err(e) => {
                tracing::warn!(
                    chat_id = att.chat_id.0,
                    kind = att.kind.as_str(),
                    error = %e,
                    "upload failed"
                );
                if let Err(edit_err) = self
                    .messenger
                    .edit_html(status, &self.texts.upload_error)
                    .await
                {
                    tracing::warn!(error = %edit_err, "failed to edit status message");
                }
                Err(e)
            }
        }
    }

    async fn transfer(&self, att: &AttachmentMessage) -> Result<String> {
        let file_id = att.selected_file_id().ok_or_else(|| {
            Error::External(format!("{} message without a file", att.kind.as_str()))
        })?;

        let remote = self.files.resolve(file_id).await?;
        let name = derive_file_name(&remote);
        tracing::debug!(file_name = %name, "start uploading file");

        let bytes = self.files.download(&remote).await?;
        self.storage.upload(bytes, &name).await?;
        Ok(name)
    }

    async fn send(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.messenger.send_html(chat_id, html).await.map(|_| ())
    }
}

fn describe_update(update: &IncomingUpdate) -> String {
    match update {
        IncomingUpdate::Command(c) => format!("/{}", c.name),
        IncomingUpdate::Attachment(a) => format!("{} upload", a.kind.as_str()),
        IncomingUpdate::Text(_) => "text message".to_string(),
    }
}
