//! Upload conversation state machine.
//!
//! Each chat is either `Idle` or `AwaitingFile`. Only `AwaitingFile` chats
//! have an entry in the [`SessionStore`]; `Idle` is the absence of a session.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::{ChatId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    UploadCommand,
    Attachment,
    Cancel,
    /// Anything else (plain text, unsupported media).
    Other,
    /// The session outlived the configured upload timeout.
    Expired,
}

/// Side effect the controller performs after a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    SendPrompt,
    Upload,
    SendCancelNotice,
    Ignore,
}

/// The transition table.
pub fn transition(phase: Phase, event: Event) -> (Phase, Action) {
    use Action::*;
    use Event::*;
    use Phase::*;

    match (phase, event) {
        (_, UploadCommand) => (AwaitingFile, SendPrompt),
        (AwaitingFile, Attachment) => (Idle, Upload),
        (AwaitingFile, Cancel) => (Idle, SendCancelNotice),
        (AwaitingFile, Other) => (AwaitingFile, Ignore),
        (AwaitingFile, Expired) => (Idle, Ignore),
        (Idle, Attachment | Cancel | Other | Expired) => (Idle, Ignore),
    }
}

#[derive(Clone, Copy, Debug)]
struct Session {
    started_by: Option<UserId>,
    started_at: Instant,
}

/// Per-chat conversation sessions, in memory only.
pub struct SessionStore {
    timeout: Option<Duration>,
    sessions: Mutex<HashMap<ChatId, Session>>,
}

impl SessionStore {
    /// `timeout = None` keeps abandoned sessions until `/cancel` or restart.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub async fn apply(&self, chat_id: ChatId, user_id: Option<UserId>, event: Event) -> Action {
        self.apply_at(chat_id, user_id, event, Instant::now()).await
    }

    /// Run `event` through the table for `chat_id` and store the next phase.
    pub async fn apply_at(
        &self,
        chat_id: ChatId,
        user_id: Option<UserId>,
        event: Event,
        now: Instant,
    ) -> Action {
        let mut sessions = self.sessions.lock().await;

        let mut phase = match sessions.get(&chat_id) {
            Some(_) => Phase::AwaitingFile,
            None => Phase::Idle,
        };

        let expired = sessions
            .get(&chat_id)
            .is_some_and(|s| self.is_expired(s, now));
        if expired {
            tracing::debug!(chat_id = chat_id.0, "upload session expired");
            phase = transition(phase, Event::Expired).0;
            sessions.remove(&chat_id);
        }

        let (next, action) = transition(phase, event);
        match next {
            Phase::Idle => {
                sessions.remove(&chat_id);
            }
            Phase::AwaitingFile if event == Event::UploadCommand => {
                // A repeated /upload restarts the session instead of stacking.
                sessions.insert(
                    chat_id,
                    Session {
                        started_by: user_id,
                        started_at: now,
                    },
                );
            }
            Phase::AwaitingFile => {}
        }

        action
    }

    pub async fn phase(&self, chat_id: ChatId) -> Phase {
        self.phase_at(chat_id, Instant::now()).await
    }

    pub async fn phase_at(&self, chat_id: ChatId, now: Instant) -> Phase {
        let sessions = self.sessions.lock().await;
        match sessions.get(&chat_id) {
            Some(s) if !self.is_expired(s, now) => Phase::AwaitingFile,
            _ => Phase::Idle,
        }
    }

    fn is_expired(&self, session: &Session, now: Instant) -> bool {
        self.timeout
            .is_some_and(|t| now.saturating_duration_since(session.started_at) >= t)
    }

    /// Debug view of the chat's session, for operator reports.
    pub async fn describe_chat(&self, chat_id: ChatId) -> String {
        let sessions = self.sessions.lock().await;
        match sessions.get(&chat_id) {
            None => "{}".to_string(),
            Some(s) => format!(
                "{{'phase': 'awaiting_file', 'started_by': {}, 'age_secs': {}}}",
                s.started_by
                    .map(|u| u.0.to_string())
                    .unwrap_or_else(|| "None".to_string()),
                s.started_at.elapsed().as_secs()
            ),
        }
    }

    /// Debug view of all sessions a user started, for operator reports.
    pub async fn describe_user(&self, user_id: Option<UserId>) -> String {
        let Some(user_id) = user_id else {
            return "{}".to_string();
        };
        let sessions = self.sessions.lock().await;
        let mut chats: Vec<i64> = sessions
            .iter()
            .filter(|(_, s)| s.started_by == Some(user_id))
            .map(|(c, _)| c.0)
            .collect();
        chats.sort_unstable();
        if chats.is_empty() {
            return "{}".to_string();
        }
        let list = chats
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{'awaiting_file_in': [{list}]}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_conversation_flow() {
        use Action::*;
        use Event::*;
        use Phase::*;

        assert_eq!(transition(Idle, UploadCommand), (AwaitingFile, SendPrompt));
        assert_eq!(transition(AwaitingFile, UploadCommand), (AwaitingFile, SendPrompt));
        assert_eq!(transition(AwaitingFile, Attachment), (Idle, Upload));
        assert_eq!(transition(AwaitingFile, Cancel), (Idle, SendCancelNotice));
        assert_eq!(transition(AwaitingFile, Other), (AwaitingFile, Ignore));
        assert_eq!(transition(AwaitingFile, Expired), (Idle, Ignore));
        for e in [Attachment, Cancel, Other, Expired] {
            assert_eq!(transition(Idle, e), (Idle, Ignore));
        }
    }

    #[tokio::test]
    async fn one_session_per_chat() {
        let store = SessionStore::new(None);
        let chat = ChatId(10);
        let user = Some(UserId(42));

        assert_eq!(store.apply(chat, user, Event::UploadCommand).await, Action::SendPrompt);
        assert_eq!(store.apply(chat, user, Event::UploadCommand).await, Action::SendPrompt);
        assert_eq!(store.phase(chat).await, Phase::AwaitingFile);

        assert_eq!(store.apply(chat, user, Event::Other).await, Action::Ignore);
        assert_eq!(store.phase(chat).await, Phase::AwaitingFile);

        assert_eq!(store.apply(chat, user, Event::Attachment).await, Action::Upload);
        assert_eq!(store.phase(chat).await, Phase::Idle);
        assert_eq!(store.apply(chat, user, Event::Attachment).await, Action::Ignore);
    }

    #[tokio::test]
    async fn chats_are_independent() {
        let store = SessionStore::new(None);
        store.apply(ChatId(1), None, Event::UploadCommand).await;
        assert_eq!(store.phase(ChatId(1)).await, Phase::AwaitingFile);
        assert_eq!(store.phase(ChatId(2)).await, Phase::Idle);
        assert_eq!(store.apply(ChatId(2), None, Event::Cancel).await, Action::Ignore);
        assert_eq!(store.phase(ChatId(1)).await, Phase::AwaitingFile);
    }

    #[tokio::test]
    async fn sessions_expire_lazily_when_timeout_is_set() {
        let store = SessionStore::new(Some(Duration::from_secs(60)));
        let chat = ChatId(5);
        let start = Instant::now();

        store.apply_at(chat, None, Event::UploadCommand, start).await;
        let later = start + Duration::from_secs(61);
        assert_eq!(store.phase_at(chat, later).await, Phase::Idle);
        assert_eq!(
            store.apply_at(chat, None, Event::Attachment, later).await,
            Action::Ignore
        );

        // Restarting before expiry resets the clock.
        store.apply_at(chat, None, Event::UploadCommand, later).await;
        let soon = later + Duration::from_secs(30);
        assert_eq!(
            store.apply_at(chat, None, Event::UploadCommand, soon).await,
            Action::SendPrompt
        );
        let after_first_deadline = later + Duration::from_secs(61);
        assert_eq!(
            store.apply_at(chat, None, Event::Attachment, after_first_deadline).await,
            Action::Upload
        );
    }

    #[tokio::test]
    async fn no_timeout_keeps_sessions() {
        let store = SessionStore::new(None);
        let start = Instant::now();
        store.apply_at(ChatId(1), None, Event::UploadCommand, start).await;
        let much_later = start + Duration::from_secs(60 * 60 * 24 * 30);
        assert_eq!(store.phase_at(ChatId(1), much_later).await, Phase::AwaitingFile);
    }

    #[tokio::test]
    async fn describes_state_for_reports() {
        let store = SessionStore::new(None);
        assert_eq!(store.describe_chat(ChatId(1)).await, "{}");
        store
            .apply(ChatId(1), Some(UserId(42)), Event::UploadCommand)
            .await;
        assert!(store
            .describe_chat(ChatId(1))
            .await
            .contains("'started_by': 42"));
        assert_eq!(
            store.describe_user(Some(UserId(42))).await,
            "{'awaiting_file_in': [1]}"
        );
        assert_eq!(store.describe_user(Some(UserId(7))).await, "{}");
    }
}
