use serde::Serialize;

use crate::domain::{ChatId, UserId};

/// Platform-agnostic incoming update model.
///
/// Telegram-specific fields live in the Telegram adapter.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingUpdate {
    Command(Command),
    Attachment(AttachmentMessage),
    Text(TextMessage),
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> ChatId {
        match self {
            IncomingUpdate::Command(c) => c.chat_id,
            IncomingUpdate::Attachment(a) => a.chat_id,
            IncomingUpdate::Text(t) => t.chat_id,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            IncomingUpdate::Command(c) => c.user_id,
            IncomingUpdate::Attachment(a) => a.user_id,
            IncomingUpdate::Text(t) => t.user_id,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub name: String,
}

impl Command {
    /// Parse `/cmd@botname args`; returns `None` for anything that is not a
    /// command, or for a command addressed to a bot other than `bot_username`.
    ///
    /// Arguments are ignored: no command takes any.
    pub fn parse(
        chat_id: ChatId,
        user_id: Option<UserId>,
        text: &str,
        bot_username: Option<&str>,
    ) -> Option<Self> {
        let first = text.trim().split_whitespace().next()?;
        let first = first.strip_prefix('/')?;

        let (name, addressee) = match first.split_once('@') {
            Some((name, to)) => (name, Some(to)),
            None => (first, None),
        };
        if let (Some(to), Some(me)) = (addressee, bot_username) {
            if !to.eq_ignore_ascii_case(me.trim_start_matches('@')) {
                return None;
            }
        }

        let name = name.to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            chat_id,
            user_id,
            name,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Photo,
    Video,
    Audio,
    Document,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Photo => "photo",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Document => "document",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AttachmentMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub kind: AttachmentKind,
    /// Download ids in platform order. Photos carry one id per size,
    /// smallest first; everything else carries exactly one.
    pub file_ids: Vec<String>,
}

impl AttachmentMessage {
    /// The variant to upload: the last (highest-resolution) photo size, or
    /// the single attached file.
    pub fn selected_file_id(&self) -> Option<&str> {
        self.file_ids.last().map(String::as_str)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub text: String,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_bot_suffix_and_args() {
        let c = Command::parse(ChatId(1), Some(UserId(2)), "/Upload@sf_bot now please", Some("sf_bot"))
            .unwrap();
        assert_eq!(c.name, "upload");

        let c = Command::parse(ChatId(1), None, "  /cancel ", Some("sf_bot")).unwrap();
        assert_eq!(c.name, "cancel");
    }

    #[test]
    fn non_commands_are_rejected() {
        assert!(Command::parse(ChatId(1), None, "hello", None).is_none());
        assert!(Command::parse(ChatId(1), None, "/", None).is_none());
        assert!(Command::parse(ChatId(1), None, "/@bot", None).is_none());
    }

    #[test]
    fn commands_for_other_bots_are_rejected() {
        let me = Some("SF_Bot");
        assert!(Command::parse(ChatId(1), None, "/upload@some_other_bot", me).is_none());
        assert!(Command::parse(ChatId(1), None, "/upload@sf_bot", me).is_some());
        assert!(Command::parse(ChatId(1), None, "/upload", me).is_some());
        // Unknown own username: the suffix cannot be checked.
        assert!(Command::parse(ChatId(1), None, "/upload@some_other_bot", None).is_some());
    }

    #[test]
    fn photo_selection_takes_largest_size() {
        let msg = AttachmentMessage {
            chat_id: ChatId(1),
            user_id: None,
            kind: AttachmentKind::Photo,
            file_ids: vec!["small".into(), "medium".into(), "large".into()],
        };
        assert_eq!(msg.selected_file_id(), Some("large"));

        let doc = AttachmentMessage {
            kind: AttachmentKind::Document,
            file_ids: vec!["only".into()],
            ..msg.clone()
        };
        assert_eq!(doc.selected_file_id(), Some("only"));

        let empty = AttachmentMessage {
            file_ids: vec![],
            ..msg
        };
        assert_eq!(empty.selected_file_id(), None);
    }
}
