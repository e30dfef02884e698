//! Status messages for end users and diagnostic reports for the operator.

use std::sync::Arc;

use crate::{
    domain::{ChatId, MessageRef},
    formatting::escape_html,
    messaging::port::MessagingPort,
    Result,
};

/// Telegram rejects messages above 4096 characters.
const REPORT_LIMIT: usize = 4096;
const UPDATE_BUDGET: usize = 1600;
const STATE_BUDGET: usize = 300;

/// Diagnostic report about a failed update, rendered as Telegram HTML.
#[derive(Clone, Debug)]
pub struct ErrorReport {
    /// Serialized incoming update (pretty JSON or a plain description).
    pub update: String,
    pub chat_data: String,
    pub user_data: String,
    /// Error chain, as rendered by `{:?}` on an `anyhow::Error`.
    ///
    /// The outermost context names the update that failed; the causes below
    /// it come from the adapter that raised the error. A backtrace is only
    /// appended when `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` is set, and it
    /// points at the place the core error was wrapped, not where it arose.
    pub trace: String,
}

impl ErrorReport {
    pub fn new(
        update: &serde_json::Value,
        chat_data: impl Into<String>,
        user_data: impl Into<String>,
        error: &anyhow::Error,
    ) -> Self {
        let update = serde_json::to_string_pretty(update).unwrap_or_else(|_| update.to_string());
        Self {
            update,
            chat_data: chat_data.into(),
            user_data: user_data.into(),
            trace: format!("{error:?}"),
        }
    }

    pub fn to_html(&self) -> String {
        self.to_html_within(REPORT_LIMIT)
    }

    /// Renders the report so that it never exceeds `limit` characters.
    pub fn to_html_within(&self, limit: usize) -> String {
        let head = "An exception was raised while handling an update\n";
        let update_budget = UPDATE_BUDGET.min(limit * 2 / 5);
        let state_budget = STATE_BUDGET.min(limit / 14);
        let update = section(Some("update"), &self.update, update_budget);
        let chat = section(Some("context.chat_data"), &self.chat_data, state_budget);
        let user = section(Some("context.user_data"), &self.user_data, state_budget);

        let used = head.chars().count()
            + update.chars().count()
            + chat.chars().count()
            + user.chars().count()
            + 6;
        let trace_budget = limit.saturating_sub(used + "<pre></pre>".len());
        let trace = section(None, &self.trace, trace_budget);

        format!("{head}{update}\n\n{chat}\n\n{user}\n\n{trace}")
    }
}

/// Escape, then cap at `budget` characters of escaped text without splitting an entity.
fn section(label: Option<&str>, body: &str, budget: usize) -> String {
    let escaped = escape_html(body);
    let body = truncate_escaped(&escaped, budget);
    match label {
        Some(l) => format!("<pre>{l} = {body}</pre>"),
        None => format!("<pre>{body}</pre>"),
    }
}

fn truncate_escaped(escaped: &str, budget: usize) -> String {
    if escaped.chars().count() <= budget {
        return escaped.to_string();
    }
    let mut out: String = escaped.chars().take(budget.saturating_sub(1)).collect();
    if let Some(amp) = out.rfind('&') {
        if !out[amp..].contains(';') {
            out.truncate(amp);
        }
    }
    out.push('…');
    out
}

/// Delivers [`ErrorReport`]s to the fixed operator chat.
///
/// Delivery failures are returned, not retried.
#[derive(Clone)]
pub struct ErrorReporter {
    messenger: Arc<dyn MessagingPort>,
    operator_chat: ChatId,
}

impl ErrorReporter {
    pub fn new(messenger: Arc<dyn MessagingPort>, operator_chat: ChatId) -> Self {
        Self {
            messenger,
            operator_chat,
        }
    }

    pub async fn report(&self, report: &ErrorReport) -> Result<MessageRef> {
        let limit = self.messenger.capabilities().max_message_len.min(REPORT_LIMIT);
        self.messenger
            .send_html(self.operator_chat, &report.to_html_within(limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_escapes_every_section() {
        let err = anyhow::anyhow!("upload failed: <500>");
        let report = ErrorReport::new(
            &serde_json::json!({"text": "<b>&</b>"}),
            "{'phase': 'awaiting_file'}",
            "{}",
            &err,
        );
        let html = report.to_html();
        assert!(html.starts_with("An exception was raised while handling an update\n<pre>update = {"));
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(html.contains("<pre>context.chat_data = {'phase': 'awaiting_file'}</pre>"));
        assert!(html.contains("<pre>context.user_data = {}</pre>"));
        assert!(html.contains("upload failed: &lt;500&gt;"));
        assert!(!html.contains("<500>"));
    }

    #[test]
    fn oversized_report_fits_telegram_limit() {
        let big = "\"<&>\"".repeat(5_000);
        let report = ErrorReport {
            update: big.clone(),
            chat_data: big.clone(),
            user_data: big.clone(),
            trace: big,
        };
        let html = report.to_html();
        assert!(html.chars().count() <= REPORT_LIMIT, "{}", html.chars().count());
        assert_eq!(html.matches("<pre>").count(), 4);
        assert_eq!(html.matches("</pre>").count(), 4);
    }

    #[test]
    fn truncation_never_splits_entities() {
        let escaped = escape_html("a&b");
        assert_eq!(truncate_escaped(&escaped, 4), "a…");
        assert_eq!(truncate_escaped(&escaped, 6), "a…");
        assert_eq!(truncate_escaped(&escaped, 100), "a&amp;b");

        let escaped = escape_html("a&b c");
        assert_eq!(truncate_escaped(&escaped, 8), "a&amp;b…");
    }

    struct NarrowMessenger {
        sent: tokio::sync::Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for NarrowMessenger {
        fn capabilities(&self) -> crate::messaging::types::MessagingCapabilities {
            crate::messaging::types::MessagingCapabilities {
                max_message_len: 1000,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sent.lock().await.push((chat_id, html.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: crate::domain::MessageId(1),
            })
        }

        async fn edit_html(&self, _msg: MessageRef, _html: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reporter_sends_to_operator_within_messenger_limit() {
        let messenger = Arc::new(NarrowMessenger {
            sent: tokio::sync::Mutex::new(Vec::new()),
        });
        let reporter = ErrorReporter::new(messenger.clone(), ChatId(-100));
        let report = ErrorReport {
            update: "u".repeat(3000),
            chat_data: "{}".into(),
            user_data: "{}".into(),
            trace: "t".repeat(3000),
        };

        reporter.report(&report).await.unwrap();

        let sent = messenger.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChatId(-100));
        assert!(sent[0].1.chars().count() <= 1000);
        assert!(sent[0].1.ends_with("…</pre>"));
    }
}
