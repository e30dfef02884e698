//! Telegram update handlers.
//!
//! Each message is mapped to a core `IncomingUpdate` and handed to the
//! controller, which reports failures to the operator chat; the process keeps
//! running.

use std::sync::Arc;

use anyhow::Context;
use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod inbound;

pub use inbound::to_incoming;

pub async fn handle_message(upd: Update, msg: Message, state: Arc<AppState>) -> anyhow::Result<()> {
    let incoming = to_incoming(&msg, state.bot_username.as_deref());

    let update_json = serde_json::to_value(&upd)
        .unwrap_or_else(|_| serde_json::Value::String(format!("{upd:?}")));

    // Delivery failures go to the dispatcher's error handler.
    state
        .controller
        .handle_and_report(incoming, &update_json, &state.reporter)
        .await
        .context("failed to deliver error report to the operator chat")?;
    Ok(())
}
