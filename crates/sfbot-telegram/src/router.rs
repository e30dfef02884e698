use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*,
    utils::command::BotCommands,
};

use sfbot_core::{
    config::Settings,
    controller::{BotController, BotDeps},
    conversation::SessionStore,
    messaging::port::MessagingPort,
    notifier::ErrorReporter,
    ports::StorageGateway,
    security::AccessGuard,
    texts::Texts,
};

use crate::{handlers, TelegramFiles, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    /// Own username from `getMe`; `None` if the lookup failed.
    pub bot_username: Option<String>,
    pub controller: Arc<BotController>,
    pub reporter: ErrorReporter,
}

/// Command menu shown by Telegram clients.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum MenuCommand {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "get the link to the shared folder")]
    Link,
    #[command(description = "upload a photo or file")]
    Upload,
    #[command(description = "stop uploading")]
    Cancel,
}

pub async fn run_polling(
    settings: Arc<Settings>,
    storage: Arc<dyn StorageGateway>,
    texts: Arc<Texts>,
) -> anyhow::Result<()> {
    let bot = Bot::new(settings.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            tracing::info!(username = %me.username(), "bot started");
            Some(me.username().to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "getMe failed, accepting commands for any bot");
            None
        }
    };
    if let Err(e) = bot.set_my_commands(MenuCommand::bot_commands()).await {
        tracing::warn!(error = %e, "failed to register command menu");
    }

    let guard = AccessGuard::new(settings.allowed_ids.clone());
    if guard.is_unrestricted() {
        tracing::warn!("ALLOWED_IDS is empty: restricted commands are open to everyone");
    } else {
        tracing::info!(allowed = settings.allowed_ids.len(), "access restricted");
    }
    tracing::info!(storage = %storage.describe(), "upload target");

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let controller = Arc::new(BotController::new(
        guard,
        texts,
        SessionStore::new(settings.upload_timeout),
        BotDeps {
            messenger: messenger.clone(),
            files: Arc::new(TelegramFiles::new(bot.clone())),
            storage,
        },
    ));

    let state = Arc::new(AppState {
        bot_username,
        controller,
        reporter: ErrorReporter::new(messenger, settings.developer_chat_id),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error from the update handler",
        ))
        .build()
        .dispatch()
        .await;

    Ok(())
}
