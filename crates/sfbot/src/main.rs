use std::{process::ExitCode, sync::Arc};

use sfbot_core::{config::Settings, ports::StorageGateway, texts::Texts};
use sfbot_seafile::SeafileStorage;

#[tokio::main]
async fn main() -> ExitCode {
    let logs = match sfbot_core::logging::init("sfbot") {
        Ok(h) => h,
        Err(e) => {
            eprintln!("sfbot: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = match Settings::load() {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logs.attach_file(&settings.log_dir, settings.log_rotation_bytes) {
        tracing::error!(error = %e, log_dir = %settings.log_dir.display(), "cannot open log file");
        return ExitCode::FAILURE;
    }

    match run(settings).await {
        Ok(()) => {
            tracing::info!("bot stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = ?e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Arc<Settings>) -> anyhow::Result<()> {
    let texts = Arc::new(Texts::load(settings.messages_file.as_deref())?);

    let storage: Arc<dyn StorageGateway> = Arc::new(SeafileStorage::open(&settings).await?);

    tracing::info!("bot starts");
    sfbot_telegram::router::run_polling(settings, storage, texts).await
}
