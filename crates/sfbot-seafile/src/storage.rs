use async_trait::async_trait;

use sfbot_core::{config::Settings, errors::Error, ports::StorageGateway, Result};

use crate::{client::SeafileClient, repo::SeafDir};

/// `StorageGateway` backed by one folder of one Seafile library.
///
/// The folder is resolved once; a rename on the server side needs a restart.
#[derive(Clone, Debug)]
pub struct SeafileStorage {
    dir: SeafDir,
}

impl SeafileStorage {
    pub fn new(dir: SeafDir) -> Self {
        Self { dir }
    }

    /// Connect, look up the configured library and resolve the target folder.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let client = SeafileClient::connect(
            &settings.seafile_url,
            &settings.seafile_email,
            &settings.seafile_password,
            settings.storage_timeout,
        )
        .await?;

        let repo = match client.repos().get_repo(&settings.seafile_repo).await {
            Ok(repo) => repo,
            Err(Error::NotFound(msg)) => {
                if let Ok(repos) = client.repos().list_repos().await {
                    let available = repos
                        .iter()
                        .map(|r| format!("{} ({})", r.name, r.id))
                        .collect::<Vec<_>>()
                        .join(", ");
                    tracing::error!(%available, "configured SEAFILE_REPO not found");
                }
                return Err(Error::NotFound(msg));
            }
            Err(e) => return Err(e),
        };

        let dir = repo.get_dir(&settings.seafile_dir).await?;
        tracing::info!(
            repo = %repo.info().name,
            dir = %dir.path(),
            "upload target resolved"
        );
        Ok(Self::new(dir))
    }
}

#[async_trait]
impl StorageGateway for SeafileStorage {
    fn describe(&self) -> String {
        format!(
            "seafile:{}{}",
            self.dir.repo().info().name,
            self.dir.path()
        )
    }

    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<()> {
        let size = bytes.len();
        self.dir.upload(bytes, name).await?;
        tracing::debug!(file_name = name, size, "stored in seafile");
        Ok(())
    }
}
