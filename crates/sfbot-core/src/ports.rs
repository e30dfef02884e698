use async_trait::async_trait;

use crate::{domain::RemoteFile, Result};

/// Hexagonal port for the remote file-storage backend.
///
/// Implementations hold one authenticated session and one resolved target
/// folder for the whole process lifetime. Failures surface immediately:
/// `Error::Transport` for network/protocol problems, `Error::Io` for local
/// buffering problems. No retries.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Human-readable description of the target (for logs).
    fn describe(&self) -> String;

    async fn upload(&self, bytes: Vec<u8>, name: &str) -> Result<()>;
}

/// Hexagonal port for fetching attachments from the chat platform.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Resolve a download id into the platform's unique id and file path.
    async fn resolve(&self, file_id: &str) -> Result<RemoteFile>;

    /// Download the whole file into memory.
    async fn download(&self, file: &RemoteFile) -> Result<Vec<u8>>;
}
