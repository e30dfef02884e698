use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

const DEFAULT_LOG_ROTATION_MB: u64 = 128;
const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 60;

/// Typed, immutable settings for the bot process.
///
/// Built once at startup and shared as `Arc<Settings>`.
#[derive(Clone, Debug)]
pub struct Settings {
    // Telegram
    pub telegram_bot_token: String,
    pub allowed_ids: Vec<i64>,
    pub developer_chat_id: ChatId,

    // Seafile
    pub seafile_url: String,
    pub seafile_email: String,
    pub seafile_password: String,
    pub seafile_repo: String,
    pub seafile_dir: String,
    pub storage_timeout: Duration,

    // Conversation
    pub upload_timeout: Option<Duration>,

    // Logging
    pub log_dir: PathBuf,
    pub log_rotation_bytes: u64,

    // Message templates
    pub messages_file: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build settings from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key).and_then(non_empty).ok_or_else(|| {
                Error::Config(format!("{key} environment variable is required"))
            })
        };

        // Required env vars
        let telegram_bot_token = required("TG_TOKEN")?;
        let seafile_url = required("SEAFILE_URL")?;
        let seafile_email = required("SEAFILE_EMAIL")?;
        let seafile_password = required("SEAFILE_PASSWORD")?;
        let seafile_repo = required("SEAFILE_REPO")?;

        let developer_chat_raw = required("DEVELOPER_CHAT_ID")?;
        let developer_chat_id = developer_chat_raw
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| {
                Error::Config(format!(
                    "DEVELOPER_CHAT_ID must be a numeric chat id, got {developer_chat_raw:?}"
                ))
            })?;

        // Empty allow-list means unrestricted.
        let allowed_ids = parse_id_list(lookup("ALLOWED_IDS"))?;

        let seafile_dir = lookup("SEAFILE_DIR")
            .and_then(non_empty)
            .map(|d| normalize_dir(&d))
            .unwrap_or_else(|| "/".to_string());
        let storage_timeout = Duration::from_secs(
            parse_u64(&lookup, "SEAFILE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_STORAGE_TIMEOUT_SECS),
        );

        let upload_timeout = parse_u64(&lookup, "UPLOAD_TIMEOUT_SECS")?
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        let log_dir = PathBuf::from(
            lookup("LOG_DIR")
                .and_then(non_empty)
                .unwrap_or_else(|| "logs".to_string()),
        );
        let log_rotation_bytes = parse_u64(&lookup, "LOG_ROTATION_MB")?
            .unwrap_or(DEFAULT_LOG_ROTATION_MB)
            .max(1)
            * 1024
            * 1024;

        let messages_file = lookup("MESSAGES_FILE")
            .and_then(non_empty)
            .map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            allowed_ids,
            developer_chat_id,
            seafile_url: seafile_url.trim_end_matches('/').to_string(),
            seafile_email,
            seafile_password,
            seafile_repo,
            seafile_dir,
            storage_timeout,
            upload_timeout,
            log_dir,
            log_rotation_bytes,
            messages_file,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// Ids may be separated by whitespace and/or commas.
fn parse_id_list(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("ALLOWED_IDS contains a non-numeric id: {s:?}")))
        })
        .collect()
}

fn normalize_dir(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
