//! Fixed user-facing message templates (Telegram HTML).

use std::path::Path;

use serde::Deserialize;

use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Texts {
    pub start: String,
    pub link: String,
    pub upload: String,
    pub upload_start: String,
    pub upload_success: String,
    pub upload_error: String,
    pub cancel: String,
}

impl Default for Texts {
    fn default() -> Self {
        Self {
            start: "👋 <b>Hi!</b>\n\nI put your photos and files into the shared cloud folder.\n\n\
/upload - send a file to the cloud\n\
/link - get the link to the folder\n\
/cancel - stop uploading"
                .to_string(),
            link: "🔗 The shared folder is available from the cloud web interface.".to_string(),
            upload: "📎 Send me a photo, video, audio or document.\n\nUse /cancel to stop."
                .to_string(),
            upload_start: "⏳ <i>Uploading...</i>".to_string(),
            upload_success: "✅ File uploaded.".to_string(),
            upload_error: "❌ Could not upload the file. Please try again later.".to_string(),
            cancel: "Upload cancelled.".to_string(),
        }
    }
}

/// Partial override file; absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextsOverride {
    start: Option<String>,
    link: Option<String>,
    upload: Option<String>,
    upload_start: Option<String>,
    upload_success: Option<String>,
    upload_error: Option<String>,
    cancel: Option<String>,
}

impl Texts {
    /// Defaults, optionally overridden by a JSON object file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let o: TextsOverride = serde_json::from_str(raw)?;
        let d = Self::default();
        Ok(Self {
            start: o.start.unwrap_or(d.start),
            link: o.link.unwrap_or(d.link),
            upload: o.upload.unwrap_or(d.upload),
            upload_start: o.upload_start.unwrap_or(d.upload_start),
            upload_success: o.upload_success.unwrap_or(d.upload_success),
            upload_error: o.upload_error.unwrap_or(d.upload_error),
            cancel: o.cancel.unwrap_or(d.cancel),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    #[test]
    fn partial_override_keeps_defaults() {
        let t = Texts::from_json(r#"{"link": "<a href=\"https://x\">folder</a>"}"#).unwrap();
        assert_eq!(t.link, r#"<a href="https://x">folder</a>"#);
        assert_eq!(t.upload_success, Texts::default().upload_success);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Texts::from_json(r#"{"lnk": "typo"}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Texts::load(Some(Path::new("/nonexistent/sfbot/messages.json"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(Texts::load(None).unwrap(), Texts::default());
    }
}
