use crate::domain::RemoteFile;

// ============== File Naming ==============

/// Extension of the last `/`-separated segment of a platform path, case preserved.
pub fn file_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Target name for an upload: the platform unique id plus the original extension.
///
/// Unique ids are stable per file, so the same attachment always maps to the
/// same name and different attachments never collide.
pub fn derive_file_name(file: &RemoteFile) -> String {
    match file_extension(&file.path) {
        Some(ext) => format!("{}.{ext}", file.unique_id),
        None => file.unique_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(unique_id: &str, path: &str) -> RemoteFile {
        RemoteFile {
            unique_id: unique_id.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn name_keeps_extension_case() {
        assert_eq!(derive_file_name(&remote("abc123", "foo/bar.JPG")), "abc123.JPG");
        assert_eq!(
            derive_file_name(&remote("AgADq", "documents/file_7.tar.gz")),
            "AgADq.gz"
        );
    }

    #[test]
    fn name_without_extension_is_bare_unique_id() {
        assert_eq!(derive_file_name(&remote("u1", "voice/file_1")), "u1");
        assert_eq!(derive_file_name(&remote("u2", "dir.d/file")), "u2");
        assert_eq!(derive_file_name(&remote("u3", "photos/.hidden")), "u3");
        assert_eq!(derive_file_name(&remote("u4", "photos/trailing.")), "u4");
    }

    #[test]
    fn naming_is_deterministic() {
        let f = remote("AQADxyz", "photos/file_12.jpg");
        assert_eq!(derive_file_name(&f), derive_file_name(&f.clone()));
        assert_ne!(
            derive_file_name(&f),
            derive_file_name(&remote("AQADxy0", "photos/file_12.jpg"))
        );
    }
}
