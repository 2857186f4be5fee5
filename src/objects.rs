use crate::error::{SchoolError, SchoolResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const OBJECTS_DIR: &str = "objects";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path relative to the workspace.
    pub path: String,
    pub public_url: String,
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    valid_segment(&ext).then_some(ext)
}

/// Stores `bytes` under `objects/<bucket>/<sha256>.<ext>` and returns its
/// address. Identical content lands on the same file.
pub fn upload(
    workspace: &Path,
    public_base_url: &str,
    bucket: &str,
    file_name: &str,
    bytes: &[u8],
) -> SchoolResult<StoredObject> {
    if !valid_segment(bucket) {
        return Err(SchoolError::bad_params(
            "bucket must be 1-64 characters of [A-Za-z0-9_-]",
        ));
    }
    if bytes.is_empty() {
        return Err(SchoolError::bad_params("object content is empty"));
    }
    let digest = hex::encode(Sha256::digest(bytes));
    let stored_name = match extension_of(file_name) {
        Some(ext) => format!("{digest}.{ext}"),
        None => digest,
    };
    let dir: PathBuf = workspace.join(OBJECTS_DIR).join(bucket);
    std::fs::create_dir_all(&dir)?;
    let target = dir.join(&stored_name);
    if !target.is_file() {
        let tmp = dir.join(format!("{stored_name}.partial"));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &target)?;
    }
    Ok(StoredObject {
        path: format!("{OBJECTS_DIR}/{bucket}/{stored_name}"),
        public_url: format!(
            "{}/{}/{}",
            public_base_url.trim_end_matches('/'),
            bucket,
            stored_name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_content_addressed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = upload(dir.path(), "https://cdn.test/", "avatars", "me.PNG", b"png-bytes")
            .expect("upload");
        let b = upload(dir.path(), "https://cdn.test", "avatars", "other.png", b"png-bytes")
            .expect("upload again");
        assert_eq!(a, b);
        assert!(a.path.ends_with(".png"));
        assert!(a.public_url.starts_with("https://cdn.test/avatars/"));
        assert_eq!(
            std::fs::read(dir.path().join(&a.path)).expect("read back"),
            b"png-bytes"
        );
    }

    #[test]
    fn upload_rejects_path_tricks_and_empty_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(upload(dir.path(), "x", "../etc", "a.png", b"x").is_err());
        assert!(upload(dir.path(), "x", "avatars", "a.png", b"").is_err());
        let no_ext = upload(dir.path(), "x", "avatars", "a.p/ng", b"x").expect("upload");
        assert_eq!(no_ext.path.matches('/').count(), 2);
        assert!(!no_ext.path.contains('.'));
    }
}
