use std::path::Path;

use sha2::{Digest, Sha256};

use crate::core::error::{StudioError, StudioResult};

/// Hex-encoded SHA-256 of a byte buffer.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of a file's content.
///
/// Reads the whole file into memory; payload DLLs are a few MiB at most.
pub async fn sha256_file(path: &Path) -> StudioResult<String> {
    let bytes = tokio::fs::read(path).await.map_err(|source| StudioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(sha256_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digest() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn file_digest_matches_buffer_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.dll");
        tokio::fs::write(&path, b"NEWPAYLOAD").await.unwrap();
        assert_eq!(sha256_file(&path).await.unwrap(), sha256_bytes(b"NEWPAYLOAD"));
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = sha256_file(Path::new("/nonexistent/file.dll"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("file.dll"));
    }
}
