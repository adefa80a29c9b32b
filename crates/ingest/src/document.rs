use racun_scan::ImageOrigin;
use sha2::{Digest, Sha256};
use std::path::Path;

/// One unit of work for the pipeline: raw bytes plus a stable id so that
/// re-ingesting the same document is a no-op.
#[derive(Debug, Clone)]
pub struct Document {
    pub external_id: String,
    pub storage_path: Option<String>,
    pub bytes: Vec<u8>,
    pub origin: ImageOrigin,
}

impl Document {
    pub fn new(external_id: impl Into<String>, bytes: Vec<u8>, origin: ImageOrigin) -> Self {
        Self { external_id: external_id.into(), storage_path: None, bytes, origin }
    }

    /// Read a stored file. The external id is the SHA-256 of its content.
    pub async fn from_file(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            external_id: sha256_hex(&bytes),
            storage_path: Some(path.display().to_string()),
            bytes,
            origin: ImageOrigin::Stored,
        })
    }
}

/// Lowercase hex SHA-256 digest (64 chars).
pub fn sha256_hex(data: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(data).into();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn file_id_depends_on_content_only() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let da = Document::from_file(&a).await.unwrap();
        let db = Document::from_file(&b).await.unwrap();
        assert_eq!(da.external_id, db.external_id);
        assert_ne!(da.storage_path, db.storage_path);
        assert_eq!(da.origin, ImageOrigin::Stored);
    }
}
