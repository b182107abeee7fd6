use std::future::Future;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Run `body` with a fresh uniquely-named directory under the system temp
/// root. The directory tree is removed on every exit path, including when
/// `body` fails or the surrounding task is cancelled.
pub async fn with_temp_dir<F, Fut, T>(body: F) -> Result<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let dir = tempfile::Builder::new().prefix("shipwright-").tempdir()?;
    let path = dir.path().to_path_buf();

    let result = body(path).await;

    if let Err(err) = dir.close() {
        tracing::warn!("failed to remove temp workspace: {}", err);
    }

    result
}

/// Calculate the SHA256 hash of a file, hex encoded.
pub async fn calculate_sha256(path: &Path) -> Result<String> {
    let content = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_with_temp_dir_removes_on_success() {
        let mut seen = None;
        with_temp_dir(|path| {
            seen = Some(path.clone());
            async move {
                assert!(path.is_dir());
                tokio::fs::write(path.join("artifact"), b"data").await?;
                Ok(())
            }
        })
        .await
        .unwrap();

        assert!(!seen.unwrap().exists());
    }

    #[tokio::test]
    async fn test_with_temp_dir_removes_on_error() {
        let mut seen = None;
        let result: Result<()> = with_temp_dir(|path| {
            seen = Some(path.clone());
            async move { Err(Error::InvalidArgument("boom".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert!(!seen.unwrap().exists());
    }

    #[tokio::test]
    async fn test_calculate_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        tokio::fs::write(&file, b"Hello, World!").await.unwrap();

        let hash = calculate_sha256(&file).await.unwrap();
        assert_eq!(
            hash,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }
}
