use std::path::{Path, PathBuf};

use anyhow::bail;
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

pub const UPLOADS_DIR: &str = "uploads";
pub const OFFERS_DIR: &str = "offers";

pub async fn prepare_io() -> anyhow::Result<()> {
    create_dir_all(UPLOADS_DIR).await?;
    create_dir_all(OFFERS_DIR).await?;
    Ok(())
}

/// Persists one uploaded receipt under a freshly minted name, so uploads
/// from different students can never collide. Returns the stored name.
pub async fn store_upload(bytes: &[u8], original_name: Option<&str>) -> anyhow::Result<String> {
    if bytes.is_empty() {
        bail!("refusing to store an empty upload");
    }
    let name = match original_name.and_then(extension) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    write_io_file(PathBuf::from(UPLOADS_DIR).join(&name), bytes).await?;
    Ok(name)
}

// The extension is the only part of the client's filename we keep.
fn extension(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

/// Overwrites silently; offer letters are regenerated in place.
pub async fn write_io_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        create_dir_all(parent).await?;
    }
    let file = File::create(path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_io_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("tried to read nonexistent file {}", path.display());
    }
    let mut bytes = Vec::new();
    BufReader::new(File::open(path).await?)
        .read_to_end(&mut bytes)
        .await?;
    Ok(bytes)
}

pub fn io_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_uploads_are_rejected() {
        assert!(store_upload(b"", Some("receipt.png")).await.is_err());
    }

    #[tokio::test]
    async fn write_overwrites_and_read_returns_the_latest() {
        let path = std::env::temp_dir().join(format!("counseling-io-{}.txt", Uuid::new_v4()));

        write_io_file(&path, b"first").await.unwrap();
        write_io_file(&path, b"second").await.unwrap();
        assert!(io_file_exists(&path));
        assert_eq!(read_io_file(&path).await.unwrap(), b"second");

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(read_io_file(&path).await.is_err());
    }

    #[test]
    fn only_the_extension_of_the_client_name_survives() {
        assert_eq!(extension("receipt.png"), Some("png"));
        assert_eq!(extension("../../etc/passwd.png"), Some("png"));
        assert_eq!(extension("no-extension"), None);
    }
}
