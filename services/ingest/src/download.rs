//! Kaggle download client for the complaints dataset.
//!
//! Idempotent: when `complaints.csv` is already on disk the download is
//! skipped and the existing path returned. Otherwise the dataset archive is
//! fetched with basic auth and the CSV extracted next to it.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{Config, DATASET, DATA_FILE_NAME};
use crate::error::{IngestError, Result};

#[derive(Debug, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl KaggleCredentials {
    /// Env vars first, then the standard `~/.kaggle/kaggle.json` file
    /// (`KAGGLE_CONFIG_DIR` overrides the directory).
    pub fn discover() -> Result<Self> {
        if let (Ok(username), Ok(key)) =
            (std::env::var("KAGGLE_USERNAME"), std::env::var("KAGGLE_KEY"))
        {
            return Ok(Self { username, key });
        }
        let dir = std::env::var("KAGGLE_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".kaggle")))
            .map_err(|_| {
                IngestError::DownloadFailed(
                    "no Kaggle credentials: set KAGGLE_USERNAME/KAGGLE_KEY \
                     or provide ~/.kaggle/kaggle.json"
                        .to_string(),
                )
            })?;
        let path = dir.join("kaggle.json");
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            IngestError::DownloadFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| IngestError::DownloadFailed(format!("invalid kaggle.json: {e}")))
    }
}

/// Download and extract the dataset, returning the local CSV path. Skips the
/// network entirely when the file already exists.
pub async fn download_dataset(client: &reqwest::Client, config: &Config) -> Result<PathBuf> {
    let data_path = config.data_path();
    if data_path.exists() {
        return Ok(data_path);
    }

    let creds = KaggleCredentials::discover()?;
    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .map_err(|e| IngestError::DownloadFailed(format!("cannot create download dir: {e}")))?;

    let url = format!("https://www.kaggle.com/api/v1/datasets/download/{DATASET}");
    let response = client
        .get(&url)
        .basic_auth(&creds.username, Some(&creds.key))
        .send()
        .await
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?
        .error_for_status()
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;

    // archive extraction is blocking io
    let dest = data_path.clone();
    tokio::task::spawn_blocking(move || extract_csv(&bytes, &dest))
        .await
        .map_err(|e| IngestError::DownloadFailed(format!("extraction task failed: {e}")))??;

    if !data_path.exists() {
        return Err(IngestError::DownloadFailed(format!(
            "archive did not produce {DATA_FILE_NAME}"
        )));
    }
    Ok(data_path)
}

fn extract_csv(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IngestError::DownloadFailed(format!("bad archive: {e}")))?;
    let mut entry = archive.by_name(DATA_FILE_NAME).map_err(|_| {
        IngestError::DownloadFailed(format!("{DATA_FILE_NAME} not found in archive"))
    })?;
    let mut out = std::fs::File::create(dest)
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;
    std::io::copy(&mut entry, &mut out)
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    #[test]
    fn credentials_parse_from_kaggle_json() {
        let creds =
            KaggleCredentials::from_json(r#"{"username":"someone","key":"abc123"}"#).unwrap();
        assert_eq!(creds.username, "someone");
        assert_eq!(creds.key, "abc123");
    }

    #[test]
    fn malformed_kaggle_json_is_a_download_error() {
        let err = KaggleCredentials::from_json("{\"username\":").unwrap_err();
        assert_eq!(err.kind(), "download_failed");
    }

    #[test]
    fn extracts_the_csv_entry_from_the_archive() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file(DATA_FILE_NAME, FileOptions::default())
                .unwrap();
            writer.write_all(b"Complaint ID\n1\n").unwrap();
            writer.finish().unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(DATA_FILE_NAME);
        extract_csv(buf.get_ref(), &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "Complaint ID\n1\n");
    }

    #[test]
    fn archive_without_the_csv_fails() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer.start_file("readme.txt", FileOptions::default()).unwrap();
            writer.write_all(b"nothing here").unwrap();
            writer.finish().unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let err = extract_csv(buf.get_ref(), &dir.path().join(DATA_FILE_NAME)).unwrap_err();
        assert_eq!(err.kind(), "download_failed");
    }
}
