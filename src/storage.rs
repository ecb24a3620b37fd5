//! # Flat-file storage
//! `<data_root>/<YYYY-MM-DD>/<source>.txt` for uploaded/collected drops and
//! `<report_root>/<YYYY-MM-DD>/<kind>.md` for generated reports.
//!
//! Reads are forgiving: a missing file or directory reads as empty. Only
//! malformed dates/filenames and write failures surface as errors.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::fs;

/// Cooldown stamp written next to the collected news list; not a source.
pub const NEWS_COOLDOWN_FILE: &str = "news-next.txt";

static RE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex"));

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid date format: {0:?}")]
    InvalidDate(String),
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// `YYYY-MM-DD` or error.
pub fn sanitize_date(date: &str) -> StorageResult<&str> {
    if RE_DATE.is_match(date) {
        Ok(date)
    } else {
        Err(StorageError::InvalidDate(date.to_string()))
    }
}

/// Keep `[A-Za-z0-9._-]` only; reject empty results and `..`.
pub fn sanitize_filename(filename: &str) -> StorageResult<String> {
    let safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if safe.is_empty() || safe.contains("..") {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(safe)
}

#[derive(Debug, Clone)]
pub struct DataStore {
    data_root: PathBuf,
    report_root: PathBuf,
}

impl DataStore {
    pub fn new(data_root: impl Into<PathBuf>, report_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            report_root: report_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn report_root(&self) -> &Path {
        &self.report_root
    }

    pub async fn ensure_roots(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.data_root).await?;
        fs::create_dir_all(&self.report_root).await?;
        Ok(())
    }

    /// Date directories under the data root, newest first.
    pub async fn list_dates(&self) -> StorageResult<Vec<String>> {
        fs::create_dir_all(&self.data_root).await?;
        let mut dates = list_names(&self.data_root, |n| RE_DATE.is_match(n)).await;
        dates.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dates)
    }

    /// `*.txt` files for `date`, sorted by name. Bookkeeping files are skipped.
    pub async fn list_source_files(&self, date: &str) -> StorageResult<Vec<String>> {
        let dir = self.data_root.join(sanitize_date(date)?);
        let mut files = list_names(&dir, |n| n.ends_with(".txt") && n != NEWS_COOLDOWN_FILE).await;
        files.sort();
        Ok(files)
    }

    pub async fn read_source_file(&self, date: &str, filename: &str) -> StorageResult<String> {
        let path = self
            .data_root
            .join(sanitize_date(date)?)
            .join(sanitize_filename(filename)?);
        Ok(read_or_empty(&path).await)
    }

    /// Returns the sanitised name the content was stored under.
    pub async fn write_source_file(&self, date: &str, filename: &str, content: &str) -> StorageResult<String> {
        let dir = self.data_root.join(sanitize_date(date)?);
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&name), content).await?;
        tracing::info!(target: "storage", date, file = %name, bytes = content.len(), "source file written");
        Ok(name)
    }

    /// Every source file for `date` as `(filename, content)`, in discovery order.
    pub async fn load_date_files(&self, date: &str) -> StorageResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        for name in self.list_source_files(date).await? {
            let content = self.read_source_file(date, &name).await?;
            out.push((name, content));
        }
        Ok(out)
    }

    /// `*.md` files for `date`, sorted by name.
    pub async fn list_reports(&self, date: &str) -> StorageResult<Vec<String>> {
        let dir = self.report_root.join(sanitize_date(date)?);
        let mut files = list_names(&dir, |n| n.ends_with(".md")).await;
        files.sort();
        Ok(files)
    }

    pub async fn read_report(&self, date: &str, filename: &str) -> StorageResult<String> {
        let path = self
            .report_root
            .join(sanitize_date(date)?)
            .join(sanitize_filename(filename)?);
        Ok(read_or_empty(&path).await)
    }

    pub async fn write_report(&self, date: &str, filename: &str, content: &str) -> StorageResult<()> {
        let dir = self.report_root.join(sanitize_date(date)?);
        let name = sanitize_filename(filename)?;
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&name), content).await?;
        tracing::info!(target: "storage", date, file = %name, "report written");
        Ok(())
    }
}

async fn read_or_empty(path: &Path) -> String {
    fs::read_to_string(path).await.unwrap_or_default()
}

/// Entry names in `dir` accepted by `keep`; a missing directory yields nothing.
async fn list_names(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<String> {
    let mut out = Vec::new();
    let Ok(mut rd) = fs::read_dir(dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = rd.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            if keep(name) {
                out.push(name.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_must_be_iso_shaped() {
        assert!(sanitize_date("2025-10-16").is_ok());
        assert!(matches!(sanitize_date("2025-1-16"), Err(StorageError::InvalidDate(_))));
        assert!(sanitize_date("../2025-10-16").is_err());
    }

    #[test]
    fn filename_is_stripped_to_safe_charset() {
        assert_eq!(sanitize_filename("news.txt").unwrap(), "news.txt");
        assert_eq!(sanitize_filename("a/b c.txt").unwrap(), "abc.txt");
        assert!(matches!(sanitize_filename("../x"), Err(StorageError::InvalidFilename(_))));
        assert!(sanitize_filename("뉴스").is_err());
    }
}
