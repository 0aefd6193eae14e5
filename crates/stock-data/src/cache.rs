//! Disk cache for stock records
//!
//! Layout: `{cache_dir}/{ticker}_data.json`, one JSON document per ticker.
//! Each document carries the time it was written; freshness is measured
//! from that timestamp rather than from file mtime, so copying or restoring
//! the directory does not revive stale data.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::error::CacheError;
use crate::model::{StockRecord, TickerSymbol};

const FILE_SUFFIX: &str = "_data.json";

/// On-disk cache document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub record: StockRecord,
}

impl CacheEntry {
    /// Whether the entry is younger than `ttl` at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.stored_at).to_std() {
            Ok(age) => age < ttl,
            // stored_at is in the future: clock moved backwards
            Err(_) => true,
        }
    }
}

/// File-per-ticker cache with a fixed freshness window
#[derive(Debug, Clone)]
pub struct StockCache {
    dir: PathBuf,
    ttl: Duration,
}

impl StockCache {
    /// Create a cache rooted at `dir`. Nothing touches the filesystem until
    /// the first read or write.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the cache file for a ticker
    pub fn path_for(&self, ticker: &TickerSymbol) -> PathBuf {
        self.dir.join(format!("{}{FILE_SUFFIX}", ticker.cache_key()))
    }

    /// Read the entry for `ticker`, whatever its age.
    ///
    /// Returns `Ok(None)` when no file exists.
    pub async fn load(&self, ticker: &TickerSymbol) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(ticker);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        Ok(Some(entry))
    }

    /// Read the record for `ticker` if it is still fresh at `now`.
    pub async fn load_fresh(
        &self,
        ticker: &TickerSymbol,
        now: DateTime<Utc>,
    ) -> Result<Option<StockRecord>, CacheError> {
        Ok(self
            .load(ticker)
            .await?
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| entry.record))
    }

    /// Persist a record, stamped with `now`.
    ///
    /// The document is written to a uniquely named temp file and renamed
    /// over the target, so concurrent readers see either the old or the new
    /// entry and concurrent writers resolve last-writer-wins.
    pub async fn store(
        &self,
        record: &StockRecord,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let entry = CacheEntry {
            stored_at: now,
            record: record.clone(),
        };
        let body = serde_json::to_vec(&entry)?;

        let path = self.path_for(&record.ticker);
        let tmp_path = path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));

        fs::write(&tmp_path, &body)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(CacheError::Io { path, source });
        }

        Ok(path)
    }

    /// Remove the entry for `ticker`. Returns whether a file was removed.
    pub async fn invalidate(&self, ticker: &TickerSymbol) -> Result<bool, CacheError> {
        let path = self.path_for(ticker);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Remove every cache entry (and leftover temp files). Other files in
    /// the directory are left alone. Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut removed = 0;
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(CacheError::Io {
                        path: self.dir.clone(),
                        source,
                    });
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_entry = name.ends_with(FILE_SUFFIX);
            let is_leftover = name.contains(FILE_SUFFIX) && name.ends_with(".tmp");
            if !is_entry && !is_leftover {
                continue;
            }

            let path = entry.path();
            fs::remove_file(&path)
                .await
                .map_err(|source| CacheError::Io { path, source })?;
            if is_entry {
                removed += 1;
            }
        }

        Ok(removed)
    }
}
