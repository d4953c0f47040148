//! Storage backed by one JSON file per key.
//!
//! Each file holds a [`CacheEntry`] envelope. Expiry is checked on read and
//! stale or corrupt files are removed lazily. Writes land in a uniquely named
//! temporary file that is then renamed over the target, so a reader sees either
//! the previous entry or the new one.

use super::{CacheEntry, StorageBackend, StorageKind, key_pattern};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use core::sync::atomic::{AtomicU64, Ordering};
use ohno::IntoAppError;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_TARGET: &str = "     cache";

/// Extension of live entry files.
const ENTRY_EXTENSION: &str = "json";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Longest readable key prefix kept in a file name.
const MAX_STEM_LEN: usize = 96;

#[derive(Debug)]
struct Inner {
    dir: PathBuf,
    write_counter: AtomicU64,
}

/// A directory of JSON entry files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    inner: Arc<Inner>,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).into_app_err_with(|| format!("creating cache directory '{}'", dir.display()))?;
        log::debug!(target: LOG_TARGET, "Using cache directory '{}'", dir.display());

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                write_counter: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Path of the file holding `key`.
    ///
    /// The readable part of the name is lossy, so a short hash of the full key is appended.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        let stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .take(MAX_STEM_LEN)
            .collect();
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        let suffix = digest.get(..8).unwrap_or(&digest);
        self.inner.dir.join(format!("{stem}-{suffix}.{ENTRY_EXTENSION}"))
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .into_app_err("cache storage task failed")?
    }
}

impl Inner {
    /// Read an entry file. Missing and corrupt files are `Ok(None)`; other I/O failures are errors.
    fn read(path: &Path) -> Result<Option<CacheEntry>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).into_app_err_with(|| format!("opening cache file '{}'", path.display())),
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Discarding corrupt cache file '{}': {e:#}", path.display());
                remove_quietly(path);
                Ok(None)
            }
        }
    }

    fn write(&self, path: &Path, entry: &CacheEntry) -> Result<()> {
        let n = self.write_counter.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("{}.{n}.{TEMP_EXTENSION}", std::process::id()));

        let result = write_entry(&tmp_path, entry)
            .and_then(|()| fs::rename(&tmp_path, path).into_app_err_with(|| format!("replacing cache file '{}'", path.display())));

        if result.is_err() {
            remove_quietly(&tmp_path);
        }
        result
    }

    /// All live entry files in the directory.
    fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).into_app_err_with(|| format!("listing cache directory '{}'", self.dir.display())),
        };

        Ok(read_dir
            .filter_map(core::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION))
            .collect())
    }
}

fn write_entry(path: &Path, entry: &CacheEntry) -> Result<()> {
    let file = File::create(path).into_app_err_with(|| format!("creating cache file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    #[cfg(debug_assertions)]
    let result = serde_json::to_writer_pretty(&mut writer, entry);
    #[cfg(not(debug_assertions))]
    let result = serde_json::to_writer(&mut writer, entry);

    result.into_app_err_with(|| format!("writing cache file '{}'", path.display()))?;
    writer
        .flush()
        .into_app_err_with(|| format!("flushing cache file '{}'", path.display()))
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        log::debug!(target: LOG_TARGET, "Unable to remove '{}': {e:#}", path.display());
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::File
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        self.blocking(move |inner| {
            fs::create_dir_all(&inner.dir).into_app_err_with(|| format!("creating cache directory '{}'", inner.dir.display()))?;
            inner.write(&path, &entry)?;
            log::debug!(target: LOG_TARGET, "Stored '{}' until {}", entry.key, entry.expires_at);
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let key = key.to_string();
        self.blocking(move |_| {
            let Some(entry) = Inner::read(&path)? else {
                log::debug!(target: LOG_TARGET, "Cache miss for '{key}'");
                return Ok(None);
            };

            if entry.key != key {
                log::debug!(target: LOG_TARGET, "Cache file '{}' belongs to '{}', not '{key}'", path.display(), entry.key);
                return Ok(None);
            }

            if !entry.is_valid_at(Utc::now()) {
                log::debug!(target: LOG_TARGET, "Cache expired for '{key}' (expired at {})", entry.expires_at);
                remove_quietly(&path);
                return Ok(None);
            }

            log::debug!(target: LOG_TARGET, "Cache hit for '{key}'");
            Ok(Some(entry))
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        self.blocking(move |_| match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).into_app_err_with(|| format!("removing cache file '{}'", path.display())),
        })
        .await
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let pattern = key_pattern(pattern)?;
        self.blocking(move |inner| {
            let mut removed = 0;
            for path in inner.entry_files()? {
                // entries that vanish or fail to parse mid-scan are skipped
                let Ok(Some(entry)) = Inner::read(&path) else {
                    continue;
                };

                if pattern.matches(&entry.key) {
                    fs::remove_file(&path).into_app_err_with(|| format!("removing cache file '{}'", path.display()))?;
                    removed += 1;
                }
            }

            log::debug!(target: LOG_TARGET, "Invalidated {removed} entries matching '{}'", pattern.as_str());
            Ok(removed)
        })
        .await
    }
}
