use std::fs;
use std::io;
use std::path::PathBuf;

use log::{info, warn};
use thiserror::Error;

const FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "VERSION";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store has no usable pages")]
    NoFreePages,
    #[error("store was written with format version {found}, expected {expected}")]
    NewVersionFound { found: u32, expected: u32 },
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Errors that an erase is expected to clear.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::NoFreePages | StoreError::NewVersionFound { .. }
        )
    }
}

pub trait KvStore {
    fn init(&mut self) -> Result<(), StoreError>;
    fn erase(&mut self) -> Result<(), StoreError>;
}

/// Initializes `store`, erasing and retrying once if its contents are unusable.
pub fn init_store<S: KvStore>(store: &mut S) -> Result<(), StoreError> {
    match store.init() {
        Err(err) if err.is_recoverable() => {
            warn!("Store initialization failed ({}), erasing and retrying", err);
            store.erase()?;
            store.init()
        }
        result => result,
    }
}

/// Store namespace kept in a directory and stamped with its format version.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        FileStore { path }
    }

    fn version_path(&self) -> PathBuf {
        self.path.join(VERSION_FILE)
    }
}

impl KvStore for FileStore {
    fn init(&mut self) -> Result<(), StoreError> {
        let version_path = self.version_path();
        if !version_path.exists() {
            info!("Creating store at {}", self.path.display());
            fs::create_dir_all(&self.path)?;
            fs::write(&version_path, FORMAT_VERSION.to_string())?;
            return Ok(());
        }

        let stamp = fs::read(&version_path)?;
        let found: u32 = std::str::from_utf8(&stamp)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or(StoreError::NoFreePages)?;
        if found != FORMAT_VERSION {
            return Err(StoreError::NewVersionFound {
                found,
                expected: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}
