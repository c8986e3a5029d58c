//! File-backed settings store: one file per key inside a directory,
//! standing in for the controller's non-volatile storage on a host system.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use trainer_traits::SettingsStore;

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the backing directory.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are short identifiers; anything path-like is rejected by
        // construction upstream, but guard anyway.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(safe)
    }
}

impl SettingsStore for FileStore {
    fn get_blob(&mut self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "settings read failed");
                None
            }
        }
    }

    fn put_blob(
        &mut self,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        fs::write(self.path_for(key), bytes).map_err(|e| Box::new(crate::HwError::Io(e)) as _)
    }
}
