use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::fs;

use anyhow::{anyhow, Context, Result};

/// Persisted key-value slot holding one raw credential string.
pub trait CredentialSlot: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, raw_value: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Process-local slot; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySlot {
    inner: Mutex<Option<String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialSlot for MemorySlot {
    fn load(&self) -> Result<Option<String>> {
        let guard = self.inner.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, raw_value: &str) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        *guard = Some(raw_value.to_owned());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let mut guard = self.inner.lock().map_err(|_| anyhow!("memory slot poisoned"))?;
        *guard = None;
        Ok(())
    }
}

/// Slot backed by a single file. An empty or missing file reads as absent.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CredentialSlot for FileSlot {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let value = content.trim();
                Ok((!value.is_empty()).then(|| value.to_owned()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read credential slot {}", self.path.display())),
        }
    }

    fn save(&self, raw_value: &str) -> Result<()> {
        // write aside, then rename: readers never observe a partial token
        let tmp = self.tmp_path();
        fs::write(&tmp, raw_value.as_bytes())
            .with_context(|| format!("write credential slot {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace credential slot {}", self.path.display()))
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove credential slot {}", self.path.display())),
        }
    }
}
