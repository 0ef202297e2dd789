use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{PptError, Result};

use super::lock::{acquire_lock, LockMode, LOCK_FILE};
use super::StreamStore;

const TMP_SUFFIX: &str = ".tmp";

/// One file per stream under `root`. Writes are atomic (tmp + rename) and
/// serialized by an exclusive lock on `<root>/LOCK`.
#[derive(Debug, Clone)]
pub struct DirStreams {
    root: PathBuf,
}

impl DirStreams {
    /// Open an existing directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(PptError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("stream directory {} does not exist", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Create the directory if needed.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name == LOCK_FILE
            || name.ends_with(TMP_SUFFIX)
            || name.contains(|c: char| c == '/' || c == '\\')
            || name == "."
            || name == ".."
        {
            return Err(PptError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid stream name '{}'", name),
            )));
        }
        Ok(self.root.join(name))
    }
}

fn fsync_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

impl StreamStore for DirStreams {
    fn read_stream(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.stream_path(name)?;
        let _lk = acquire_lock(&self.root, LockMode::Shared)?;
        match fs::read(&path) {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_stream(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.stream_path(name)?;
        let _lk = acquire_lock(&self.root, LockMode::Exclusive)?;

        let tmp = self.root.join(format!("{}{}", name, TMP_SUFFIX));
        let _ = fs::remove_file(&tmp);
        let mut tf = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        tf.write_all(bytes)?;
        let _ = tf.sync_all();
        drop(tf);

        fs::rename(&tmp, &path)?;
        let _ = fsync_parent_dir(&path);
        debug!("wrote stream '{}' ({} bytes) to {}", name, bytes.len(), path.display());
        Ok(())
    }

    fn remove_stream(&mut self, name: &str) -> Result<()> {
        let path = self.stream_path(name)?;
        let _lk = acquire_lock(&self.root, LockMode::Exclusive)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn stream_names(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == LOCK_FILE || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            out.push(name);
        }
        out.sort();
        Ok(out)
    }
}
