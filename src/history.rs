use crate::{
    encoder::Encoder,
    error::{Error, Result},
};
use nix::fcntl::{Flock, FlockArg};
use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Clipboard history kept in a newline-delimited file, most recent entry first.
///
/// Every operation reads the file from scratch, and every update replaces it with a fresh copy
/// renamed into place, so readers never observe a partial write. Updates are additionally
/// serialized across processes with an advisory lock on `<path>.lock`.
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    encoder: Encoder,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize, encoder: Encoder) -> Self {
        HistoryStore {
            path: path.into(),
            max_entries,
            encoder,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// Store text as the most recent entry.
    /// Empty text is ignored. An identical older entry is moved to the front rather than
    /// duplicated, and the oldest entries are dropped once the log exceeds its bound.
    pub fn capture(&self, raw_text: &str) -> Result<()> {
        if raw_text.is_empty() {
            debug!("clipboard is empty, nothing to capture");
            return Ok(());
        }
        if self.encoder.contains_sentinel(raw_text) {
            warn!(
                sentinel = %self.encoder.sentinel(),
                "captured text already contains the newline sentinel; it will not restore exactly"
            );
        }
        let line = self.encoder.encode(raw_text);

        let _lock = self.lock()?;
        let mut log = self.load()?;
        log.retain(|entry| *entry != line);
        log.insert(0, line);
        log.truncate(self.max_entries);
        debug!(entries = log.len(), path = %self.path.display(), "writing history");
        self.persist(&log)
    }

    /// The stored entries, most recent first.
    /// A history file that doesn't exist yet is just an empty history.
    pub fn list(&self) -> Result<Vec<String>> {
        self.load()
    }

    /// Find the entry a (possibly truncated) display string was made from.
    /// When several entries contain the string, the most recent one wins.
    pub fn restore_candidate(&self, display_substring: &str) -> Result<String> {
        self.load()?
            .into_iter()
            .find(|entry| entry.contains(display_substring))
            .ok_or_else(|| Error::NoMatch(display_substring.to_string()))
    }

    /// Forget every entry.
    pub fn clear(&self) -> Result<()> {
        let _lock = self.lock()?;
        self.persist(&[])
    }

    fn load(&self) -> Result<Vec<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(Error::storage(&self.path, err)),
        };
        // Only split on \n; a \r belongs to the entry.
        Ok(contents
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn persist(&self, log: &[String]) -> Result<()> {
        let dir = self.dir();
        let storage_err = |err: io::Error| Error::storage(&self.path, err);
        fs::create_dir_all(dir).map_err(storage_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(storage_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            for line in log {
                writer.write_all(line.as_bytes()).map_err(storage_err)?;
                writer.write_all(b"\n").map_err(storage_err)?;
            }
            writer.flush().map_err(storage_err)?;
        }
        tmp.as_file().sync_all().map_err(storage_err)?;
        tmp.persist(&self.path)
            .map_err(|err| Error::storage(&self.path, err.error))?;
        // The rename only becomes durable once the directory entry is flushed too.
        sync_dir(dir).map_err(storage_err)
    }

    /// Take the update lock, blocking until other writers are done.
    /// The lock is released when the returned value is dropped.
    fn lock(&self) -> Result<Flock<File>> {
        let lock_path = self.lock_path();
        fs::create_dir_all(self.dir()).map_err(|err| Error::storage(&lock_path, err))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| Error::storage(&lock_path, err))?;
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| Error::storage(&lock_path, errno.into()))
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
