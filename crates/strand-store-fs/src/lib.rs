// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `PlanStore` (uses the platform cache dir by default).
//!
//! One file per entry, named by the lowercase-hex BLAKE3 digest of the key:
//!
//! ``MAGIC(4) || KEY_LEN(4, LE) || KEY || VALUE``
//!
//! The full key is kept in the file so a digest collision reads as absent
//! instead of returning another key's value. Writes go to a temporary file in
//! the same directory and are renamed into place, so readers only ever see
//! complete entries. Temporary files are named `<digest>.tmp-<pid>-<n>`;
//! `clear` also removes any left behind by a crashed writer.
#![forbid(unsafe_code)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use directories::ProjectDirs;
use strand_store::{key_digest, PlanStore, StoreError};
use tracing::{debug, warn};

/// Entry file magic ("SPC1").
pub const MAGIC: [u8; 4] = *b"SPC1";
/// Entry file extension.
pub const ENTRY_EXTENSION: &str = "plan";
/// Extension prefix of in-flight temporary files.
pub const TEMP_EXTENSION_PREFIX: &str = "tmp-";
/// Environment variable that overrides the default store root.
pub const ROOT_ENV: &str = "STRAND_PLAN_CACHE_DIR";

const HEADER_LEN: usize = MAGIC.len() + 4;

/// Summary of one stored entry, as reported by [`FsPlanStore::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    /// Hex digest (file stem).
    pub digest: String,
    /// Size of the stored key in bytes.
    pub key_len: usize,
    /// Size of the stored value in bytes.
    pub value_len: usize,
    /// Last modification time of the entry file.
    pub modified: Option<SystemTime>,
}

/// Store entries as files under a root directory.
pub struct FsPlanStore {
    root: PathBuf,
    io_budget: Option<Duration>,
    closed: AtomicBool,
    temp_counter: AtomicU64,
}

impl FsPlanStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "fs plan store opened");
        Ok(Self {
            root,
            io_budget: None,
            closed: AtomicBool::new(false),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Open the store at [`default_root`].
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(default_root()?)
    }

    /// Report reads and writes slower than `budget` as [`StoreError::Timeout`].
    ///
    /// `std::fs` calls cannot be interrupted, so the budget is checked once the
    /// I/O returns: it bounds what the caller accepts, not how long the call
    /// blocks. A `put` over budget discards its temporary file before the
    /// rename, so a timed-out write never lands.
    pub fn with_io_budget(mut self, budget: Duration) -> Self {
        self.io_budget = Some(budget);
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored entries sorted by digest.
    pub fn entries(&self) -> Result<Vec<FsEntry>, StoreError> {
        self.ensure_open()?;
        let mut out = Vec::new();
        for path in self.entry_paths()? {
            let Some(digest) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                // Removed by a concurrent writer between listing and reading.
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            let (key, value) = split_entry(&bytes)?;
            out.push(FsEntry {
                digest: digest.to_owned(),
                key_len: key.len(),
                value_len: value.len(),
                modified: fs::metadata(&path).and_then(|m| m.modified()).ok(),
            });
        }
        out.sort_by(|a, b| a.digest.cmp(&b.digest));
        Ok(out)
    }

    /// Raw key and value of the entry whose digest is `digest` (hex).
    pub fn read_entry(&self, digest: &str) -> Result<Option<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.ensure_open()?;
        let path = self.root.join(format!("{digest}.{ENTRY_EXTENSION}"));
        match fs::read(path) {
            Ok(bytes) => {
                let (key, value) = split_entry(&bytes)?;
                Ok(Some((key.to_vec(), value.to_vec())))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        self.root
            .join(format!("{}.{ENTRY_EXTENSION}", key_digest(key)))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_budget(&self, started: Instant, op: &str) -> Result<(), StoreError> {
        match self.io_budget {
            Some(budget) if started.elapsed() > budget => {
                warn!(op, ?budget, "fs plan store exceeded io budget");
                Err(StoreError::Timeout { after: budget })
            }
            _ => Ok(()),
        }
    }

    fn entry_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.paths_where(|ext| ext == ENTRY_EXTENSION)
    }

    fn temp_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.paths_where(|ext| ext.starts_with(TEMP_EXTENSION_PREFIX))
    }

    fn paths_where(&self, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for dirent in fs::read_dir(&self.root)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()).is_some_and(&keep) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl PlanStore for FsPlanStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let started = Instant::now();
        let key_len = u32::try_from(key.len())
            .map_err(|_| StoreError::Other(format!("key too large: {} bytes", key.len())))?;

        let mut data = Vec::with_capacity(HEADER_LEN + key.len() + value.len());
        data.extend_from_slice(&MAGIC);
        data.extend_from_slice(&key_len.to_le_bytes());
        data.extend_from_slice(key);
        data.extend_from_slice(value);

        let path = self.path_for(key);
        let temp = path.with_extension(format!(
            "{TEMP_EXTENSION_PREFIX}{}-{}",
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(err) = fs::write(&temp, &data) {
            discard_temp(&temp);
            return Err(err.into());
        }
        if let Err(err) = self.check_budget(started, "put") {
            discard_temp(&temp);
            return Err(err);
        }
        if let Err(err) = fs::rename(&temp, &path) {
            discard_temp(&temp);
            return Err(err.into());
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError> {
        self.ensure_open()?;
        let started = Instant::now();
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        self.check_budget(started, "get")?;
        let (stored_key, value) = split_entry(&bytes)?;
        if stored_key != key {
            debug!(digest = %key_digest(key), "fs plan store digest collision");
            return Ok(None);
        }
        Ok(Some(Arc::from(value)))
    }

    fn remove(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_open()?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut paths = self.entry_paths()?;
        paths.extend(self.temp_paths()?);
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self.entry_paths()?.len())
    }
}

/// Default store root: `$STRAND_PLAN_CACHE_DIR`, else the platform cache dir
/// (e.g. `~/.cache/strand/plans`).
pub fn default_root() -> Result<PathBuf, StoreError> {
    if let Some(custom) = std::env::var_os(ROOT_ENV) {
        return Ok(PathBuf::from(custom));
    }
    let proj = ProjectDirs::from("dev", "flyingrobots", "Strand")
        .ok_or_else(|| StoreError::Other("could not resolve cache dir".into()))?;
    Ok(proj.cache_dir().join("plans"))
}

fn discard_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %temp.display(), ?err, "could not remove temporary entry file"),
    }
}

fn split_entry(bytes: &[u8]) -> Result<(&[u8], &[u8]), StoreError> {
    if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
        return Err(StoreError::Corrupt("bad entry header".into()));
    }
    let mut len = [0u8; 4];
    len.copy_from_slice(&bytes[MAGIC.len()..HEADER_LEN]);
    let key_len = u32::from_le_bytes(len) as usize;
    let rest = &bytes[HEADER_LEN..];
    if rest.len() < key_len {
        return Err(StoreError::Corrupt("truncated entry key".into()));
    }
    Ok(rest.split_at(key_len))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsPlanStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPlanStore::open(dir.path().join("plans")).unwrap();
        (dir, store)
    }

    #[test]
    fn round_trip_put_get() {
        let (_dir, store) = store();
        store.put(b"graph-key", b"plan-bytes").unwrap();
        assert_eq!(
            store.get(b"graph-key").unwrap().as_deref(),
            Some(&b"plan-bytes"[..])
        );
        assert!(store.get(b"missing").unwrap().is_none());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn overwrite_is_idempotent() {
        let (_dir, store) = store();
        store.put(b"k", b"one").unwrap();
        store.put(b"k", b"two").unwrap();
        assert_eq!(store.get(b"k").unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn entries_are_sorted_and_readable() {
        let (_dir, store) = store();
        for k in [&b"a"[..], b"b", b"c"] {
            store.put(k, b"v").unwrap();
        }
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].digest < w[1].digest));
        let (key, value) = store.read_entry(&entries[0].digest).unwrap().unwrap();
        assert_eq!(key_digest(&key).to_string(), entries[0].digest);
        assert_eq!(value, b"v");
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, store) = store();
        store.put(b"k", b"v").unwrap();
        fs::write(store.path_for(b"k"), b"garbage").unwrap();
        assert!(matches!(store.get(b"k"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn embedded_key_mismatch_reads_as_absent() {
        let (_dir, store) = store();
        store.put(b"other", b"v").unwrap();
        // Simulate a digest collision by moving another key's entry into place.
        fs::rename(store.path_for(b"other"), store.path_for(b"k")).unwrap();
        assert!(store.get(b"k").unwrap().is_none());
    }

    #[test]
    fn remove_clear_and_close() {
        let (_dir, store) = store();
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        assert!(store.remove(b"a").unwrap());
        assert!(!store.remove(b"a").unwrap());
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        store.close().unwrap();
        store.close().unwrap();
        assert!(matches!(store.get(b"b"), Err(StoreError::Closed)));
    }

    #[test]
    fn zero_budget_reports_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPlanStore::open(dir.path())
            .unwrap()
            .with_io_budget(Duration::ZERO);
        // Any real write takes longer than zero.
        let err = store.put(b"k", b"v").unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        // The timed-out write never landed and left nothing behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let (_dir, store) = store();
        // A directory where the temp file would go makes the write fail.
        let blocker = store
            .path_for(b"k")
            .with_extension(format!("{TEMP_EXTENSION_PREFIX}{}-0", std::process::id()));
        fs::create_dir(&blocker).unwrap();
        assert!(matches!(store.put(b"k", b"v"), Err(StoreError::Io(_))));
        fs::remove_dir(&blocker).unwrap();
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
        store.put(b"k", b"v").unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn clear_sweeps_stale_temp_files() {
        let (_dir, store) = store();
        store.put(b"k", b"v").unwrap();
        let stale = store
            .path_for(b"k")
            .with_extension(format!("{TEMP_EXTENSION_PREFIX}99999-7"));
        fs::write(&stale, b"half a write").unwrap();
        assert_eq!(store.len().unwrap(), 1);
        store.clear().unwrap();
        assert!(!stale.exists());
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    }
}
