//! # File I/O Module
//!
//! Bid persistence with:
//! - **Atomic saves**: write to `.tmp`, fsync, rename over the target
//! - **File locking**: one editor per bid file on shared drives
//! - **Version validation**: refuse files written by a newer schema
//!
//! ## File Format
//!
//! Bids are saved as `.tkb` files containing the pretty-printed `Bid` JSON.
//! Lock files use the `.tkb.lock` extension with metadata about who holds
//! the lock. Stored [`BidRecord`]s live as `<id>.json` in a record directory.
//!
//! ## Example
//!
//! ```rust,no_run
//! use calc_core::bid::{Bid, BidInfo};
//! use calc_core::file_io::{save_bid, load_bid, FileLock};
//! use std::path::Path;
//!
//! let bid = Bid::new(BidInfo::new("Kv. Linden", "24-117", "Byggbolaget AB"));
//! let path = Path::new("linden.tkb");
//!
//! let lock = FileLock::acquire(path, "kalkyl@firma.se").unwrap();
//! save_bid(&bid, path).unwrap();
//! drop(lock);
//!
//! let loaded = load_bid(path).unwrap();
//! assert_eq!(loaded.info.number, "24-117");
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bid::{Bid, BidRecord, SCHEMA_VERSION};
use crate::errors::{CalcError, CalcResult};

/// Extension of bid files
pub const BID_EXTENSION: &str = "tkb";

/// Locks older than this are taken over
const STALE_LOCK_HOURS: i64 = 24;

/// Lock file metadata stored in .tkb.lock files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// User identifier (email or username)
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    /// Stale when older than a day, or when the owning process on this
    /// machine is gone.
    pub fn is_stale(&self) -> bool {
        if (Utc::now() - self.locked_at).num_hours() > STALE_LOCK_HOURS {
            return true;
        }
        hostname().is_some_and(|machine| machine == self.machine) && !process_alive(self.pid)
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::env::var("HOST").ok())
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(windows)]
fn process_alive(pid: u32) -> bool {
    use std::process::Command;
    match Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH"])
        .output()
    {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
        Err(_) => true,
    }
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Exclusive lock on a bid file, released when dropped.
///
/// Holds an OS-level lock (fs2) on the lock file and writes [`LockInfo`]
/// into it so other users can see who is editing.
pub struct FileLock {
    bid_path: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Acquire an exclusive lock on a bid file.
    ///
    /// # Errors
    ///
    /// * `FileLocked` - another user or process holds a fresh lock
    /// * `FileError` - the lock file could not be written
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> CalcResult<Self> {
        let lock_path = lock_path_for(path);
        let info = LockInfo::new(user_id);

        if let Some(existing) = Self::check(path) {
            return Err(CalcError::file_locked(
                path.display().to_string(),
                format!("{} ({})", existing.user_id, existing.machine),
                existing.locked_at.to_rfc3339(),
            ));
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| CalcError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        lock_file.try_lock_exclusive().map_err(|_| {
            CalcError::file_locked(path.display().to_string(), "another process", "unknown")
        })?;

        let lock_json = serde_json::to_string_pretty(&info)?;
        lock_file
            .write_all(lock_json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| CalcError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), user = %info.user_id, "bid lock acquired");

        Ok(FileLock {
            bid_path: path.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current holder of a fresh lock on `path`, if any.
    pub fn check(path: &Path) -> Option<LockInfo> {
        let lock_path = lock_path_for(path);
        if !lock_path.exists() {
            return None;
        }
        read_lock_info(&lock_path).ok().filter(|info| !info.is_stale())
    }

    pub fn bid_path(&self) -> &Path {
        &self.bid_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(bid_path: &Path) -> PathBuf {
    let mut lock_path = bid_path.to_path_buf();
    let extension = lock_path
        .extension()
        .map(|e| format!("{}.lock", e.to_string_lossy()))
        .unwrap_or_else(|| "lock".to_string());
    lock_path.set_extension(extension);
    lock_path
}

fn read_lock_info(lock_path: &Path) -> CalcResult<LockInfo> {
    let contents = read_text(lock_path, "read lock")?;
    Ok(serde_json::from_str(&contents)?)
}

fn read_text(path: &Path, operation: &str) -> CalcResult<String> {
    let mut file = File::open(path)
        .map_err(|e| CalcError::file_error(operation, path.display().to_string(), e.to_string()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| CalcError::file_error(operation, path.display().to_string(), e.to_string()))?;
    Ok(contents)
}

/// Write `contents` to `.tmp`, fsync, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> CalcResult<()> {
    let tmp_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });

    let mut tmp_file = File::create(&tmp_path)
        .map_err(|e| CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;

    tmp_file
        .write_all(contents.as_bytes())
        .and_then(|_| tmp_file.sync_all())
        .map_err(|e| CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
    })
}

/// Save a bid with atomic write semantics.
///
/// ```rust,no_run
/// use calc_core::bid::Bid;
/// use calc_core::file_io::save_bid;
/// use std::path::Path;
///
/// save_bid(&Bid::default(), Path::new("empty.tkb"))?;
/// # Ok::<(), calc_core::errors::CalcError>(())
/// ```
pub fn save_bid(bid: &Bid, path: &Path) -> CalcResult<()> {
    let json = serde_json::to_string_pretty(bid)?;
    write_atomic(path, &json)?;
    tracing::info!(path = %path.display(), items = bid.item_count(), "bid saved");
    Ok(())
}

/// Load a bid file.
///
/// # Errors
///
/// * `VersionMismatch` - file written by an incompatible schema
/// * `SerializationError` - invalid JSON
/// * `FileError` - I/O error
pub fn load_bid(path: &Path) -> CalcResult<Bid> {
    let contents = read_text(path, "read")?;

    let bid: Bid = serde_json::from_str(&contents).map_err(|e| CalcError::SerializationError {
        reason: format!("Invalid JSON in {}: {}", path.display(), e),
    })?;

    validate_version(&bid.meta.version)?;

    tracing::debug!(path = %path.display(), items = bid.item_count(), "bid loaded");
    Ok(bid)
}

/// Load a bid together with the holder of a fresh lock, if any.
///
/// A `Some` lock means the bid should be opened read-only.
pub fn load_bid_with_lock_check(path: &Path) -> CalcResult<(Bid, Option<LockInfo>)> {
    let bid = load_bid(path)?;
    let lock_info = FileLock::check(path);
    if let Some(info) = &lock_info {
        tracing::warn!(path = %path.display(), user = %info.user_id, "bid is locked by another user");
    }
    Ok((bid, lock_info))
}

/// Path of a stored record inside `dir`
pub fn record_path(dir: &Path, id: &Uuid) -> PathBuf {
    dir.join(format!("{}.json", id))
}

/// Store a record as `<id>.json` in `dir`, replacing an older save.
pub fn save_record(record: &BidRecord, dir: &Path) -> CalcResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| CalcError::file_error("create record directory", dir.display().to_string(), e.to_string()))?;
    let path = record_path(dir, &record.id);
    write_atomic(&path, &serde_json::to_string_pretty(record)?)?;
    Ok(path)
}

pub fn load_record(dir: &Path, id: &Uuid) -> CalcResult<BidRecord> {
    let path = record_path(dir, id);
    let contents = read_text(&path, "read record")?;
    Ok(serde_json::from_str(&contents)?)
}

/// Validate that a file version is compatible with the current schema.
fn validate_version(file_version: &str) -> CalcResult<()> {
    let mismatch = || CalcError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };

    let parse = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };
    let file_parts = parse(file_version);
    let current_parts = parse(SCHEMA_VERSION);

    match (file_parts.as_slice(), current_parts.as_slice()) {
        ([file_major, ..], [major, ..]) if file_major != major => Err(mismatch()),
        // 0.x: a newer minor may carry breaking changes
        ([0, file_minor, ..], [0, minor, ..]) if file_minor > minor => Err(mismatch()),
        ([_, ..], [_, ..]) => Ok(()),
        _ => Err(mismatch()),
    }
}
