//! Rotating file destination
//!
//! Writes to `<dir>/<base>.<YYYYMMDDHH><suffix>`, starting a new file when the
//! rotation period changes or the active file would grow past its size limit,
//! and keeps a stable link `<dir>/<base><suffix minus .log>` on the active file.
//! Periods and stamps follow local time, like the record timestamps.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDateTime, Utc};

use super::clock::{Clock, SystemClock};
use super::retention::{self, FamilyPattern, Retention};
use super::sink::Sink;
use crate::error::{Error, Result};

/// Default rotation period
pub const DEFAULT_ROTATION_TIME: Duration = Duration::from_secs(24 * 60 * 60);

const STAMP_FORMAT: &str = "%Y%m%d%H";

/// How a rotated family is named, rolled over and pruned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    pub dir: PathBuf,
    pub base_name: String,
    /// Extension including the leading dot, e.g. `.json.log`
    pub suffix: String,
    pub rotation_time: Duration,
    /// Roll over once the active file would exceed this many bytes (0 disables)
    pub max_size: u64,
    pub retention: Retention,
    pub compress: bool,
}

impl RotationPolicy {
    pub fn new(
        dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            suffix: suffix.into(),
            rotation_time: DEFAULT_ROTATION_TIME,
            max_size: 0,
            retention: Retention::default(),
            compress: false,
        }
    }

    pub fn pattern(&self) -> FamilyPattern {
        FamilyPattern::new(&self.base_name, &self.suffix)
    }

    /// Path of the stable link
    pub fn link_path(&self) -> PathBuf {
        self.dir.join(self.pattern().link_name())
    }

    /// Local start of the rotation period containing `now`
    fn period_start(&self, clock: &dyn Clock, now: DateTime<Utc>) -> NaiveDateTime {
        let local = now.with_timezone(&clock.offset(now)).naive_local();
        let period = self.rotation_time.as_secs().max(1) as i64;
        let secs = local.and_utc().timestamp();
        let start = secs - secs.rem_euclid(period);
        DateTime::from_timestamp(start, 0)
            .map(|start| start.naive_utc())
            .unwrap_or(local)
    }
}

struct ActiveFile {
    file: File,
    path: PathBuf,
    period: NaiveDateTime,
    generation: u32,
    size: u64,
}

/// Compression and pruning left over from a rotation
///
/// Runs after the writer lock is released so other writers are not held up.
struct Housekeeping {
    previous: PathBuf,
    active: PathBuf,
}

impl Housekeeping {
    fn run(self, policy: &RotationPolicy, now: SystemTime) {
        if policy.compress {
            if let Err(e) = retention::compress_file(&self.previous) {
                tracing::warn!(file = %self.previous.display(), error = %e, "Failed to compress rotated log");
            }
        }
        prune(policy, &self.active, now);
    }
}

/// A file destination that rotates transparently
///
/// The active file sits behind one lock: writers never observe a half-rotated
/// file.
pub struct RotatingWriter {
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    active: Mutex<ActiveFile>,
}

impl RotatingWriter {
    /// Open the active file for the current period, creating the directory
    pub fn new(policy: RotationPolicy) -> Result<Self> {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: RotationPolicy, clock: Arc<dyn Clock>) -> Result<Self> {
        fs::create_dir_all(&policy.dir)
            .map_err(|e| Error::io(&policy.dir, "create log directory", e))?;

        let now = clock.now();
        let period = policy.period_start(clock.as_ref(), now);
        let generation = latest_generation(&policy, period)?;
        let active = open_active(&policy, period, generation)?;
        link(&policy, &active.path);
        prune(&policy, &active.path, SystemTime::from(now));

        Ok(Self {
            policy,
            clock,
            active: Mutex::new(active),
        })
    }

    /// Path of the file currently written to
    pub fn current_path(&self) -> Option<PathBuf> {
        self.active.lock().ok().map(|a| a.path.clone())
    }

    /// Swap in the next file and point the link at it
    fn rotate(
        &self,
        active: &mut ActiveFile,
        period: NaiveDateTime,
        generation: u32,
    ) -> io::Result<Housekeeping> {
        let next = open_active(&self.policy, period, generation).map_err(into_io)?;
        let previous = std::mem::replace(active, next);
        if let Err(e) = previous.file.sync_all() {
            tracing::warn!(file = %previous.path.display(), error = %e, "Failed to sync rotated log");
        }
        drop(previous.file);
        link(&self.policy, &active.path);
        Ok(Housekeeping {
            previous: previous.path,
            active: active.path.clone(),
        })
    }
}

impl Sink for RotatingWriter {
    fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let now = self.clock.now();
        let housekeeping = {
            let mut active = self
                .active
                .lock()
                .map_err(|_| io::Error::other("rotating writer lock poisoned"))?;

            let period = self.policy.period_start(self.clock.as_ref(), now);
            let housekeeping = if period != active.period {
                Some(self.rotate(&mut active, period, 0)?)
            } else if self.policy.max_size > 0
                && active.size > 0
                && active.size + buf.len() as u64 > self.policy.max_size
            {
                let generation = active.generation + 1;
                Some(self.rotate(&mut active, period, generation)?)
            } else {
                None
            };

            active.file.write_all(buf)?;
            active.size += buf.len() as u64;
            housekeeping
        };

        if let Some(housekeeping) = housekeeping {
            housekeeping.run(&self.policy, SystemTime::from(now));
        }
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        let active = self
            .active
            .lock()
            .map_err(|_| io::Error::other("rotating writer lock poisoned"))?;
        active.file.sync_all()
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io { source, .. } => source,
        other => io::Error::other(other.to_string()),
    }
}

/// Highest generation already on disk for `period`, so restarts append to it
fn latest_generation(policy: &RotationPolicy, period: NaiveDateTime) -> Result<u32> {
    let stamp = period.format(STAMP_FORMAT).to_string();
    let members = policy
        .pattern()
        .members(&policy.dir)
        .map_err(|e| Error::io(&policy.dir, "list log directory", e))?;
    Ok(members
        .iter()
        .filter(|(m, _)| m.stamp == stamp && !m.compressed)
        .map(|(m, _)| m.generation)
        .max()
        .unwrap_or(0))
}

fn open_active(
    policy: &RotationPolicy,
    period: NaiveDateTime,
    generation: u32,
) -> Result<ActiveFile> {
    let stamp = period.format(STAMP_FORMAT).to_string();
    let path = policy
        .dir
        .join(policy.pattern().file_name(&stamp, generation));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| Error::io(&path, "open log file", e))?;
    let size = file
        .metadata()
        .map_err(|e| Error::io(&path, "stat log file", e))?
        .len();

    Ok(ActiveFile {
        file,
        path,
        period,
        generation,
        size,
    })
}

// Failures in link and prune never stop writes to the active file.

fn link(policy: &RotationPolicy, active: &Path) {
    let link = policy.link_path();
    if let Err(e) = update_link(&link, active) {
        tracing::warn!(link = %link.display(), error = %e, "Failed to update log link");
    }
}

fn prune(policy: &RotationPolicy, active: &Path, now: SystemTime) {
    match retention::prune(&policy.dir, &policy.pattern(), active, policy.retention, now) {
        Ok(count) if count > 0 => {
            tracing::debug!(dir = %policy.dir.display(), count, "Pruned rotated log files");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(dir = %policy.dir.display(), error = %e, "Failed to prune rotated logs");
        }
    }
}

/// Point `link` at `target`, replacing any previous link atomically
#[cfg(unix)]
fn update_link(link: &Path, target: &Path) -> io::Result<()> {
    let target_name = target
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| target.to_path_buf());
    let mut staging = link.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    let _ = fs::remove_file(&staging);
    std::os::unix::fs::symlink(&target_name, &staging)?;
    fs::rename(&staging, link)
}

#[cfg(not(unix))]
fn update_link(_link: &Path, _target: &Path) -> io::Result<()> {
    Ok(())
}
