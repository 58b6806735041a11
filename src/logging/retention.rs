//! Rotated file retention
//!
//! Handles recognising the files that belong to one rotated family, deleting
//! them by age and count, and compressing files that were rotated away from.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Extension appended to compressed rotated files
pub const COMPRESSED_EXT: &str = "zst";

const STAMP_LEN: usize = 10;
const COMPRESSION_LEVEL: i32 = 3;

/// Naming scheme of one rotated family: `<base>.<YYYYMMDDHH>[.<n>]<suffix>[.zst]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyPattern {
    pub base: String,
    pub suffix: String,
}

/// Position of a file within its family
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FamilyMember {
    pub stamp: String,
    pub generation: u32,
    pub compressed: bool,
}

impl FamilyPattern {
    pub fn new(base: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            suffix: suffix.into(),
        }
    }

    /// File name for a stamp and generation
    pub fn file_name(&self, stamp: &str, generation: u32) -> String {
        if generation == 0 {
            format!("{}.{}{}", self.base, stamp, self.suffix)
        } else {
            format!("{}.{}.{}{}", self.base, stamp, generation, self.suffix)
        }
    }

    /// Name of the stable link pointing at the active file
    pub fn link_name(&self) -> String {
        let tail = self.suffix.strip_suffix(".log").unwrap_or(&self.suffix);
        format!("{}{}", self.base, tail)
    }

    /// Parse a file name, returning `None` when it belongs to another family
    pub fn parse(&self, name: &str) -> Option<FamilyMember> {
        let rest = name.strip_prefix(&self.base)?.strip_prefix('.')?;
        let stamp = rest.get(..STAMP_LEN)?;
        if !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut rest = &rest[STAMP_LEN..];

        let compressed = match rest
            .strip_suffix(COMPRESSED_EXT)
            .and_then(|r| r.strip_suffix('.'))
        {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };

        let rest = rest.strip_suffix(self.suffix.as_str())?;
        let generation = if rest.is_empty() {
            0
        } else {
            let digits = rest.strip_prefix('.')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        };

        Some(FamilyMember {
            stamp: stamp.to_string(),
            generation,
            compressed,
        })
    }

    /// Members of this family in `dir`, oldest first
    pub fn members(&self, dir: &Path) -> io::Result<Vec<(FamilyMember, PathBuf)>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut members = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(member) = name.to_str().and_then(|n| self.parse(n)) {
                members.push((member, entry.path()));
            }
        }
        members.sort();
        Ok(members)
    }
}

/// Retention limits for one family
///
/// A count limit takes precedence: `max_age` only applies when `max_backups`
/// is 0, so a family always keeps the number of files it was promised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retention {
    /// Files last modified longer ago than this are deleted
    pub max_age: Option<Duration>,
    /// Maximum files kept, the active one included (0 keeps all)
    pub max_backups: u32,
}

impl Retention {
    /// Age limit in effect once the count limit is taken into account
    pub fn effective_max_age(&self) -> Option<Duration> {
        if self.max_backups > 0 {
            None
        } else {
            self.max_age
        }
    }
}

/// Delete family members in `dir` that fall outside `retention`
///
/// Ages are measured against `now`. The active file is never deleted.
/// Returns the number of files deleted.
pub fn prune(
    dir: &Path,
    pattern: &FamilyPattern,
    active: &Path,
    retention: Retention,
    now: SystemTime,
) -> io::Result<usize> {
    let mut candidates: Vec<PathBuf> = pattern
        .members(dir)?
        .into_iter()
        .map(|(_, path)| path)
        .filter(|path| path != active)
        .collect();

    let mut deleted_count = 0;

    if let Some(max_age) = retention.effective_max_age() {
        let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);

        candidates.retain(|path| {
            let expired = fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|modified| modified < cutoff)
                .unwrap_or(false);
            if expired && fs::remove_file(path).is_ok() {
                deleted_count += 1;
                return false;
            }
            true
        });
    }

    if retention.max_backups > 0 {
        // The active file takes one of the slots
        let keep = retention.max_backups as usize - 1;
        if candidates.len() > keep {
            let excess = candidates.len() - keep;
            for path in candidates.drain(..excess) {
                if fs::remove_file(&path).is_ok() {
                    deleted_count += 1;
                }
            }
        }
    }

    Ok(deleted_count)
}

/// Compress `path` to `<path>.zst` and remove the original
pub fn compress_file(path: &Path) -> io::Result<PathBuf> {
    let mut target = path.as_os_str().to_owned();
    target.push(".");
    target.push(COMPRESSED_EXT);
    let target = PathBuf::from(target);

    let input = File::open(path)?;
    let output = File::create(&target)?;
    zstd::stream::copy_encode(input, output, COMPRESSION_LEVEL)?;
    fs::remove_file(path)?;

    Ok(target)
}
