//! Durable download progress: the completed-segment sidecar file.
//!
//! One JSON array of completed segment indices per download directory. The
//! full set is rewritten after every completed segment; writes go to a temp
//! file first and rename into place, so a crash mid-write cannot truncate the
//! previous record.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Sidecar file name inside the segments directory.
pub const PROGRESS_FILE: &str = "download_progress.json";

/// Loads the completed-index set. A missing file is an empty set; an
/// unreadable or corrupt file is logged as a warning and treated as empty
/// (start fresh rather than refuse to run).
pub fn load(dir: &Path) -> BTreeSet<usize> {
    let path = dir.join(PROGRESS_FILE);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            tracing::warn!("unreadable progress file {}: {}", path.display(), e);
            return BTreeSet::new();
        }
    };
    match parse(&bytes) {
        Some(set) => set,
        None => {
            tracing::warn!("corrupt progress file {}, starting fresh", path.display());
            BTreeSet::new()
        }
    }
}

/// Accepts both integer and string elements; older progress files stored
/// indices as JSON strings.
fn parse(bytes: &[u8]) -> Option<BTreeSet<usize>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes).ok()?;
    let mut set = BTreeSet::new();
    for value in values {
        let index = match value {
            serde_json::Value::Number(n) => n.as_u64()? as usize,
            serde_json::Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        set.insert(index);
    }
    Some(set)
}

/// Atomically overwrites the sidecar with the full completed set.
pub fn save(dir: &Path, completed: &BTreeSet<usize>) -> Result<()> {
    let path = dir.join(PROGRESS_FILE);
    let tmp = dir.join(format!("{}.tmp", PROGRESS_FILE));
    let json = serde_json::to_vec(completed).context("serialize progress set")?;
    std::fs::write(&tmp, &json).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}
