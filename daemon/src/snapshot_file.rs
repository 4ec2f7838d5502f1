//! Reading and writing the ledger snapshot in the data directory.

use std::path::Path;

use accrue_ledger::LedgerSnapshot;
use anyhow::Context;

pub const SNAPSHOT_FILE_NAME: &str = "ledger.snapshot";

/// Load the snapshot at `path`, or `None` if there is none yet.
pub fn load(path: &Path) -> anyhow::Result<Option<LedgerSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let snapshot = LedgerSnapshot::from_bytes(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    if !snapshot.verify() {
        anyhow::bail!("snapshot {} failed its integrity check", path.display());
    }
    Ok(Some(snapshot))
}

/// Write `snapshot` to `path`, replacing any previous file only once the
/// new one is fully written.
pub fn save(path: &Path, snapshot: &LedgerSnapshot) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let bytes = snapshot.to_bytes()?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
