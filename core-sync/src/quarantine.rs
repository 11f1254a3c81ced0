//! # Quarantine Ledger
//!
//! Remembers items whose download failed in a way that will not fix itself,
//! typically because the remote API rejects that specific item. Quarantined
//! items are skipped by every later download run until an operator removes
//! them from the ledger.
//!
//! The ledger lives next to the index as a JSON array of
//! [`QuarantineEntry`] values and is rewritten wholesale on [`QuarantineLedger::store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// File name of the ledger inside the mirror root
pub const LEDGER_FILE_NAME: &str = "gphotos.bad_ids.json";

/// One quarantined item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    /// Remote identifier
    pub id: String,
    /// Local path relative to the mirror root
    pub path: String,
    /// Diagnostic context (last error seen)
    pub context: String,
    pub quarantined_at: DateTime<Utc>,
}

/// Persistent set of quarantined identifiers
#[derive(Debug)]
pub struct QuarantineLedger {
    path: PathBuf,
    entries: BTreeMap<String, QuarantineEntry>,
}

impl QuarantineLedger {
    /// Load the ledger stored at `path`.
    ///
    /// A missing file yields an empty ledger. An unreadable ledger is logged and
    /// replaced on the next [`store`](Self::store); losing it only means the
    /// affected items are attempted once more.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<QuarantineEntry>>(&bytes) {
                Ok(list) => list.into_iter().map(|e| (e.id.clone(), e)).collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable quarantine ledger");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(SyncError::Io(e)),
        };

        debug!(path = %path.display(), entries = entries.len(), "Quarantine ledger loaded");
        Ok(Self { path, entries })
    }

    /// Load the ledger kept in a mirror root
    pub fn in_root(root: &Path) -> Result<Self> {
        Self::load(root.join(LEDGER_FILE_NAME))
    }

    /// Whether `id` may be downloaded
    pub fn check_ok(&self, id: &str) -> bool {
        !self.entries.contains_key(id)
    }

    /// Quarantine an item. Returns `false` if it was already present.
    pub fn add(&mut self, path: impl Into<String>, id: &str, context: impl Into<String>) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }

        let entry = QuarantineEntry {
            id: id.to_string(),
            path: path.into(),
            context: context.into(),
            quarantined_at: Utc::now(),
        };
        info!(id = %entry.id, path = %entry.path, "Item quarantined");
        self.entries.insert(entry.id.clone(), entry);
        true
    }

    /// Release an item so the next run attempts it again
    pub fn remove(&mut self, id: &str) -> Option<QuarantineEntry> {
        self.entries.remove(id)
    }

    /// Rewrite the ledger file with the current entries.
    ///
    /// The file is replaced atomically so an interrupted write never leaves a
    /// truncated ledger behind.
    pub fn store(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let list: Vec<&QuarantineEntry> = self.entries.values().collect();
        let json = serde_json::to_vec_pretty(&list)
            .map_err(|e| SyncError::Ledger(format!("Failed to serialize ledger: {}", e)))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".gphotos-ledger-")
            .tempfile_in(&dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Quarantine ledger stored");
        Ok(())
    }

    /// Human-readable summary of the quarantined items, also logged when non-empty
    pub fn report(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut summary = format!(
            "{} item(s) are quarantined and will not be downloaded:",
            self.entries.len()
        );
        for entry in self.entries.values() {
            let _ = write!(summary, "\n  {} {} ({})", entry.id, entry.path, entry.context);
        }

        warn!("{}", summary);
        summary
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &QuarantineEntry> {
        self.entries.values()
    }

    /// Location of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
