//! Change detection.
//!
//! Hashes discovered files and diffs them against the store to produce
//! added/modified/deleted/unchanged sets.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Instant;

use crate::error::Result;
use crate::storage::Store;
use crate::types::DiscoveredFile;
use crate::types::hash_file;

/// Result of one change-detection pass. Lists are sorted lexicographically.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    /// Content hashes for added and modified files.
    pub hashes: HashMap<String, String>,
    pub duration_ms: u64,
}

impl ChangeSet {
    /// Paths that need re-indexing, in path order.
    pub fn to_index(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

/// Diff discovered files against the store.
pub async fn compute_changes(discovered: &[DiscoveredFile], store: &Store) -> Result<ChangeSet> {
    let started = Instant::now();

    let stored: HashMap<String, String> = store
        .all_files()
        .await?
        .into_iter()
        .map(|f| (f.path, f.hash))
        .collect();

    let mut changes = ChangeSet::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for file in discovered {
        seen.insert(file.rel_path.as_str());
        let hash = match hash_file(&file.abs_path) {
            Ok(hash) => hash,
            Err(e) => {
                // Unreadable files drop out of this round; they stay in the
                // store until discovery stops reporting them.
                tracing::debug!(path = %file.rel_path, error = %e, "hash failed, skipping");
                continue;
            }
        };

        match stored.get(&file.rel_path) {
            None => {
                changes.added.push(file.rel_path.clone());
                changes.hashes.insert(file.rel_path.clone(), hash);
            }
            Some(existing) if *existing != hash => {
                changes.modified.push(file.rel_path.clone());
                changes.hashes.insert(file.rel_path.clone(), hash);
            }
            Some(_) => changes.unchanged.push(file.rel_path.clone()),
        }
    }

    for path in stored.keys() {
        if !seen.contains(path.as_str()) {
            changes.deleted.push(path.clone());
        }
    }

    changes.added.sort();
    changes.modified.sort();
    changes.deleted.sort();
    changes.unchanged.sort();
    changes.duration_ms = started.elapsed().as_millis() as u64;
    Ok(changes)
}

#[cfg(test)]
#[path = "change_detector.test.rs"]
mod tests;
