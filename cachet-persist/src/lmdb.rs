//! LMDB-backed persistent record container.
//!
//! One heed environment, one database. LMDB's single-writer transaction is
//! what makes `apply` atomic: every operation in the batch lands in one
//! write transaction, so a failed commit leaves nothing behind.

use std::path::Path;

use cachet_core::{EntityKind, PersistConfig, PersistError, RecordId};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::container::{ContainerOp, RecordContainer};
use crate::record::record_key;

/// Durable record container over a memory-mapped LMDB environment.
pub struct LmdbContainer {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbContainer {
    /// Open (or create) the container described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn open(config: &PersistConfig) -> Result<Self, PersistError> {
        Self::open_at(&config.path, config.max_size_mb)
    }

    /// Open (or create) the container at an explicit path.
    pub fn open_at<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, PersistError> {
        let path_display = path.as_ref().display().to_string();
        std::fs::create_dir_all(&path).map_err(|e| PersistError::ContainerOpen {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| PersistError::ContainerOpen {
            path: path_display,
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(commit_err)?;
        let db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, None).map_err(commit_err)?;
        wtxn.commit().map_err(commit_err)?;

        Ok(Self { env, db })
    }
}

fn commit_err(e: heed::Error) -> PersistError {
    PersistError::CommitFailed {
        reason: e.to_string(),
    }
}

fn fetch_err(kind: EntityKind) -> impl Fn(heed::Error) -> PersistError {
    move |e| PersistError::FetchFailed {
        kind,
        reason: e.to_string(),
    }
}

impl RecordContainer for LmdbContainer {
    fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<Vec<u8>>, PersistError> {
        let rtxn = self.env.read_txn().map_err(fetch_err(kind))?;
        let bytes = self
            .db
            .get(&rtxn, &record_key(kind, id))
            .map_err(fetch_err(kind))?;
        Ok(bytes.map(|b| b.to_vec()))
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>, PersistError> {
        let rtxn = self.env.read_txn().map_err(fetch_err(kind))?;
        let lower = record_key(kind, RecordId::nil());
        let upper = record_key(kind, RecordId::max());

        let mut records = Vec::new();
        let iter = self
            .db
            .range(
                &rtxn,
                &(
                    std::ops::Bound::Included(lower.as_slice()),
                    std::ops::Bound::Included(upper.as_slice()),
                ),
            )
            .map_err(fetch_err(kind))?;
        for result in iter {
            let (_, bytes) = result.map_err(fetch_err(kind))?;
            records.push(bytes.to_vec());
        }
        Ok(records)
    }

    fn apply(&self, ops: &[ContainerOp]) -> Result<(), PersistError> {
        let mut wtxn = self.env.write_txn().map_err(commit_err)?;
        for op in ops {
            match op {
                ContainerOp::Put { kind, id, bytes } => {
                    self.db
                        .put(&mut wtxn, &record_key(*kind, *id), bytes)
                        .map_err(commit_err)?;
                }
                ContainerOp::Delete { kind, id } => {
                    self.db
                        .delete(&mut wtxn, &record_key(*kind, *id))
                        .map_err(commit_err)?;
                }
            }
        }
        wtxn.commit().map_err(commit_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::new_record_id;

    fn open(dir: &tempfile::TempDir) -> LmdbContainer {
        LmdbContainer::open_at(dir.path(), 16).expect("open container")
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = new_record_id();

        {
            let container = open(&dir);
            container
                .apply(&[ContainerOp::Put {
                    kind: EntityKind::Setting,
                    id,
                    bytes: b"durable".to_vec(),
                }])
                .expect("apply");
        }

        let container = open(&dir);
        assert_eq!(
            container.get(EntityKind::Setting, id).expect("get"),
            Some(b"durable".to_vec())
        );
    }

    #[test]
    fn test_scan_stays_inside_the_kind_range() {
        let dir = tempfile::tempdir().expect("tempdir");
        let container = open(&dir);
        container
            .apply(&[
                ContainerOp::Put {
                    kind: EntityKind::Bookmark,
                    id: new_record_id(),
                    bytes: b"a".to_vec(),
                },
                ContainerOp::Put {
                    kind: EntityKind::Conversation,
                    id: new_record_id(),
                    bytes: b"b".to_vec(),
                },
            ])
            .expect("apply");

        assert_eq!(container.scan(EntityKind::Bookmark).expect("scan").len(), 1);
        assert_eq!(
            container.scan(EntityKind::Conversation).expect("scan").len(),
            1
        );
    }

    #[test]
    fn test_delete_of_absent_key_commits_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let container = open(&dir);
        container
            .apply(&[ContainerOp::Delete {
                kind: EntityKind::Bookmark,
                id: new_record_id(),
            }])
            .expect("apply");
    }
}
