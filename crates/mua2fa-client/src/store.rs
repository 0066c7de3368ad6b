//! `mua2fa.dat`: the one record (or prompt preference) a game install keeps.
//!
//! On disk the file is JSON, either the record's own fields or
//! `{"state": "init" | "show_if_necessary" | "hide_forever"}`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mua2fa_record::Record;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::ClientError;

pub const DATA_FILE: &str = "mua2fa.dat";
pub const BACKUP_FILE: &str = "mua2fa.dat_old";

/// What the store holds when it holds no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// Never prompted.
    Init,
    /// Prompt whenever the server asks.
    ShowIfNecessary,
    /// Never prompt; cancel every request.
    HideForever,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientData {
    Record(Record),
    Empty { state: EmptyState },
}

impl ClientData {
    pub const INIT: Self = Self::Empty {
        state: EmptyState::Init,
    };

    pub fn empty(state: EmptyState) -> Self {
        Self::Empty { state }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Empty { .. } => None,
        }
    }

    pub fn empty_state(&self) -> Option<EmptyState> {
        match self {
            Self::Record(_) => None,
            Self::Empty { state } => Some(*state),
        }
    }

    /// Drops dead signatures; a record left with none becomes
    /// `ShowIfNecessary`.
    pub fn filter(self, now: DateTime<Utc>) -> Self {
        match self {
            Self::Record(record) => {
                let filtered = record.filter(now).into_owned();
                if filtered.has_signatures() {
                    Self::Record(filtered)
                } else {
                    Self::empty(EmptyState::ShowIfNecessary)
                }
            }
            empty => empty,
        }
    }
}

/// The in-memory copy of `mua2fa.dat` plus where it lives.
#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    data: ClientData,
}

impl RecordStore {
    /// Reads `dir/mua2fa.dat`. A missing file means [`ClientData::INIT`];
    /// an unreadable one is logged and treated the same.
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let data = match read(&dir.join(DATA_FILE)) {
            Ok(Some(data)) => data,
            Ok(None) => ClientData::INIT,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to load client record");
                ClientData::INIT
            }
        };
        Self { dir, data }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data(&self) -> &ClientData {
        &self.data
    }

    pub fn record(&self) -> Option<&Record> {
        self.data.record()
    }

    pub fn is_init(&self) -> bool {
        self.data == ClientData::INIT
    }

    /// Replaces the held data (filtered at `now`) and writes it out.
    ///
    /// The in-memory copy is updated even when the write fails, so the next
    /// save retries with the newest data.
    pub fn save(&mut self, data: ClientData, now: DateTime<Utc>) -> Result<(), ClientError> {
        self.data = data.filter(now);
        self.write()
    }

    fn write(&self) -> Result<(), ClientError> {
        let target = self.dir.join(DATA_FILE);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &self.data)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        replace_with_backup(&self.dir, |path| tmp.persist(path).map(drop).map_err(|e| e.error))?;
        tracing::debug!(path = %target.display(), "saved client record");
        Ok(())
    }
}

/// Moves the current data file aside as the backup, then lets `persist`
/// write the new one. If `persist` fails the backup is moved back, so the
/// data file is never left missing.
fn replace_with_backup(
    dir: &Path,
    persist: impl FnOnce(&Path) -> io::Result<()>,
) -> Result<(), ClientError> {
    let target = dir.join(DATA_FILE);
    let backup = dir.join(BACKUP_FILE);
    let backed_up = match fs::rename(&target, &backup) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = persist(&target) {
        if backed_up {
            if let Err(restore) = fs::rename(&backup, &target) {
                tracing::warn!(path = %target.display(), error = %restore, "failed to restore client record backup");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn read(path: &Path) -> Result<Option<ClientData>, ClientError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
