use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{path_utils::parent_dir, Identity};

/// Durable cursor: which file and how many bytes of it were consumed.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    pub identity: Identity,
    pub offset: u64,
}

/// Possible errors that could happen while working with the position file
#[derive(Error, Debug)]
pub enum PositionError {
    #[error("while working with underlying file")]
    IO(#[from] io::Error),

    #[error("while trying to (de)serialize position")]
    Serde(#[from] bincode::Error),

    #[error("while moving temporary file over the position file")]
    Persist(#[source] io::Error),
}

/// Outcome of reading a position file.
///
/// Neither `Missing` nor `Corrupt` is an error for the tailer: both mean "start fresh".
#[derive(Debug)]
pub enum Loaded {
    Restored(Position),
    Missing,
    Corrupt(PositionError),
}

impl Loaded {
    /// Position to start from: the restored one, or the zero position.
    pub fn position(&self) -> Position {
        match self {
            Loaded::Restored(position) => *position,
            Loaded::Missing | Loaded::Corrupt(_) => Position::default(),
        }
    }

    pub fn is_restored(&self) -> bool {
        matches!(self, Loaded::Restored(_))
    }
}

/// Read position record stored at `path`.
pub fn load(path: &Path) -> Loaded {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(file = %path.display(), "no position file, starting fresh");
            return Loaded::Missing;
        }
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "position file unreadable, starting fresh");
            return Loaded::Corrupt(e.into());
        }
    };
    match bincode::deserialize::<Position>(&bytes) {
        Ok(position) => {
            tracing::debug!(
                file = %path.display(),
                identity = position.identity.raw(),
                offset = position.offset,
                "loaded position"
            );
            Loaded::Restored(position)
        }
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "position file corrupt, starting fresh");
            Loaded::Corrupt(e.into())
        }
    }
}

/// Overwrite position record at `path`, creating parent directory if needed.
///
/// The record is written into a temporary file next to `path` and renamed over it, so readers
/// see either the previous record or the new one.
pub fn save(path: &Path, position: &Position) -> Result<(), PositionError> {
    let contents = bincode::serialize(position)?;
    write_atomically(path, &contents, |temporary, target| {
        temporary.persist(target).map(drop).map_err(|e| e.error)
    })?;
    tracing::debug!(
        file = %path.display(),
        identity = position.identity.raw(),
        offset = position.offset,
        "saved position"
    );
    Ok(())
}

fn write_atomically(
    path: &Path,
    contents: &[u8],
    commit: impl FnOnce(NamedTempFile, &Path) -> io::Result<()>,
) -> Result<(), PositionError> {
    // rename is only atomic inside one filesystem, so temporary file lives next to the target
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    // dropping NamedTempFile removes it, which covers every failure before commit
    let mut temporary = NamedTempFile::new_in(dir)?;
    temporary.write_all(contents)?;
    temporary.flush()?;
    temporary.as_file().sync_all()?;
    commit(temporary, path).map_err(PositionError::Persist)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn scratch() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut entries = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect::<Vec<_>>();
        entries.sort();
        entries
    }

    fn sample() -> Position {
        Position {
            identity: Identity::new(1234),
            offset: 56,
        }
    }

    #[rstest]
    fn missing_file_loads_as_missing(scratch: TempDir) {
        let loaded = load(&scratch.path().join("pos"));
        assert!(matches!(loaded, Loaded::Missing));
        assert_eq!(loaded.position(), Position::default());
    }

    #[rstest]
    #[case(b"")]
    #[case(b"\x01\x02\x03")]
    #[case(b"{\"inode\":")]
    fn garbage_loads_as_corrupt(scratch: TempDir, #[case] contents: &'static [u8]) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        fs::write(&path, contents)?;
        let loaded = load(&path);
        assert!(matches!(loaded, Loaded::Corrupt(PositionError::Serde(_))));
        assert!(!loaded.is_restored());
        assert_eq!(loaded.position(), Position::default());
        Ok(())
    }

    #[rstest]
    fn directory_in_place_of_file_loads_as_corrupt(scratch: TempDir) {
        let loaded = load(scratch.path());
        assert!(matches!(loaded, Loaded::Corrupt(PositionError::IO(_))));
        assert_eq!(loaded.position(), Position::default());
    }

    #[rstest]
    fn saved_position_is_restored(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        save(&path, &sample())?;
        let loaded = load(&path);
        assert!(loaded.is_restored());
        assert_eq!(loaded.position(), sample());
        Ok(())
    }

    #[rstest]
    fn record_is_two_fixed_width_integers(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        save(&path, &sample())?;
        let bytes = fs::read(&path)?;
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[..8], 1234u64.to_le_bytes());
        assert_eq!(bytes[8..], 56u64.to_le_bytes());
        Ok(())
    }

    #[rstest]
    fn save_overwrites_wholesale(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        save(&path, &sample())?;
        let next = Position {
            identity: Identity::new(99),
            offset: 1,
        };
        save(&path, &next)?;
        assert_eq!(load(&path).position(), next);
        assert_eq!(entries(scratch.path()), vec![path]);
        Ok(())
    }

    #[rstest]
    fn save_creates_parent_directories(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("nested").join("deeper").join("pos");
        save(&path, &sample())?;
        assert_eq!(load(&path).position(), sample());
        Ok(())
    }

    #[rstest]
    fn failed_commit_keeps_previous_record(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        save(&path, &sample())?;

        let next = bincode::serialize(&Position::default())?;
        let result = write_atomically(&path, &next, |_temporary, _target| {
            Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
        });

        assert!(matches!(result, Err(PositionError::Persist(_))));
        assert_eq!(load(&path).position(), sample());
        assert_eq!(entries(scratch.path()), vec![path]);
        Ok(())
    }

    #[rstest]
    fn failed_commit_leaves_no_file_behind(scratch: TempDir) {
        let path = scratch.path().join("pos");
        let result = write_atomically(&path, b"payload", |_temporary, _target| {
            Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
        });

        assert!(result.is_err());
        assert!(matches!(load(&path), Loaded::Missing));
        assert!(entries(scratch.path()).is_empty());
    }

    #[rstest]
    fn rename_over_directory_fails_cleanly(scratch: TempDir) -> anyhow::Result<()> {
        let path = scratch.path().join("pos");
        fs::create_dir(&path)?;
        fs::write(path.join("occupant"), b"x")?;

        let result = save(&path, &sample());

        assert!(matches!(result, Err(PositionError::Persist(_))));
        assert_eq!(entries(scratch.path()), vec![path]);
        Ok(())
    }
}
