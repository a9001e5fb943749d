use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    path_utils::parent_dir,
    position::{self, Position, PositionError},
    resolver::find_by_identity,
    Identify, Identity, PlatformIdentity,
};

/// Which file `Tailer` is reading from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Draining unread bytes of a file that was rotated away from the live path
    Rotated,
    /// Reading the file currently found at the live path
    Live,
}

enum Handle {
    Rotated(File),
    Live(File),
}

impl Handle {
    fn mode(&self) -> Mode {
        match self {
            Handle::Rotated(_) => Mode::Rotated,
            Handle::Live(_) => Mode::Live,
        }
    }

    fn file(&mut self) -> &mut File {
        match self {
            Handle::Rotated(file) | Handle::Live(file) => file,
        }
    }
}

/// Possible errors that could happen while working with `Tailer`
#[derive(Error, Debug)]
pub enum TailerError {
    #[error("live file {} is not accessible", .path.display())]
    LiveFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rotated file {} could not be reopened", .path.display())]
    RotatedFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("while scanning {} for rotated file", .dir.display())]
    DirectoryScan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("while working with underlying file")]
    IO(#[from] io::Error),
    #[error("while working with persistent position storage")]
    Persistence(#[from] PositionError),
}

/// Reader of an append-only file that keeps its offset across restarts and log rotation.
///
/// ## Usage
///
/// Open a `Tailer` with a path to the log file and a path to the position file. The result
/// implements `Read` and `Seek`; wrap it into `BufReader` for line-oriented reading.
///
/// ```rust no_run
/// # use std::io::{BufRead, BufReader};
/// # use tailtrack::{Tailer, TailerError};
/// let mut tailer = Tailer::open("/var/log/mail.log", "/var/lib/shipper/mail.pos")?;
/// for line in BufReader::new(&mut tailer).lines() {
///     println!("read line: `{}`", line?);
/// }
/// tailer.close()?;
/// # Ok::<(), TailerError>(())
/// ```
///
/// ## Working principles
///
/// The position file stores identity (inode) of the file being read together with an offset
/// into it. When opening, stored identity is compared to the identity of the file at the live
/// path. If they differ, the live file was rotated: the directory of the live path is searched
/// for the file with stored identity (eg. `mail.log.1` or `mail.log.bak`) and its unread bytes are
/// read first. Once it is exhausted, the tailer switches to the live path inside the same `read`
/// call, so the stream has no visible seam at the rotation boundary.
///
/// Offset that exceeds the size of the live file means the file was truncated, and reading
/// restarts from zero. Missing or corrupt position file and missing rotated file also mean
/// reading the live file from zero.
///
/// ## Cleanup
///
/// * **explicit** by calling `.close()`, which returns any error from saving the position
/// * **implicitly** by relying on `Drop`. Errors cannot be returned here and are only logged.
///
/// ## Limitations
///
/// * Only one rotation is recovered. If the file was rotated twice since the last run, bytes of
/// the middle file are skipped.
///
/// * Seeking never leaves the current file: while draining a rotated file, `seek` moves inside it.
pub struct Tailer<I: Identify = PlatformIdentity> {
    file_path: PathBuf,
    position_path: PathBuf,
    position: Position,
    handle: Handle,
    identify: I,
    already_freed: bool,
}

impl Tailer<PlatformIdentity> {
    /// Opens `file_path` for reading, resuming from the position stored in `position_path`.
    ///
    /// # Arguments
    ///
    /// * `file_path` - a path to log file to be read. It must exist.
    /// * `position_path` - path to file used to persist identity and offset. It is created on close
    /// together with its parent directory when missing.
    pub fn open(
        file_path: impl AsRef<Path>,
        position_path: impl AsRef<Path>,
    ) -> Result<Self, TailerError> {
        Self::open_with(file_path, position_path, PlatformIdentity::default())
    }
}

impl<I: Identify> Tailer<I> {
    /// Same as `Tailer::open`, but files are identified by `identify`
    pub fn open_with(
        file_path: impl AsRef<Path>,
        position_path: impl AsRef<Path>,
        identify: I,
    ) -> Result<Self, TailerError> {
        let file_path = file_path.as_ref().to_path_buf();
        let position_path = position_path.as_ref().to_path_buf();
        let mut position = position::load(&position_path).position();

        let live_metadata =
            std::fs::metadata(&file_path).map_err(|source| TailerError::LiveFile {
                path: file_path.clone(),
                source,
            })?;
        let current = identify.identify(&live_metadata);

        if position.identity.is_known() && !position.identity.matches(current) {
            tracing::info!(
                file = %file_path.display(),
                stored = position.identity.raw(),
                current = current.raw(),
                "file was replaced, looking for rotated version"
            );
            if let Some(rotated) = open_rotated(&file_path, &position, &identify)? {
                return Ok(Self {
                    file_path,
                    position_path,
                    position,
                    handle: Handle::Rotated(rotated),
                    identify,
                    already_freed: false,
                });
            }
            position.offset = 0;
        }

        let live = open_live(&file_path, &mut position, &identify).map_err(|source| {
            TailerError::LiveFile {
                path: file_path.clone(),
                source,
            }
        })?;
        Ok(Self {
            file_path,
            position_path,
            position,
            handle: Handle::Live(live),
            identify,
            already_freed: false,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn position_path(&self) -> &Path {
        &self.position_path
    }

    /// Identity of the file currently read and number of bytes delivered from it
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn mode(&self) -> Mode {
        self.handle.mode()
    }

    /// Explicitly save current position into position file without closing
    pub fn persist(&self) -> Result<(), TailerError> {
        position::save(&self.position_path, &self.position)?;
        Ok(())
    }

    /// Explicitly finalize structure, returning any errors that were produced in the process. Alternative to relying on `Drop`.
    ///
    /// File handle is released whether saving succeeds or not.
    pub fn close(mut self) -> Result<(), TailerError> {
        self.already_freed = true;
        self.persist()
    }

    /// Replace exhausted rotated file with the live one and fill the rest of `buf` from it.
    ///
    /// `filled` bytes from the rotated file are already in `buf` and are never lost: if the
    /// switch fails, they are returned and the error shows up on the next call.
    fn switch_to_live(&mut self, buf: &mut [u8], filled: usize) -> io::Result<usize> {
        let (mut live, identity) = match open_identified(&self.file_path, &self.identify) {
            Ok(opened) => opened,
            Err(e) if filled > 0 => {
                tracing::warn!(file = %self.file_path.display(), error = %e, "live file not available after draining rotated file");
                return Ok(filled);
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            file = %self.file_path.display(),
            drained = self.position.offset,
            identity = identity.raw(),
            "rotated file drained, switching to live file"
        );
        self.position = Position {
            identity,
            offset: 0,
        };
        let read = live.read(&mut buf[filled..]);
        self.handle = Handle::Live(live);
        match read {
            Ok(size_read) => {
                self.position.offset += size_read as u64;
                Ok(filled + size_read)
            }
            Err(e) if filled > 0 => {
                tracing::warn!(file = %self.file_path.display(), error = %e, "read from live file failed right after switching");
                Ok(filled)
            }
            Err(e) => Err(e),
        }
    }
}

fn open_identified(path: &Path, identify: &impl Identify) -> io::Result<(File, Identity)> {
    let file = File::open(path)?;
    let identity = identify.identify(&file.metadata()?);
    Ok((file, identity))
}

/// Open live file, pointing `position` at it and seeking to stored offset if it is still valid
fn open_live(path: &Path, position: &mut Position, identify: &impl Identify) -> io::Result<File> {
    let (mut file, identity) = open_identified(path, identify)?;
    let size = file.metadata()?.len();
    position.identity = identity;
    if position.offset > size {
        tracing::info!(
            file = %path.display(),
            offset = position.offset,
            size,
            "stored offset is past end of file, reading from start"
        );
        position.offset = 0;
    } else if position.offset > 0 {
        file.seek(SeekFrom::Start(position.offset))?;
        tracing::debug!(file = %path.display(), offset = position.offset, "resuming");
    }
    Ok(file)
}

/// Locate and open rotated file with unread bytes left, positioned at stored offset
fn open_rotated(
    file_path: &Path,
    position: &Position,
    identify: &impl Identify,
) -> Result<Option<File>, TailerError> {
    let dir = parent_dir(file_path);
    let found = find_by_identity(position.identity, dir, identify).map_err(|source| {
        TailerError::DirectoryScan {
            dir: dir.to_path_buf(),
            source,
        }
    })?;
    let Some(rotated_path) = found else {
        tracing::warn!(
            file = %file_path.display(),
            identity = position.identity.raw(),
            "rotated file not found, reading live file from start"
        );
        return Ok(None);
    };

    let fail = |source: io::Error| TailerError::RotatedFile {
        path: rotated_path.clone(),
        source,
    };
    let mut rotated = File::open(&rotated_path).map_err(fail)?;
    let size = rotated.metadata().map_err(fail)?.len();
    if size <= position.offset {
        tracing::info!(
            file = %rotated_path.display(),
            offset = position.offset,
            size,
            "rotated file has nothing left to read"
        );
        return Ok(None);
    }
    rotated
        .seek(SeekFrom::Start(position.offset))
        .map_err(fail)?;
    tracing::info!(
        file = %rotated_path.display(),
        offset = position.offset,
        remaining = size - position.offset,
        "draining rotated file"
    );
    Ok(Some(rotated))
}

impl<I: Identify> Read for Tailer<I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rotated = match &mut self.handle {
            Handle::Live(live) => {
                let size_read = live.read(buf)?;
                self.position.offset += size_read as u64;
                return Ok(size_read);
            }
            Handle::Rotated(rotated) => rotated,
        };

        // rotated file no longer grows, so a short read can only mean its end
        let mut filled = 0;
        while filled < buf.len() {
            match rotated.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(size_read) => {
                    filled += size_read;
                    self.position.offset += size_read as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if filled == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(file = %self.file_path.display(), error = %e, "read from rotated file failed");
                    return Ok(filled);
                }
            }
        }
        if filled == buf.len() {
            return Ok(filled);
        }
        self.switch_to_live(buf, filled)
    }
}

impl<I: Identify> Seek for Tailer<I> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let offset = self.handle.file().seek(pos)?;
        self.position.offset = offset;
        Ok(offset)
    }
}

/// Saves position if `.close()` was not called previously. Errors are logged, not raised;
/// use `.close()` to handle them.
impl<I: Identify> Drop for Tailer<I> {
    fn drop(&mut self) {
        if self.already_freed {
            return;
        }
        if let Err(e) = self.persist() {
            tracing::warn!(
                file = %self.position_path.display(),
                error = %e,
                "failed to save position on drop"
            );
        }
    }
}
