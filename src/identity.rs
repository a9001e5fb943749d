use std::{fs::Metadata, io, path::Path};

use serde::{Deserialize, Serialize};

/// Durable identifier of a file on its filesystem (inode number on unix).
///
/// Zero is reserved for "unknown". An unknown identity never [matches](Identity::matches) anything,
/// including another unknown identity, so platforms without inode semantics never produce a false
/// "same file" answer. Derived equality compares raw values and is only meant for bookkeeping.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(u64);

impl Identity {
    pub const UNKNOWN: Identity = Identity(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self.0 != 0
    }

    /// Whether both identities are known and refer to the same file.
    pub fn matches(self, other: Identity) -> bool {
        self.is_known() && self == other
    }
}

/// Strategy for extracting an `Identity` out of file metadata.
pub trait Identify {
    fn identify(&self, metadata: &Metadata) -> Identity;

    /// Ask the filesystem for metadata of `path` (following symlinks) and identify it
    fn identify_path(&self, path: &Path) -> io::Result<Identity> {
        let metadata = std::fs::metadata(path)?;
        Ok(self.identify(&metadata))
    }
}

/// Identity by inode number.
#[cfg(unix)]
#[derive(Copy, Clone, Debug, Default)]
pub struct Inode;

#[cfg(unix)]
impl Identify for Inode {
    fn identify(&self, metadata: &Metadata) -> Identity {
        use std::os::unix::fs::MetadataExt;
        Identity(metadata.ino())
    }
}

/// Degraded strategy: every file is of unknown identity, so rotation is never detected and
/// resuming relies on the offset alone.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unidentified;

impl Identify for Unidentified {
    fn identify(&self, _metadata: &Metadata) -> Identity {
        Identity::UNKNOWN
    }
}

#[cfg(unix)]
pub type PlatformIdentity = Inode;

#[cfg(not(unix))]
pub type PlatformIdentity = Unidentified;
