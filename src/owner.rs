//! Owner identity and the filesystem metadata boundary
//!
//! The rest of the crate only sees [`Owner`] and [`EntryKind`]; reading
//! and changing ownership goes through [`OwnerBackend`] so the walker and
//! workers can run against the real filesystem or a test double.

use crate::error::ConfigError;
use nix::fcntl::AtFlags;
use nix::unistd::{Uid, User};
use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Numeric owner identifier of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(u32);

impl Owner {
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// Owner of the running process (effective uid)
    pub fn current() -> Self {
        Self(nix::unistd::geteuid().as_raw())
    }

    /// Resolve a user name through the system user database
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match User::from_name(name) {
            Ok(Some(user)) => Ok(Self(user.uid.as_raw())),
            Ok(None) => Err(ConfigError::UnknownUser {
                name: name.to_string(),
            }),
            Err(e) => Err(ConfigError::UserLookup {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// User name for display, if the id is known to the user database
    pub fn user_name(self) -> Option<String> {
        User::from_uid(Uid::from_raw(self.0))
            .ok()
            .flatten()
            .map(|u| u.name)
    }
}

impl From<u32> for Owner {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of a filesystem entry
///
/// Only regular files and directories are ever eligible for a change.
/// Symlinks are reported as such and never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Devices, FIFOs, sockets
    Special,
}

impl EntryKind {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let ft = meta.file_type();
        if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else {
            EntryKind::Special
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
            EntryKind::Special => "special",
        }
    }
}

/// Ownership metadata of one entry, read without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStat {
    pub kind: EntryKind,
    pub owner: Owner,
    pub size: u64,
}

/// Reads and changes entry ownership
///
/// Implementations must not follow symlinks in either direction: `stat`
/// describes the link itself and `set_owner` changes the link itself.
pub trait OwnerBackend: Send + Sync {
    fn stat(&self, path: &Path) -> std::io::Result<EntryStat>;

    /// Paths of the entries directly inside `dir`, in no particular order
    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    /// Change the primary owner only; group is left untouched
    fn set_owner(&self, path: &Path, owner: Owner) -> std::io::Result<()>;
}

/// Backend over the host filesystem (lstat + fchownat without following links)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend;

impl OwnerBackend for SystemBackend {
    fn stat(&self, path: &Path) -> std::io::Result<EntryStat> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(EntryStat {
            kind: EntryKind::from_metadata(&meta),
            owner: Owner(meta.uid()),
            size: meta.len(),
        })
    }

    fn set_owner(&self, path: &Path, owner: Owner) -> std::io::Result<()> {
        nix::unistd::fchownat(
            None,
            path,
            Some(Uid::from_raw(owner.as_raw())),
            None,
            AtFlags::AT_SYMLINK_NOFOLLOW,
        )
        .map_err(std::io::Error::from)
    }
}

impl<B: OwnerBackend + ?Sized> OwnerBackend for std::sync::Arc<B> {
    fn stat(&self, path: &Path) -> std::io::Result<EntryStat> {
        (**self).stat(path)
    }

    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        (**self).list_dir(dir)
    }

    fn set_owner(&self, path: &Path, owner: Owner) -> std::io::Result<()> {
        (**self).set_owner(path, owner)
    }
}
