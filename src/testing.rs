//! Test double for [`OwnerBackend`]
//!
//! Uses the real directory structure but keeps owners in memory, so
//! ownership scenarios can be exercised without root.

use crate::owner::{EntryStat, Owner, OwnerBackend, SystemBackend};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub(crate) struct OverlayBackend {
    default_owner: Owner,
    owners: Mutex<HashMap<PathBuf, Owner>>,
    stat_failures: Mutex<HashSet<PathBuf>>,
    chown_failures: Mutex<HashSet<PathBuf>>,
    list_failures: Mutex<HashSet<PathBuf>>,
    attempts: Mutex<Vec<PathBuf>>,
}

impl OverlayBackend {
    pub(crate) fn new(default_owner: Owner) -> Self {
        Self {
            default_owner,
            owners: Mutex::new(HashMap::new()),
            stat_failures: Mutex::new(HashSet::new()),
            chown_failures: Mutex::new(HashSet::new()),
            list_failures: Mutex::new(HashSet::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set(&self, path: PathBuf, owner: Owner) {
        self.owners.lock().unwrap().insert(path, owner);
    }

    pub(crate) fn owner_of(&self, path: &Path) -> Owner {
        self.owners
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(self.default_owner)
    }

    pub(crate) fn fail_stat(&self, path: PathBuf) {
        self.stat_failures.lock().unwrap().insert(path);
    }

    pub(crate) fn fail_chown(&self, path: PathBuf) {
        self.chown_failures.lock().unwrap().insert(path);
    }

    /// Listing `dir` fails with permission denied
    pub(crate) fn fail_list_dir(&self, dir: PathBuf) {
        self.list_failures.lock().unwrap().insert(dir);
    }

    /// Paths passed to `set_owner`, in call order
    pub(crate) fn attempts(&self) -> Vec<PathBuf> {
        self.attempts.lock().unwrap().clone()
    }
}

impl OwnerBackend for OverlayBackend {
    fn stat(&self, path: &Path) -> io::Result<EntryStat> {
        if self.stat_failures.lock().unwrap().contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        let real = SystemBackend.stat(path)?;
        Ok(EntryStat {
            owner: self.owner_of(path),
            ..real
        })
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        if self.list_failures.lock().unwrap().contains(dir) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        SystemBackend.list_dir(dir)
    }

    fn set_owner(&self, path: &Path, owner: Owner) -> io::Result<()> {
        self.attempts.lock().unwrap().push(path.to_path_buf());
        if self.chown_failures.lock().unwrap().contains(path) {
            return Err(io::Error::from_raw_os_error(1));
        }
        self.set(path.to_path_buf(), owner);
        Ok(())
    }
}
