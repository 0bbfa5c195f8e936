//! Shared helpers for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uid_migrate::owner::{EntryStat, Owner, OwnerBackend, SystemBackend};

/// Real directory structure, owners kept in memory
pub struct OverlayBackend {
    default_owner: Owner,
    owners: Mutex<HashMap<PathBuf, Owner>>,
    chown_failures: Mutex<HashSet<PathBuf>>,
    list_failures: Mutex<HashSet<PathBuf>>,
    attempts: Mutex<Vec<PathBuf>>,
}

impl OverlayBackend {
    pub fn new(default_owner: Owner) -> Self {
        Self {
            default_owner,
            owners: Mutex::new(HashMap::new()),
            chown_failures: Mutex::new(HashSet::new()),
            list_failures: Mutex::new(HashSet::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, path: PathBuf, owner: Owner) {
        self.owners.lock().unwrap().insert(path, owner);
    }

    pub fn owner_of(&self, path: &Path) -> Owner {
        self.owners
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(self.default_owner)
    }

    pub fn fail_chown(&self, path: PathBuf) {
        self.chown_failures.lock().unwrap().insert(path);
    }

    /// Listing `dir` fails with permission denied
    pub fn fail_list_dir(&self, dir: PathBuf) {
        self.list_failures.lock().unwrap().insert(dir);
    }

    pub fn attempts(&self) -> Vec<PathBuf> {
        self.attempts.lock().unwrap().clone()
    }
}

impl OwnerBackend for OverlayBackend {
    fn stat(&self, path: &Path) -> io::Result<EntryStat> {
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

/// Tree with 3 files and 2 directories owned by uid 0 and one file
/// owned by uid 5. Returns every entry path below the root.
pub fn scenario_tree(root: &Path, backend: &OverlayBackend) -> Vec<PathBuf> {
    let entries = [
        ("d1", true),
        ("d1/d2", true),
        ("d1/f1", false),
        ("d1/d2/f2", false),
        ("f3", false),
        ("foreign", false),
    ];

    for (rel, is_dir) in entries {
        let p = root.join(rel);
        if is_dir {
            std::fs::create_dir(&p).unwrap();
        } else {
            std::fs::write(&p, b"data").unwrap();
        }
    }

    backend.set(root.join("foreign"), Owner::from_raw(5));
    entries.iter().map(|(rel, _)| root.join(rel)).collect()
}
