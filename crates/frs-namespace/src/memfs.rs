//! In-memory [`FsApi`] used for dry runs and tests.

use crate::api::{ContentHandle, FsApi, ROOT_DIR, join_path, random_name};
use frs_error::{FrsError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct MemFs {
    directories: BTreeSet<String>,
    files: BTreeSet<String>,
    handles: BTreeMap<u64, String>,
    next_handle: u64,
    rng: StdRng,
}

impl MemFs {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut directories = BTreeSet::new();
        directories.insert(ROOT_DIR.to_owned());
        Self {
            directories,
            files: BTreeSet::new(),
            handles: BTreeMap::new(),
            next_handle: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Every directory except the root.
    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.directories
            .iter()
            .map(String::as_str)
            .filter(|dir| *dir != ROOT_DIR)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Files plus directories, root excluded.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.files.len() + self.directories.len() - 1
    }

    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn exists(&self, path: &str) -> bool {
        self.directories.contains(path) || self.files.contains(path)
    }

    fn create(&mut self, parent: &str, name: &str, directory: bool) -> bool {
        if !self.directories.contains(parent) {
            return false;
        }
        let path = join_path(parent, name);
        if self.exists(&path) {
            return false;
        }
        if directory {
            self.directories.insert(path)
        } else {
            self.files.insert(path)
        }
    }

    fn create_random(&mut self, parent: &str, directory: bool) -> Result<String> {
        if !self.directories.contains(parent) {
            return Err(FrsError::Namespace(format!("no such directory: {parent}")));
        }
        // Name collisions are possible; retry a bounded number of times.
        for _ in 0..16 {
            let ext = if directory { None } else { Some("TXT") };
            let name = random_name(&mut self.rng, ext);
            if self.create(parent, &name, directory) {
                return Ok(name);
            }
        }
        Err(FrsError::Namespace(format!(
            "could not find a free name under {parent}"
        )))
    }
}

fn is_descendant(path: &str, directory: &str) -> bool {
    if directory == ROOT_DIR {
        return path != ROOT_DIR;
    }
    path.strip_prefix(directory)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl FsApi for MemFs {
    fn open(&mut self, locator: &str) -> Result<ContentHandle> {
        if !self.exists(locator) {
            return Err(FrsError::Namespace(format!("no such content: {locator}")));
        }
        let id = self.next_handle;
        self.next_handle += 1;
        self.handles.insert(id, locator.to_owned());
        Ok(ContentHandle {
            id,
            path: locator.to_owned(),
        })
    }

    fn close(&mut self, handle: ContentHandle) -> bool {
        self.handles.remove(&handle.id).is_some()
    }

    fn mkfile(&mut self, parent: &str, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.create(parent, name, false),
            None => self.create_random(parent, false).is_ok(),
        }
    }

    fn mkdir(&mut self, parent: &str, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.create(parent, name, true),
            None => self.create_random(parent, true).is_ok(),
        }
    }

    fn make_random_file(&mut self, parent: &str) -> Result<String> {
        self.create_random(parent, false)
    }

    fn make_random_dir(&mut self, parent: &str) -> Result<String> {
        self.create_random(parent, true)
    }

    fn delete(&mut self, handle: &ContentHandle) -> bool {
        if !self.handles.contains_key(&handle.id) || !self.exists(&handle.path) {
            return false;
        }
        let target = handle.path.as_str();
        self.files
            .retain(|path| path != target && !is_descendant(path, target));
        self.directories.retain(|path| {
            path == ROOT_DIR || (path != target && !is_descendant(path, target))
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_creation_requires_existing_parent() {
        let mut fs = MemFs::new(0);
        assert!(fs.mkdir("/", Some("A")));
        assert!(fs.mkfile("/A", Some("F.TXT")));
        assert!(!fs.mkfile("/MISSING", Some("F.TXT")));
        assert!(!fs.mkdir("/", Some("A")), "duplicate name");
        assert_eq!(fs.entry_count(), 2);
    }

    #[test]
    fn random_creation_returns_the_name() {
        let mut fs = MemFs::new(9);
        let dir = fs.make_random_dir("/").unwrap();
        let file = fs.make_random_file(&join_path("/", &dir)).unwrap();
        assert!(fs.files().any(|f| f == format!("/{dir}/{file}")));
    }

    #[test]
    fn delete_is_recursive_and_keeps_root() {
        let mut fs = MemFs::new(0);
        assert!(fs.mkdir("/", Some("A")));
        assert!(fs.mkdir("/A", Some("B")));
        assert!(fs.mkfile("/A/B", Some("F.TXT")));
        assert!(fs.mkdir("/", Some("AB")));

        let handle = fs.open("/A").unwrap();
        assert!(fs.delete(&handle));
        assert!(fs.close(handle));
        // "/AB" shares a prefix with "/A" but is not inside it.
        assert_eq!(fs.directories().collect::<Vec<_>>(), vec!["/AB"]);

        let root = fs.open("/").unwrap();
        assert!(fs.delete(&root));
        assert!(fs.close(root));
        assert_eq!(fs.entry_count(), 0);
        assert!(fs.open("/").is_ok());
    }

    #[test]
    fn closed_handles_cannot_delete() {
        let mut fs = MemFs::new(0);
        assert!(fs.mkdir("/", Some("A")));
        let handle = fs.open("/A").unwrap();
        let copy = handle.clone();
        assert!(fs.close(handle));
        assert!(!fs.delete(&copy));
        assert_eq!(fs.open_handles(), 0);
    }
}
