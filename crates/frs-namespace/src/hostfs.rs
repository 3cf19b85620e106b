//! [`FsApi`] over a host directory, e.g. the mountpoint of an image under
//! test.

use crate::api::{ContentHandle, FsApi, ROOT_DIR, random_name};
use frs_error::{FrsError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug)]
pub struct HostDirFs {
    root: PathBuf,
    handles: BTreeMap<u64, String>,
    next_handle: u64,
    rng: StdRng,
}

impl HostDirFs {
    /// Wrap an existing directory.
    pub fn new(root: impl Into<PathBuf>, seed: u64) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FrsError::Namespace(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            handles: BTreeMap::new(),
            next_handle: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    fn host_path(&self, locator: &str) -> PathBuf {
        let relative = locator.trim_start_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn create(&self, parent: &str, name: &str, directory: bool) -> std::io::Result<()> {
        let parent = self.host_path(parent);
        if !parent.is_dir() {
            return Err(std::io::Error::new(
                ErrorKind::NotFound,
                format!("no such directory: {}", parent.display()),
            ));
        }
        let path = parent.join(name);
        if directory {
            fs::create_dir(path)
        } else {
            fs::File::create_new(path).map(drop)
        }
    }

    fn create_random(&mut self, parent: &str, directory: bool) -> Result<String> {
        for _ in 0..16 {
            let ext = if directory { None } else { Some("TXT") };
            let name = random_name(&mut self.rng, ext);
            match self.create(parent, &name, directory) {
                Ok(()) => return Ok(name),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {}
                Err(error) => {
                    return Err(FrsError::Namespace(format!(
                        "create {name} under {parent}: {error}"
                    )));
                }
            }
        }
        Err(FrsError::Namespace(format!(
            "could not find a free name under {parent}"
        )))
    }
}

fn remove_children(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

impl FsApi for HostDirFs {
    fn open(&mut self, locator: &str) -> Result<ContentHandle> {
        let path = self.host_path(locator);
        if !path.exists() {
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
            Some(name) => self.create(parent, name, false).is_ok(),
            None => self.create_random(parent, false).is_ok(),
        }
    }

    fn mkdir(&mut self, parent: &str, name: Option<&str>) -> bool {
        match name {
            Some(name) => self.create(parent, name, true).is_ok(),
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
        if !self.handles.contains_key(&handle.id) {
            return false;
        }
        let path = self.host_path(&handle.path);
        // The root directory itself is kept; only its contents go.
        let result = if handle.path == ROOT_DIR {
            remove_children(&path)
        } else if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(path = %path.display(), %error, "delete failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_deletes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs_api = HostDirFs::new(dir.path(), 3).unwrap();

        let sub = fs_api.make_random_dir("/").unwrap();
        let file = fs_api.make_random_file(&format!("/{sub}")).unwrap();
        assert!(dir.path().join(&sub).join(&file).is_file());

        let root = fs_api.open("/").unwrap();
        assert!(fs_api.delete(&root));
        assert!(fs_api.close(root));
        assert!(dir.path().is_dir());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn rejects_non_directory_root() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(HostDirFs::new(file.path(), 0).is_err());
    }

    #[test]
    fn mkfile_refuses_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs_api = HostDirFs::new(dir.path(), 0).unwrap();
        assert!(!fs_api.mkfile("/nope", Some("A.TXT")));
        assert!(fs_api.mkdir("/", Some("nope")));
        assert!(fs_api.mkfile("/nope", Some("A.TXT")));
        assert!(!fs_api.mkfile("/nope", Some("A.TXT")), "exists");
    }
}
