//! Filesystem-under-test contract.

use frs_error::Result;
use rand::Rng;

/// Namespace root locator.
pub const ROOT_DIR: &str = "/";

const NAME_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// An open content handle returned by [`FsApi::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    pub id: u64,
    pub path: String,
}

/// Capabilities the population and clearing actions need from a filesystem.
///
/// Paths are absolute, `/`-separated and rooted at [`ROOT_DIR`]. Boolean
/// returns follow the filesystem's own success convention; `Err` is reserved
/// for failures the implementation can describe.
pub trait FsApi {
    /// Open existing content by locator.
    fn open(&mut self, locator: &str) -> Result<ContentHandle>;

    /// Close a handle. Returns `false` if the handle was not open.
    fn close(&mut self, handle: ContentHandle) -> bool;

    /// Create a file under `parent`; the filesystem picks a name if `None`.
    fn mkfile(&mut self, parent: &str, name: Option<&str>) -> bool;

    /// Create a directory under `parent`; the filesystem picks a name if `None`.
    fn mkdir(&mut self, parent: &str, name: Option<&str>) -> bool;

    /// Create a randomly named file under `parent` and return its name.
    fn make_random_file(&mut self, parent: &str) -> Result<String>;

    /// Create a randomly named directory under `parent` and return its name.
    fn make_random_dir(&mut self, parent: &str) -> Result<String>;

    /// Delete the content behind `handle`. Directories are removed
    /// recursively.
    fn delete(&mut self, handle: &ContentHandle) -> bool;
}

/// Join a child name onto an absolute parent path.
#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == ROOT_DIR {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Number of components below the root (`/` is 0, `/a/b` is 2).
#[must_use]
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|part| !part.is_empty()).count()
}

/// 8.3-style random name: eight characters, plus `.ext` when given.
pub fn random_name<R: Rng + ?Sized>(rng: &mut R, ext: Option<&str>) -> String {
    let mut name: String = (0..8)
        .map(|_| char::from(NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())]))
        .collect();
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn join_path_handles_root() {
        assert_eq!(join_path("/", "A"), "/A");
        assert_eq!(join_path("/A", "B"), "/A/B");
    }

    #[test]
    fn depth_counts_components() {
        assert_eq!(path_depth("/"), 0);
        assert_eq!(path_depth("/A"), 1);
        assert_eq!(path_depth("/A/B/C"), 3);
    }

    #[test]
    fn random_names_are_fat_shaped() {
        let mut rng = StdRng::seed_from_u64(1);
        let dir = random_name(&mut rng, None);
        let file = random_name(&mut rng, Some("TXT"));
        assert_eq!(dir.len(), 8);
        assert!(dir.bytes().all(|b| NAME_ALPHABET.contains(&b)));
        assert_eq!(file.len(), 12);
        assert!(file.ends_with(".TXT"));
    }
}
