//! Namespace teardown.
//!
//! Relies on the filesystem's delete being recursive; the tree is never
//! walked here.

use crate::action::{ActionReport, FsAction};
use crate::api::{FsApi, ROOT_DIR};
use frs_error::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub deleted: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClearFileSystem;

impl ClearFileSystem {
    /// Open the root, delete it recursively, close the handle.
    pub fn clear(&self, fs: &mut dyn FsApi) -> Result<ClearReport> {
        let root = fs.open(ROOT_DIR)?;
        let deleted = fs.delete(&root);
        let closed = fs.close(root);
        if !deleted {
            warn!("recursive delete of the namespace root reported failure");
        }
        if !closed {
            warn!("namespace root handle was not open at close");
        }
        info!(deleted, closed, "namespace cleared");
        Ok(ClearReport { deleted, closed })
    }
}

impl FsAction for ClearFileSystem {
    fn name(&self) -> &'static str {
        "clear_file_system"
    }

    fn action(&self, fs: &mut dyn FsApi) -> Result<ActionReport> {
        self.clear(fs).map(ActionReport::Clear)
    }
}
