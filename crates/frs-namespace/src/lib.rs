#![forbid(unsafe_code)]
//! Namespace population and clearing for a filesystem under test.
//!
//! The filesystem itself is an external collaborator reached only through
//! [`FsApi`]. Actions decide counts, depths and parent selection; naming and
//! creation belong to the filesystem's own generators.

pub mod action;
pub mod api;
pub mod clear;
pub mod fill;
pub mod hostfs;
pub mod memfs;

pub use action::{ActionReport, FsAction};
pub use api::{ContentHandle, FsApi, ROOT_DIR, join_path, path_depth, random_name};
pub use clear::{ClearFileSystem, ClearReport};
pub use fill::{FillFileSystem, FillOptions, FillReport};
pub use hostfs::HostDirFs;
pub use memfs::MemFs;
