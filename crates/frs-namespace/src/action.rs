//! Common shape of namespace actions.

use crate::api::FsApi;
use crate::clear::ClearReport;
use crate::fill::FillReport;
use frs_error::Result;
use serde::Serialize;

/// Outcome of one [`FsAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionReport {
    Fill(FillReport),
    Clear(ClearReport),
}

/// A namespace action run against a filesystem under test.
pub trait FsAction {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn action(&self, fs: &mut dyn FsApi) -> Result<ActionReport>;
}
