//! Sources of asset records.

pub mod local;
pub mod svn;

pub use local::LocalTree;
pub use svn::{SvnCli, SvnTree, VcsClient, WorkingCopyInfo};

use crate::error::SyncError;
use crate::sync::AssetRecord;

/// Produces the records of one run.
///
/// The sequence is finite and consumed once. Files that cannot be inspected
/// are left out with a warning; an unreadable root is an error.
pub trait SourceEnumerator {
    /// Short description for logs.
    fn describe(&self) -> String;

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = AssetRecord> + '_>, SyncError>;
}
