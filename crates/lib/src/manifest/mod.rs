//! Rollback manifest: the record of one provisioned identity.
//!
//! The manifest is written once at the end of a successful provisioning run
//! and is the only input to deprovisioning.

mod storage;
mod types;

pub use storage::{ListedManifest, ManifestError, delete, list, load, persist};
pub use types::*;
