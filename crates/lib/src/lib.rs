//! gitid-lib: Core logic for gitid
//!
//! This crate provisions and rolls back per-workspace VCS identities:
//! - `identity`: alias, namespace and tag derivation
//! - `block`: managed blocks inside shared config files, plus the collision guard
//! - `manifest`: the durable record of a provisioning run
//! - `provision`: the staged provisioning orchestrator
//! - `deprovision`: manifest-driven cleanup planning and execution
//! - `capability`: key generation and remote host interfaces

pub mod block;
pub mod capability;
pub mod consts;
pub mod deprovision;
pub mod identity;
pub mod layout;
pub mod manifest;
pub mod platform;
pub mod provision;
pub mod util;
