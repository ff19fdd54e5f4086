//! Platform-specific directory and executable lookup.

pub mod paths;
