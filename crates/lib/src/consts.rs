/// Application name, used for the state directory and derived namespaces.
pub const APP_NAME: &str = "gitid";

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Number of hex characters of the alias digest kept in a namespace.
pub const NAMESPACE_HASH_LEN: usize = 8;

/// Manifest file name inside a namespace's state directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Remote host used when none is given.
pub const DEFAULT_HOST: &str = "github.com";

/// Prefix of the per-identity VCS config file name (`.gitconfig-<alias>`).
pub const GIT_CONFIG_SUFFIX: &str = "gitconfig";

/// Comment leader for marker lines in both managed files.
pub const MARKER_COMMENT: &str = "#";

/// Token scope needed to upload SSH authentication keys.
pub const SCOPE_PUBLIC_KEY: &str = "admin:public_key";

/// Token scope needed to upload signing keys.
pub const SCOPE_GPG_KEY: &str = "admin:gpg_key";

/// Exit code the remote host returns for a successful but non-interactive SSH session.
pub const PROBE_EXPECTED_EXIT: i32 = 1;
