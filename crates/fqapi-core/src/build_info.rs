//! Build-time metadata embedded by the build script.
//!
//! Feeds the `User-Agent` of the remote channel and the CLI `version`
//! command.

/// The git commit at build time (short form, `-dirty` when modified).
pub const GIT_HASH: &str = env!("FQAPI_GIT_HASH");

/// The build timestamp as a Unix epoch string.
pub const BUILD_TIMESTAMP: &str = env!("FQAPI_BUILD_TIMESTAMP");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("FQAPI_BUILD_PROFILE");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Return a formatted version string including git hash and profile.
///
/// Example: `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}

/// The `User-Agent` sent on remote requests, e.g. `"fqapi/0.1.0"`.
pub fn user_agent() -> String {
    format!("fqapi/{VERSION}")
}
