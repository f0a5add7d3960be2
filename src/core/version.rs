//! Build metadata shared by the binary and library consumers.
//! Includes the version.rs generated by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Crate version from Cargo metadata
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line version banner used by `--version` and startup logging
pub fn long_version() -> String {
    format!("{} ({} built {})", version(), git_hash(), build_time())
}
