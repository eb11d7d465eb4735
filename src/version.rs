//! Version information for titlekit

/// Crate version, overridable at build time through `TITLEKIT_VERSION`
pub const VERSION: &str = env!("TITLEKIT_VERSION");

/// Git commit hash (set at compile time)
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Get full version string with optional build information
pub fn full_version() -> String {
    let mut version = VERSION.to_string();

    if let Some(commit) = GIT_COMMIT {
        version.push_str(&format!(" ({})", &commit[..8.min(commit.len())]));
    }

    version
}
