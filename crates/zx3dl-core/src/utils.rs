//! Shared utility functions for zx3dl crates

use anyhow::anyhow;
use std::path::PathBuf;

/// Get the user's home directory
///
/// The HOME variable wins over `dirs::home_dir()` so test harnesses and
/// sandboxed runs can redirect the default cache location.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Turn an arbitrary identifier into a filesystem-safe directory name
///
/// Keeps ASCII alphanumerics, dots, dashes and underscores; everything else
/// becomes `_`. Leading dots are stripped so no slug is hidden or `..`.
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_home_dir_from_env() {
        if std::env::var("HOME").is_ok() {
            let home = get_home_dir().unwrap();
            assert!(!home.as_os_str().is_empty());
        }
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("ZX3/CORES/spectrum.zx3"), "ZX3_CORES_spectrum.zx3");
        assert_eq!(sanitize_component("../etc"), "_etc");
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("a b?c"), "a_b_c");
    }
}
