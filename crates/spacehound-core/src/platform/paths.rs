/// Request path validation and the exclusion-list matcher.
///
/// Cross-platform path semantics are out of scope; the only rewrite applied
/// is turning a bare drive letter into its root directory.
use crate::error::{EngineError, Result};
use std::path::{Path, PathBuf};

/// Validate a raw request path and normalise a bare drive letter.
///
/// `"D:"` means "current directory on drive D" to Windows, which is never
/// what a caller asking to scan a drive wants, so it becomes `"D:\"`.
pub fn normalize_scan_path(raw: &str) -> Result<PathBuf> {
    if raw.is_empty() {
        return Err(EngineError::EmptyPath);
    }
    if is_bare_drive_letter(raw) {
        return Ok(PathBuf::from(format!("{raw}\\")));
    }
    Ok(PathBuf::from(raw))
}

fn is_bare_drive_letter(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// True when `path` contains any of `patterns` as a case-sensitive substring.
///
/// Patterns are written with `/`; the path is also compared in `/`-separated
/// form so they match native Windows separators too.
pub fn is_excluded(path: &Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let native = path.to_string_lossy();
    let slashed = native.contains('\\').then(|| native.replace('\\', "/"));
    patterns.iter().any(|p| {
        native.contains(p.as_str()) || slashed.as_deref().is_some_and(|s| s.contains(p.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(normalize_scan_path(""), Err(EngineError::EmptyPath)));
    }

    #[test]
    fn drive_letter_gets_root_separator() {
        assert_eq!(normalize_scan_path("D:").unwrap(), PathBuf::from("D:\\"));
        assert_eq!(normalize_scan_path("c:").unwrap(), PathBuf::from("c:\\"));
    }

    #[test]
    fn other_paths_are_untouched() {
        assert_eq!(normalize_scan_path("D:\\").unwrap(), PathBuf::from("D:\\"));
        assert_eq!(normalize_scan_path("/srv").unwrap(), PathBuf::from("/srv"));
        assert_eq!(normalize_scan_path("1:").unwrap(), PathBuf::from("1:"));
        assert_eq!(normalize_scan_path("DD:").unwrap(), PathBuf::from("DD:"));
    }

    #[test]
    fn exclusion_is_case_sensitive_substring() {
        let p = patterns(&["Recovery", "$Recycle.Bin"]);
        assert!(is_excluded(Path::new("/mnt/c/Recovery/WindowsRE"), &p));
        assert!(is_excluded(Path::new("/mnt/c/MyRecoveryDisk"), &p));
        assert!(!is_excluded(Path::new("/mnt/c/recovery"), &p));
        assert!(!is_excluded(Path::new("/mnt/c/Users"), &[]));
    }

    #[test]
    fn forward_slash_patterns_match_backslash_paths() {
        let p = patterns(&["Windows/System32/LogFiles"]);
        assert!(is_excluded(Path::new("C:\\Windows\\System32\\LogFiles\\WMI"), &p));
        assert!(is_excluded(Path::new("/c/Windows/System32/LogFiles"), &p));
        assert!(!is_excluded(Path::new("C:\\Windows\\System32"), &p));
    }
}
