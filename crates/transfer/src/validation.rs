use crate::UploadError;

/// Validates a remote destination path and returns it with a leading `/`.
///
/// Rejects:
/// - Empty paths and the bare root `/`
/// - Trailing `/` (the destination must name a file)
/// - Empty segments (`a//b`)
/// - `.` and `..` segments
/// - Control characters
pub fn normalize_remote_path(path: &str) -> Result<String, UploadError> {
    if path.is_empty() {
        return Err(UploadError::InvalidPath("empty path".into()));
    }

    if path.chars().any(char::is_control) {
        return Err(UploadError::InvalidPath(format!(
            "control character in path: {path:?}"
        )));
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Err(UploadError::InvalidPath(
            "destination must name a file, not the root".into(),
        ));
    }
    if trimmed.ends_with('/') {
        return Err(UploadError::InvalidPath(format!(
            "destination must not end with '/': {path}"
        )));
    }

    for segment in trimmed.split('/') {
        match segment {
            "" => {
                return Err(UploadError::InvalidPath(format!(
                    "empty path segment: {path}"
                )));
            }
            "." | ".." => {
                return Err(UploadError::InvalidPath(format!(
                    "relative segment not allowed: {path}"
                )));
            }
            _ => {}
        }
    }

    Ok(format!("/{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_leading_slash() {
        assert_eq!(normalize_remote_path("docs/a.txt").unwrap(), "/docs/a.txt");
    }

    #[test]
    fn keeps_absolute_path() {
        assert_eq!(normalize_remote_path("/docs/a.txt").unwrap(), "/docs/a.txt");
    }

    #[test]
    fn accepts_dotfile_and_spaces() {
        assert_eq!(
            normalize_remote_path("/My Files/.config").unwrap(),
            "/My Files/.config"
        );
    }

    #[test]
    fn rejects_empty_path() {
        assert!(normalize_remote_path("").is_err());
    }

    #[test]
    fn rejects_root() {
        assert!(normalize_remote_path("/").is_err());
    }

    #[test]
    fn rejects_trailing_slash() {
        assert!(normalize_remote_path("/docs/").is_err());
    }

    #[test]
    fn rejects_double_slash() {
        assert!(normalize_remote_path("/docs//a.txt").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(normalize_remote_path("/docs/../a.txt").is_err());
        assert!(normalize_remote_path("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(normalize_remote_path("./a.txt").is_err());
    }

    #[test]
    fn rejects_control_characters() {
        let err = normalize_remote_path("/docs/a\nb.txt").unwrap_err();
        assert!(matches!(err, UploadError::InvalidPath(_)));
    }
}
