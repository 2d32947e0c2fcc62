//! Field validation for the three metadata strings a file's identity is
//! built from: `filename`, `extension`, and `path`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::*;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]*$").unwrap());
static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[A-Za-z0-9._/-]*/$").unwrap());

pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty() || filename.len() > 255 || !FILENAME_RE.is_match(filename) {
        return Err(ErrorKind::Validation(format!(
            "filename must be 1-255 characters matching [A-Za-z0-9._-]+, got '{}'",
            filename
        ))
        .into());
    }
    Ok(())
}

pub fn validate_extension(extension: &str) -> Result<()> {
    if extension.len() > 10 || !EXTENSION_RE.is_match(extension) {
        return Err(ErrorKind::Validation(format!(
            "extension must be 0-10 alphanumeric characters, got '{}'",
            extension
        ))
        .into());
    }
    Ok(())
}

pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.len() > 1024 || !PATH_RE.is_match(path) {
        return Err(ErrorKind::Validation(format!(
            "path must be 1-1024 characters, start and end with '/', matching \
             /[A-Za-z0-9._/-]*/, got '{}'",
            path
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_fields() {
        assert!(validate_filename("notes").is_ok());
        assert!(validate_filename("my-file_v2.final").is_ok());
        assert!(validate_extension("txt").is_ok());
        assert!(validate_extension("").is_ok());
        assert!(validate_path("/a/").is_ok());
        assert!(validate_path("/a/b/c/").is_ok());
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(validate_filename("").is_err());
        assert!(validate_filename("has space").is_err());
        assert!(validate_filename(&"x".repeat(256)).is_err());
        assert!(validate_extension("t!").is_err());
        assert!(validate_extension(&"x".repeat(11)).is_err());
        assert!(validate_path("a/").is_err());
        assert!(validate_path("/a").is_err());
        assert!(validate_path("").is_err());
    }
}
