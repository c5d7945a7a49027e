use std::path::{Component, Path};

use crate::error::TransferError;

/// Validates that an announced file name is a single plain path component.
///
/// The receiver joins the name onto its output directory, so anything
/// that could land elsewhere is rejected:
/// - Empty names, `.` and `..`
/// - Path separators (`/` or `\`)
/// - Absolute paths and, on Windows, drive prefixes (`C:`)
/// - NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.contains('\0') {
        return Err(TransferError::InvalidName(format!(
            "NUL byte not allowed: {name:?}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    // A colon is an ordinary file name byte on Unix.
    if cfg!(windows) && name.len() >= 2 && name.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidName(format!(
            "drive prefix not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(TransferError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}
