use std::path::{Component, Path, PathBuf};

use crate::TransferError;

/// Characters that may not appear in a file or folder name.
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validates a file or folder name that becomes a single path component.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Any of `< > : " / \ | ? *`
/// - Control characters
/// - `.` and `..`
pub fn validate_entry_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("name must not be empty".into()));
    }

    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_NAME_CHARS.contains(c) || c.is_control())
    {
        return Err(TransferError::InvalidName(format!(
            "name contains illegal character {c:?}: {name}"
        )));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "reserved name not allowed: {name}"
        )));
    }

    Ok(())
}

/// Validates a logical parent path and returns it relative to the blob root.
///
/// `/`, the empty string and `None`-like inputs resolve to the root itself.
/// A leading `/` is the logical root, not the filesystem root.
///
/// Rejects:
/// - Parent directory traversal (`..`)
/// - Windows drive prefixes (`C:`)
pub fn validate_parent_path(parent_path: &str) -> Result<PathBuf, TransferError> {
    let trimmed = parent_path.trim().trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        return Ok(PathBuf::new());
    }

    if trimmed.len() >= 2 && trimmed.as_bytes()[1] == b':' {
        return Err(TransferError::InvalidPath(format!(
            "path prefix not allowed: {parent_path}"
        )));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {parent_path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "path prefix not allowed: {parent_path}"
                )));
            }
        }
    }

    Ok(relative)
}

/// Canonical logical form of a parent path: `/` or `/a/b`.
///
/// Spellings that resolve to the same directory (`docs`, `/docs/`,
/// `/docs/./`) normalise to the same string.
pub fn logical_parent_path(parent_path: &str) -> Result<String, TransferError> {
    let relative = validate_parent_path(parent_path)?;
    let mut logical = String::new();
    for part in relative.iter() {
        logical.push('/');
        logical.push_str(&part.to_string_lossy());
    }
    if logical.is_empty() {
        logical.push('/');
    }
    Ok(logical)
}
