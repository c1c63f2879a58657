//! Object key layout.
//!
//! Every customer owns the prefix `{customer_id}/`. Two filenames are reserved:
//! `base.csv` (products shared by all industries) and `prompt.txt`
//! (instructions for the model). Any other top-level `*.csv` names an industry.
//! Chat attachments live one level deeper under `chat_files/`.

use crate::errors::AppError;

pub const BASE_FILE: &str = "base.csv";
pub const PROMPT_FILE: &str = "prompt.txt";
pub const CHAT_FILES_DIR: &str = "chat_files";

const CSV_EXTENSION: &str = ".csv";

pub fn customer_prefix(customer_id: &str) -> String {
    format!("{customer_id}/")
}

pub fn object_key(customer_id: &str, filename: &str) -> String {
    format!("{customer_id}/{filename}")
}

pub fn industry_key(customer_id: &str, industry: &str) -> String {
    format!("{customer_id}/{industry}{CSV_EXTENSION}")
}

pub fn chat_files_prefix(customer_id: &str) -> String {
    format!("{customer_id}/{CHAT_FILES_DIR}/")
}

pub fn chat_file_key(customer_id: &str, filename: &str) -> String {
    format!("{customer_id}/{CHAT_FILES_DIR}/{filename}")
}

/// Strips `prefix` from each key, dropping keys that do not carry it and
/// "directory marker" keys that end up empty.
pub fn strip_prefix(keys: Vec<String>, prefix: &str) -> Vec<String> {
    keys.into_iter()
        .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
        .filter(|name| !name.is_empty())
        .collect()
}

/// Maps a filename relative to the customer prefix to an industry name.
///
/// Only top-level files ending in exactly `.csv` count, so every listed
/// industry reads back through `industry_key`. The base file never does.
pub fn industry_from_filename(filename: &str) -> Option<&str> {
    if filename.contains('/') {
        return None;
    }
    let stem = filename.strip_suffix(CSV_EXTENSION)?;
    if stem.is_empty() || is_base_industry(stem) {
        return None;
    }
    Some(stem)
}

/// True when `industry` would resolve to the base file.
pub fn is_base_industry(industry: &str) -> bool {
    format!("{industry}{CSV_EXTENSION}").eq_ignore_ascii_case(BASE_FILE)
}

/// Validates a single key segment (customer id, filename, industry) supplied
/// by a caller. Returns the trimmed value.
pub fn validate_segment(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(AppError::Validation(format!(
            "{field} must not contain path separators"
        )));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::Validation(format!("{field} is not a valid name")));
    }
    Ok(trimmed.to_string())
}
