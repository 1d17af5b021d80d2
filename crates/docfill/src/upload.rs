//! Uploaded files.

use std::path::{Path, PathBuf};

use docfill_std::error::prelude::*;
use itertools::Itertools;
use unicode_normalization::UnicodeNormalization;

/// The name used when sanitizing leaves nothing.
pub const FALLBACK_NAME: &str = "upload";

const WINDOWS_DEVICE_NAMES: [&str; 24] = [
    "CON", "PRN", "AUX", "NUL", "COM0", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
    "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A file part of a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// The client-provided file name.
    pub filename: String,
    /// The file contents.
    pub data: Vec<u8>,
}

impl Upload {
    /// Saves the file into `dir` under its sanitized name, creating the
    /// directory when missing. An existing file with the same name is
    /// overwritten.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).with_context("create uploads directory", || {
            Some(vec![("path", dir.display().to_string())].into_boxed_slice())
        })?;

        let path = dir.join(secure_filename(&self.filename));
        std::fs::write(&path, &self.data).with_context("save upload", || {
            Some(vec![("path", path.display().to_string())].into_boxed_slice())
        })?;

        log::info!("saved upload {:?} to {}", self.filename, path.display());
        Ok(path)
    }
}

/// Turns a client-provided file name into a safe, flat ASCII name.
///
/// Accents are decomposed and dropped, path separators and whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing dots and underscores are stripped. Windows device names get a
/// `_` prefix.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if matches!(c, '/' | '\\') { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let mut name = kept.trim_matches(|c| c == '.' || c == '_').to_owned();

    let stem = name.split('.').next().unwrap_or_default();
    if !stem.is_empty() && WINDOWS_DEVICE_NAMES.contains(&stem.to_ascii_uppercase().as_str()) {
        name.insert(0, '_');
    }

    if name.is_empty() {
        FALLBACK_NAME.to_owned()
    } else {
        name
    }
}
