//! Utility functions for file naming and path handling

use crate::config::FileCollisionAction;
use crate::error::{DownloadError, Error, Result};
use crate::types::MediaKind;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Base name used when a title has no alphanumeric characters at all
const FALLBACK_STEM: &str = "download";

/// Turn a title into a file stem
///
/// ASCII letters and digits are kept and lowercased; every run of anything else
/// becomes a single `_`. Leading and trailing separators are dropped.
///
/// # Examples
///
/// ```
/// use xstream_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("Wow!! Check THIS out #1"), "wow_check_this_out_1");
/// assert_eq!(sanitize_title("???"), "download");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !stem.is_empty() {
                stem.push('_');
            }
            pending_separator = false;
            stem.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// File name for a saved rendition: `{sanitized title}_{quality}.{mp3|mp4}`
///
/// Path separators and other characters that cannot appear in a file name are
/// replaced in the quality label; its case is kept.
///
/// # Examples
///
/// ```
/// use xstream_dl::types::MediaKind;
/// use xstream_dl::utils::download_file_name;
///
/// let name = download_file_name("Wow!! Check THIS out #1", "720p", MediaKind::Video);
/// assert_eq!(name, "wow_check_this_out_1_720p.mp4");
/// ```
#[must_use]
pub fn download_file_name(title: &str, quality: &str, kind: MediaKind) -> String {
    let quality: String = quality
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    if quality.is_empty() {
        format!("{}.{}", sanitize_title(title), kind.extension())
    } else {
        format!("{}_{}.{}", sanitize_title(title), quality, kind.extension())
    }
}

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename`, `movie.mp4` becomes `movie (1).mp4`, then `movie (2).mp4`, and so on.
/// For `Skip`, an existing file is an error. For `Overwrite`, the path is returned unchanged.
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(Error::Download(DownloadError::Save(format!(
                    "{} already exists and collision action is skip",
                    path.display()
                ))));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::Download(DownloadError::Save(format!(
                    "cannot extract file stem from {}",
                    path.display()
                )))
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(Error::Download(DownloadError::Save(format!(
                "could not find unique filename for {} after {} attempts",
                path.display(),
                MAX_RENAME_ATTEMPTS
            ))))
        }
    }
}
