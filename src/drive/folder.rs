use crate::error::{CourierError, Result};
use std::fmt;
use tracing::warn;
use url::Url;

/// Drive id of a destination folder, as opposed to its sharing URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderReference(String);

impl FolderReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the folder id from links like
/// `https://drive.google.com/drive/folders/<id>?usp=sharing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FolderResolver;

impl FolderResolver {
    pub fn resolve(&self, location_url: &str) -> Result<FolderReference> {
        let found = match Url::parse(location_url.trim()) {
            Ok(url) => url
                .path_segments()
                .and_then(id_after_folders)
                .map(str::to_string),
            Err(_) => id_after_folders(
                location_url
                    .split(['?', '#'])
                    .next()
                    .unwrap_or_default()
                    .split('/'),
            )
            .map(str::to_string),
        };

        match found {
            Some(id) => Ok(FolderReference(id)),
            None => {
                warn!(url = %location_url, "could not extract a folder id from location reference");
                Err(CourierError::InvalidLocationReference {
                    url: location_url.to_string(),
                })
            }
        }
    }
}

/// Id from the first `folders` segment followed by a usable one. The id is
/// the longest leading run of `[A-Za-z0-9_-]` in that next segment.
fn id_after_folders<'a>(mut segments: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    while let Some(segment) = segments.next() {
        if segment != "folders" {
            continue;
        }
        let Some(next) = segments.next() else {
            return None;
        };
        let id = folder_id_prefix(next);
        if !id.is_empty() {
            return Some(id);
        }
    }
    None
}

fn folder_id_prefix(segment: &str) -> &str {
    let end = segment
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'-' || b == b'_'))
        .unwrap_or(segment.len());
    &segment[..end]
}
