//! Domain models for the mirror index
//!
//! A [`MediaRecord`] is one remote item together with the place it occupies in
//! the local mirror. Photos and videos share the record type; the kind tag
//! selects the kind-specific download policy.

use bridge_traits::catalog::{MediaKind, RemoteMediaItem};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, Result};

// =============================================================================
// Media records
// =============================================================================

/// One remote item mirrored locally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Remote identifier, unique within the index
    pub id: String,
    /// Filename as reported by the remote library
    pub orig_name: String,
    /// Folder relative to the mirror root, e.g. `photos/2023/01`
    pub relative_folder: String,
    /// Local filename, including the duplicate suffix when one is needed
    pub filename: String,
    /// Collision counter among items sharing `orig_name` in the folder
    pub duplicate_number: i64,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub checksum: Option<String>,
    pub kind: MediaKind,
    /// Creation time; never changes once indexed
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub downloaded: bool,
}

impl MediaRecord {
    /// Build a record from a catalog descriptor.
    ///
    /// The record starts without a duplicate suffix; call
    /// [`with_duplicate_number`](Self::with_duplicate_number) once the store
    /// has been consulted.
    ///
    /// # Errors
    ///
    /// Returns [`LibraryError::InvalidInput`] for descriptors without an id,
    /// a filename or a creation time.
    pub fn from_remote(item: &RemoteMediaItem, media_folder: &str) -> Result<Self> {
        if item.id.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: "descriptor has no identifier".to_string(),
            });
        }

        let orig_name = sanitize_filename(&item.filename);
        if orig_name.is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "filename".to_string(),
                message: format!("item {} has no usable filename", item.id),
            });
        }

        let created_at = item.created_at.ok_or_else(|| LibraryError::InvalidInput {
            field: "created_at".to_string(),
            message: format!("item {} has no creation time", item.id),
        })?;

        Ok(Self {
            id: item.id.clone(),
            filename: orig_name.clone(),
            orig_name,
            relative_folder: date_folder(media_folder, &created_at),
            duplicate_number: 0,
            description: item.description.clone(),
            mime_type: item.mime_type.clone(),
            size: item.size.and_then(|s| i64::try_from(s).ok()),
            checksum: item.checksum.clone(),
            kind: item.kind,
            created_at,
            modified_at: item.modified_at.unwrap_or(created_at),
            downloaded: false,
        })
    }

    /// Apply a duplicate counter, recomputing the local filename
    pub fn with_duplicate_number(mut self, duplicate_number: i64) -> Self {
        self.duplicate_number = duplicate_number;
        self.filename = disambiguated_filename(&self.orig_name, duplicate_number);
        self
    }

    /// Path of the file relative to the mirror root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.relative_folder).join(&self.filename)
    }

    /// Absolute destination folder under `root`
    pub fn local_folder(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_folder)
    }

    /// Absolute destination path under `root`
    pub fn local_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_path())
    }

    /// Keyset position of this record in candidate order
    pub fn cursor(&self) -> CandidateCursor {
        CandidateCursor {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Media id cannot be empty".to_string());
        }
        if self.filename.is_empty() || self.relative_folder.is_empty() {
            return Err(format!("Media {} has no local path", self.id));
        }
        if self.duplicate_number < 0 {
            return Err(format!("Media {} has a negative duplicate number", self.id));
        }
        Ok(())
    }
}

/// Year/month folder for an item created at `created_at`, e.g. `photos/2023/01`
pub fn date_folder(media_folder: &str, created_at: &DateTime<Utc>) -> String {
    format!(
        "{}/{:04}/{:02}",
        media_folder,
        created_at.year(),
        created_at.month()
    )
}

/// Insert ` (n)` before the extension when `n > 0`.
///
/// ```
/// use core_library::models::disambiguated_filename;
///
/// assert_eq!(disambiguated_filename("IMG_1.jpg", 0), "IMG_1.jpg");
/// assert_eq!(disambiguated_filename("IMG_1.jpg", 2), "IMG_1 (2).jpg");
/// assert_eq!(disambiguated_filename("README", 1), "README (1)");
/// ```
pub fn disambiguated_filename(orig_name: &str, duplicate_number: i64) -> String {
    if duplicate_number <= 0 {
        return orig_name.to_string();
    }

    match orig_name.rfind('.') {
        Some(dot) if dot > 0 => format!(
            "{} ({}){}",
            &orig_name[..dot],
            duplicate_number,
            &orig_name[dot..]
        ),
        _ => format!("{} ({})", orig_name, duplicate_number),
    }
}

/// Replace path separators and control characters that cannot appear in a
/// single filename component.
fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

// =============================================================================
// Candidate streaming
// =============================================================================

/// Which records the download phase should consider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    /// Inclusive lower creation-time bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper creation-time bound
    pub end: Option<DateTime<Utc>>,
    pub include_video: bool,
    /// Also return records already marked downloaded (retry mode)
    pub include_downloaded: bool,
}

/// Position after which the next candidate page starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

// =============================================================================
// Row mapping
// =============================================================================

/// Raw `media_items` row
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MediaRow {
    pub id: String,
    pub orig_name: String,
    pub relative_folder: String,
    pub filename: String,
    pub duplicate_number: i64,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub checksum: Option<String>,
    pub kind: String,
    pub created_at: i64,
    pub modified_at: i64,
    pub downloaded: bool,
}

impl TryFrom<MediaRow> for MediaRecord {
    type Error = LibraryError;

    fn try_from(row: MediaRow) -> Result<Self> {
        let kind = row.kind.parse::<MediaKind>()?;

        Ok(Self {
            created_at: timestamp_to_datetime(row.created_at, "created_at")?,
            modified_at: timestamp_to_datetime(row.modified_at, "modified_at")?,
            id: row.id,
            orig_name: row.orig_name,
            relative_folder: row.relative_folder,
            filename: row.filename,
            duplicate_number: row.duplicate_number,
            description: row.description,
            mime_type: row.mime_type,
            size: row.size,
            checksum: row.checksum,
            kind,
            downloaded: row.downloaded,
        })
    }
}

pub(crate) fn timestamp_to_datetime(secs: i64, field: &str) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| LibraryError::InvalidInput {
            field: field.to_string(),
            message: format!("timestamp {} out of range", secs),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, filename: &str, created: Option<DateTime<Utc>>) -> RemoteMediaItem {
        RemoteMediaItem {
            id: id.to_string(),
            filename: filename.to_string(),
            description: Some("beach".to_string()),
            mime_type: Some("image/jpeg".to_string()),
            base_url: None,
            kind: MediaKind::Photo,
            created_at: created,
            modified_at: None,
            size: Some(1024),
            checksum: None,
        }
    }

    #[test]
    fn test_from_remote_places_item_by_creation_month() {
        let created = Utc.with_ymd_and_hms(2023, 1, 3, 10, 0, 0).unwrap();
        let record = MediaRecord::from_remote(&remote("A", "IMG_1.jpg", Some(created)), "photos")
            .unwrap();

        assert_eq!(record.relative_folder, "photos/2023/01");
        assert_eq!(record.filename, "IMG_1.jpg");
        assert_eq!(record.modified_at, created);
        assert_eq!(record.size, Some(1024));
        assert!(!record.downloaded);
        assert_eq!(
            record.local_path(Path::new("/srv/mirror")),
            PathBuf::from("/srv/mirror/photos/2023/01/IMG_1.jpg")
        );
    }

    #[test]
    fn test_from_remote_rejects_malformed_descriptors() {
        assert!(MediaRecord::from_remote(&remote("A", "IMG_1.jpg", None), "photos").is_err());
        let created = Some(Utc::now());
        assert!(MediaRecord::from_remote(&remote("", "IMG_1.jpg", created), "photos").is_err());
        assert!(MediaRecord::from_remote(&remote("A", "  ", created), "photos").is_err());
    }

    #[test]
    fn test_duplicate_number_changes_filename_only() {
        let created = Utc.with_ymd_and_hms(2023, 1, 3, 10, 0, 0).unwrap();
        let record = MediaRecord::from_remote(&remote("B", "IMG_1.jpg", Some(created)), "photos")
            .unwrap()
            .with_duplicate_number(1);

        assert_eq!(record.filename, "IMG_1 (1).jpg");
        assert_eq!(record.orig_name, "IMG_1.jpg");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_disambiguated_filename_hidden_style_names() {
        assert_eq!(disambiguated_filename(".jpg", 1), ".jpg (1)");
        assert_eq!(disambiguated_filename("a.b.mp4", 3), "a.b (3).mp4");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b\\c.jpg"), "a_b_c.jpg");
        assert_eq!(sanitize_filename(" x.jpg "), "x.jpg");
    }

    #[test]
    fn test_row_conversion_rejects_unknown_kind() {
        let row = MediaRow {
            id: "A".to_string(),
            orig_name: "a.jpg".to_string(),
            relative_folder: "photos/2023/01".to_string(),
            filename: "a.jpg".to_string(),
            duplicate_number: 0,
            description: None,
            mime_type: None,
            size: None,
            checksum: None,
            kind: "album".to_string(),
            created_at: 0,
            modified_at: 0,
            downloaded: false,
        };

        assert!(MediaRecord::try_from(row).is_err());
    }
}
