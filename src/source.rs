use std::fs;
use std::io;
use std::path::Path;

use log::debug;

use crate::entry::{Entry, EntryKind};
use crate::error::ParfindError;

/// The immediate children of one directory, split by side.
///
/// Subdirectories drive recursion; which side the matcher sees is selected by
/// [`SearchTarget`](crate::matcher::SearchTarget). Symlinks and special files
/// land in `files` and are never recursed into.
#[derive(Debug, Default)]
pub struct Listing {
    /// Child directories, candidates for recursion (and for directory search).
    pub dirs: Vec<Entry>,

    /// Everything else at this level.
    pub files: Vec<Entry>,
}

/// Lists a directory's immediate children.
///
/// Implement this to search something other than the local filesystem —
/// archives, virtual trees, or fixtures that simulate failures in tests.
///
/// # Thread Safety
///
/// `Send + Sync` are required — one source instance is shared by every
/// concurrently walking branch.
///
/// # Error Handling
///
/// Return transient errors ([`ParfindError::AccessDenied`],
/// [`ParfindError::PathTooLong`], [`ParfindError::NotFound`],
/// [`ParfindError::Io`]) as values; the walk ends the affected branch quietly
/// and keeps going elsewhere. Do not panic for unreadable directories.
///
/// # Example
///
/// ```rust,ignore
/// struct DenyingSource {
///     inner: FsEntrySource,
///     denied: PathBuf,
/// }
///
/// impl EntrySource for DenyingSource {
///     fn list_children(&self, dir: &Path) -> Result<Listing, ParfindError> {
///         if dir == self.denied {
///             return Err(ParfindError::AccessDenied(dir.to_path_buf()));
///         }
///         self.inner.list_children(dir)
///     }
/// }
/// ```
pub trait EntrySource: Send + Sync {
    /// List `dir`'s immediate children.
    fn list_children(&self, dir: &Path) -> Result<Listing, ParfindError>;
}

// ---------------------------------------------------------------------------
// FsEntrySource
// ---------------------------------------------------------------------------

/// The default [`EntrySource`] over `std::fs::read_dir`.
///
/// Entries whose type cannot be determined are skipped rather than failing
/// the level. Symlinks are not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsEntrySource;

impl EntrySource for FsEntrySource {
    fn list_children(&self, dir: &Path) -> Result<Listing, ParfindError> {
        let read = fs::read_dir(dir).map_err(|e| classify_io(dir, e))?;

        let mut listing = Listing::default();

        for entry in read {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("unreadable entry under {}: {}", dir.display(), err);
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => {
                    debug!("no file type for {}: {}", entry.path().display(), err);
                    continue;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_dir() {
                listing.dirs.push(Entry {
                    path,
                    name,
                    kind: EntryKind::Dir,
                });
            } else {
                let kind = if file_type.is_file() {
                    EntryKind::File
                } else if file_type.is_symlink() {
                    EntryKind::Symlink
                } else {
                    EntryKind::Other
                };
                listing.files.push(Entry { path, name, kind });
            }
        }

        Ok(listing)
    }
}

// ---------------------------------------------------------------------------
// Map io::Error to ParfindError
// ---------------------------------------------------------------------------

fn classify_io(path: &Path, err: io::Error) -> ParfindError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ParfindError::AccessDenied(path.to_path_buf()),
        io::ErrorKind::NotFound => ParfindError::NotFound(path.to_path_buf()),
        _ => ParfindError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    }
}
