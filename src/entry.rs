use std::path::PathBuf;

/// A single item listed by an [`EntrySource`](crate::source::EntrySource).
///
/// Intentionally generic — `name` and `kind` are neutral enough to represent
/// directory entries from the real filesystem or from any custom source a
/// caller plugs in (virtual filesystems, archives, test fixtures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path to the entry.
    pub path: PathBuf,

    /// The entry's name — the final path component, matched by glob patterns.
    pub name: String,

    /// What kind of entry this is.
    pub kind: EntryKind,
}

/// The kind of a listed entry.
///
/// Symlinks are reported as [`EntryKind::Symlink`] and are never followed
/// during traversal — a link to a directory is a candidate entry, not a
/// branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Dir,

    /// A symbolic link.
    Symlink,

    /// Anything else (device files, pipes, sockets, etc.).
    Other,
}
