use std::path::PathBuf;

use url::Url;

/// Where a tracking URI points, for container connectivity decisions.
///
/// Local stores need their host path mounted into the container with the
/// URI rewritten to the mount point; profile URIs need credentials injected
/// as environment variables instead; anything else is reachable as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingUriKind {
    /// Filesystem-backed store at the given host path.
    LocalFile(PathBuf),
    /// SQLite store whose database file lives at the given host path.
    LocalSqlite(PathBuf),
    /// Named credential profile (`profile://<name>`).
    Profile(String),
    /// Network-reachable store, usable unchanged from inside a container.
    Remote,
}

/// Classify a tracking URI.
///
/// Bare paths and `file:` URIs without a host are local; `sqlite:` URIs are
/// local database files; everything with a network location is remote.
pub fn classify_tracking_uri(uri: &str) -> TrackingUriKind {
    if let Some(name) = uri.strip_prefix("profile://") {
        return TrackingUriKind::Profile(name.to_string());
    }
    // The url crate resolves authority-less file URIs against the root,
    // turning `file:./gruns` into `/gruns`; take the path verbatim instead.
    if let Some(rest) = uri.strip_prefix("file:")
        && !rest.starts_with("//")
    {
        return TrackingUriKind::LocalFile(PathBuf::from(rest));
    }
    match Url::parse(uri) {
        // No scheme at all: a plain filesystem path.
        Err(_) => TrackingUriKind::LocalFile(PathBuf::from(uri)),
        Ok(parsed) => {
            if parsed.has_host() && parsed.host_str() != Some("") {
                return TrackingUriKind::Remote;
            }
            match parsed.scheme() {
                "file" => TrackingUriKind::LocalFile(PathBuf::from(parsed.path())),
                "sqlite" => {
                    // sqlite:///path/to/db or sqlite:path/to/db
                    let path = parsed.path().trim_start_matches("//");
                    TrackingUriKind::LocalSqlite(PathBuf::from(path))
                }
                _ => TrackingUriKind::Remote,
            }
        }
    }
}

/// `file://` URI for a local path.
pub fn path_to_local_file_uri(path: &str) -> String {
    format!("file://{path}")
}

/// `sqlite://` URI for a local database path.
pub fn path_to_local_sqlite_uri(path: &str) -> String {
    format!("sqlite://{path}")
}
