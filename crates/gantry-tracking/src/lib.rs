//! Tracking collaborator: the service of record for run lifecycle.
//!
//! The dispatch core talks to tracking exclusively through the
//! [`TrackingClient`] trait; [`InMemoryTracking`] is the reference
//! implementation used by tests and the demo CLI.

mod error;
pub use error::TrackingError;

mod client;
pub use client::{RunRecord, TrackingClient};

mod memory;
pub use memory::InMemoryTracking;

mod creds;
pub use creds::{CredentialProfiles, HostCreds};

mod uri;
pub use uri::{
    TrackingUriKind, classify_tracking_uri, path_to_local_file_uri, path_to_local_sqlite_uri,
};

pub mod tags;
