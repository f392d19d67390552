use std::collections::HashMap;

use crate::error::TrackingError;

/// Credentials for one remote tracking host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCreds {
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Skip TLS verification when talking to `host`.
    pub insecure: bool,
}

impl HostCreds {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Named credential profiles for `profile://` tracking URIs.
///
/// Credentials are threaded through the call chain explicitly rather than
/// read from ambient process state at the point of use; the CLI decides how
/// to populate this (config file, environment, ...).
#[derive(Debug, Clone, Default)]
pub struct CredentialProfiles {
    profiles: HashMap<String, HostCreds>,
}

/// Environment-variable prefix for profile credentials:
/// `GANTRY_PROFILE_<NAME>_{HOST,USERNAME,PASSWORD,TOKEN,INSECURE}`.
const PROFILE_VAR_PREFIX: &str = "GANTRY_PROFILE_";

impl CredentialProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect profiles from environment-variable pairs.
    ///
    /// Keys follow `GANTRY_PROFILE_<NAME>_<FIELD>`; the profile name is
    /// lowercased, unrecognized fields are ignored. `INSECURE` is truthy
    /// for `1` or `true`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut profiles = Self::new();
        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(PROFILE_VAR_PREFIX) else {
                continue;
            };
            let Some((name, field)) = rest.rsplit_once('_') else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let name = name.to_lowercase();
            let creds = profiles
                .profiles
                .entry(name.clone())
                .or_insert_with(|| HostCreds::new(""));
            let value: String = value.into();
            match field {
                "HOST" => creds.host = value,
                "USERNAME" => creds.username = Some(value),
                "PASSWORD" => creds.password = Some(value),
                "TOKEN" => creds.token = Some(value),
                "INSECURE" => creds.insecure = value == "1" || value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        profiles
    }

    pub fn insert(&mut self, name: impl Into<String>, creds: HostCreds) {
        self.profiles.insert(name.into(), creds);
    }

    pub fn resolve(&self, name: &str) -> Result<&HostCreds, TrackingError> {
        self.profiles
            .get(name)
            .ok_or_else(|| TrackingError::UnknownProfile(name.to_string()))
    }
}
