//! Connection credentials.

use serde::Deserialize;
use std::fmt;

/// Where and as whom to connect.
///
/// Drivers interpret the fields as they need: the SQLite driver only reads
/// `database`, which is a file path or `:memory:`.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    /// Server host name.
    #[serde(default)]
    pub host: String,
    /// Database name or path.
    pub database: String,
    /// User name.
    #[serde(default)]
    pub user: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Creates credentials for a networked database.
    pub fn new(
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Creates credentials for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
