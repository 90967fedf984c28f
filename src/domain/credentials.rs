//! Exchange Credentials
//!
//! API key, secret and passphrase stored in the configuration document.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange API credentials
///
/// All three fields are always present on disk, possibly empty.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
}

impl Credentials {
    pub fn new(
        key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            passphrase: passphrase.into(),
        }
    }

    /// True iff key, secret and passphrase are all non-empty
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty() && !self.passphrase.is_empty()
    }

    /// True iff every field is empty (fresh or cleared state)
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.secret.is_empty() && self.passphrase.is_empty()
    }
}

// Secrets never reach the log sink or tracing output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &mask(&self.key))
            .field("secret", &mask(&self.secret))
            .field("passphrase", &mask(&self.passphrase))
            .finish()
    }
}

fn mask(value: &str) -> &'static str {
    if value.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
