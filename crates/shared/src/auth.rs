//! Service authentication claims.
//!
//! Collaborators (chat gateway, game and shop modules, operators) call the
//! API with a signed service token; end users authenticate with their PIN
//! through the account store instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JWT claims carried by a service token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceClaims {
    /// Subject (calling service name).
    pub sub: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl ServiceClaims {
    /// Creates new claims for a service.
    #[must_use]
    pub fn new(service: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: service.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the calling service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.sub
    }
}
