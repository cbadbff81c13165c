//! Vulnerability database listing types.
//!
//! Everything else the database returns is handled as opaque JSON.

use serde::{Deserialize, Serialize};

/// A package ecosystem and the number of records held for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ecosystem {
    pub name: String,
    pub count: u64,
}

/// `GET /ecosystems` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcosystemsResponse {
    #[serde(default)]
    pub timestamp: i64,
    pub ecosystems: Vec<Ecosystem>,
}
