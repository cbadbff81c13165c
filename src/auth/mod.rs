//! Authentication
//!
//! Credential records and where they live, plus the two authentication
//! protocols the service accepts:
//! - `apikey`: a static `Authorization: ApiKey <org>:<key>` header
//! - `sigv4`: a date-scoped HMAC-SHA512 request signature exchanged for a
//!   short-lived bearer token, cached per client

pub mod credentials;
pub mod signer;
pub mod store;
pub mod token;

pub use credentials::{AuthMethod, AuthSecret, CredentialError, CredentialResult, Credentials, StoreLocation};
pub use signer::{RequestSigner, SignedHeaders, SigningError};
pub use store::{
    CredentialSource, CredentialStore, EnvLookup, CONFIG_DIR_NAME, CREDENTIALS_FILE_NAME, ENV_API_KEY,
    ENV_ORG_ID, ENV_SIGNING_ORG, ENV_SIGNING_SECRET,
};
pub use token::{CachedToken, Clock, FixedClock, SystemClock, TokenCache, REFRESH_MARGIN};
