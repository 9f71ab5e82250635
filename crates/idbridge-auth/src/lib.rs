//! # Hybrid authentication
//!
//! Login against the enterprise directory with a fallback to local secrets,
//! sync-on-login linking of ERP-backed accounts, and password changes routed
//! to wherever the account authenticates.
//!
//! - [`HybridAuthenticator`] - the login state machine
//! - [`PasswordChangeService`] - confirmation and policy checks, then a
//!   directory or local password write
//! - [`SecretHasher`] - Argon2id hashing of local secrets

pub mod authenticator;
pub mod change;
pub mod error;
pub mod hashing;

pub use authenticator::{AuthenticatedUser, HybridAuthenticator, LoginPath};
pub use change::PasswordChangeService;
pub use error::{ChangeError, HashError, LoginError, INVALID_CREDENTIALS};
pub use hashing::SecretHasher;
