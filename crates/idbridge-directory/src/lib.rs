//! # Directory client
//!
//! Talks to Active Directory or a generic LDAP server over an unreliable link.
//!
//! Every operation is a [`FallbackChain`] of interchangeable strategies:
//!
//! - **authenticate**: user bind over each configured transport
//!   (LDAPS, STARTTLS, plain)
//! - **fetch_all_identities**: service-account search, then anonymous search;
//!   an unreachable directory yields an empty roster
//! - **change_secret**: policy check, bind with the old password, then write
//!   via LDAPS, STARTTLS, a privileged helper process or an HTTP change API,
//!   and finally re-authenticate with the new password
//!
//! Connection failures and timeouts move on to the next strategy; rejected
//! credentials stop the chain. Sessions are released on every exit path.

pub mod change;
pub mod client;
pub mod config;
pub mod error;
pub mod escape;
pub mod ldap;
pub mod mapping;
pub mod session;
pub mod strategy;

pub use change::{ChangeRequest, HelperProcessStrategy, HttpApiStrategy, LdapWriteStrategy};
pub use client::{Credentials, Directory, DirectoryClient};
pub use config::{DirectoryConfig, DirectoryFlavor, PasswordChangeConfig, Transport};
pub use error::{DirectoryError, DirectoryResult};
pub use ldap::LdapSessionFactory;
pub use session::{with_session, DirectorySession, RawEntry, SessionFactory};
pub use strategy::{FallThrough, FallbackChain, Strategy};
