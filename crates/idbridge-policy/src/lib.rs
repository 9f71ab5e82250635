//! Password policy engine.
//!
//! Validates candidate passwords against a [`PasswordPolicy`], scores their
//! strength on a 0-100 scale and produces improvement tips. Used by the
//! password-change flow before any directory call is made.

pub mod engine;
pub mod policy;

pub use engine::{PasswordPolicyEngine, PolicyEvaluation, PolicyViolation, StrengthLabel};
pub use policy::{InvalidPolicy, PasswordPolicy, SPECIAL_CHARS};
