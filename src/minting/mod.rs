//! Proof-of-Energy mint gating.

pub mod validator;

pub use validator::{MintConfig, MintDecision, MintFactor, MintInput, MintValidator};
