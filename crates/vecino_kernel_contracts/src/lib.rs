#![forbid(unsafe_code)]

pub mod benefit;
pub mod common;
pub mod forum;
pub mod loyalty;
pub mod merchant;
pub mod provider;
pub mod tenant;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
