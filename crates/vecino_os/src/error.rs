#![forbid(unsafe_code)]

use thiserror::Error;
use vecino_kernel_contracts::benefit::BenefitEligibility;
use vecino_kernel_contracts::ContractViolation;
use vecino_storage::store::StorageError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OsError {
    #[error(transparent)]
    Contract(#[from] ContractViolation),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("missing or expired session")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("benefit not redeemable: {}", .0.as_str())]
    Ineligible(BenefitEligibility),
}
