#![forbid(unsafe_code)]

use crate::common::validate_id;
use crate::{ContractViolation, Validate};

/// Community (tenant) every merchant, post and provider belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for TenantId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("tenant_id", &self.0, 64)?;
        if self.0.chars().any(|c| c.is_ascii_whitespace()) {
            return Err(ContractViolation::InvalidValue {
                field: "tenant_id",
                reason: "must not contain whitespace",
            });
        }
        Ok(())
    }
}
