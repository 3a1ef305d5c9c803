#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::loyalty::TierCode;
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BenefitId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedemptionId(pub u64);

/// Reward gated by tier and, optionally, by a minimum balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitDraft {
    pub title: String,
    pub description: String,
    pub min_tier: TierCode,
    pub min_points: Option<u64>,
    /// `None` means unlimited.
    pub stock: Option<u32>,
    pub active: bool,
}

impl Validate for BenefitDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("benefit.title", &self.title, 200)?;
        validate_text("benefit.description", &self.description, 2_000)?;
        if self.min_points == Some(0) {
            return Err(ContractViolation::InvalidValue {
                field: "benefit.min_points",
                reason: "omit instead of 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BenefitEligibility {
    Eligible,
    TierLocked {
        required: TierCode,
        points_missing: u64,
    },
    PointsLocked {
        points_missing: u64,
    },
    OutOfStock,
    AlreadyRedeemed,
    Inactive,
}

impl BenefitEligibility {
    pub fn is_eligible(self) -> bool {
        self == Self::Eligible
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eligible => "ELIGIBLE",
            Self::TierLocked { .. } => "TIER_LOCKED",
            Self::PointsLocked { .. } => "POINTS_LOCKED",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::AlreadyRedeemed => "ALREADY_REDEEMED",
            Self::Inactive => "INACTIVE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_benefit_contract_01_draft_rules() {
        let mut d = BenefitDraft {
            title: "Descuento en capacitación".to_string(),
            description: "20% en el curso de marketing digital".to_string(),
            min_tier: TierCode::Silver,
            min_points: None,
            stock: Some(10),
            active: true,
        };
        assert!(d.validate().is_ok());
        d.min_points = Some(0);
        assert!(d.validate().is_err());
    }

    #[test]
    fn at_benefit_contract_02_eligibility_codes() {
        let locked = BenefitEligibility::TierLocked {
            required: TierCode::Gold,
            points_missing: 40,
        };
        assert_eq!(locked.as_str(), "TIER_LOCKED");
        assert!(!locked.is_eligible());
        assert!(BenefitEligibility::Eligible.is_eligible());
    }
}
