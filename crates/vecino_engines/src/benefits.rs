#![forbid(unsafe_code)]

use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitEligibility};
use vecino_kernel_contracts::loyalty::{LoyaltyProgress, TierCode, TierTable};

/// Decides whether a member may redeem a benefit right now.
#[derive(Debug, Clone)]
pub struct BenefitEngine {
    table: TierTable,
}

impl BenefitEngine {
    pub fn new(table: TierTable) -> Self {
        Self { table }
    }

    /// Lowest balance that reaches `required`. Tiers missing from the table
    /// resolve to the next higher tier that is present; `None` when no band
    /// reaches `required` at all.
    pub fn floor_for(&self, required: TierCode) -> Option<u64> {
        self.table
            .bands()
            .iter()
            .find(|band| band.code >= required)
            .map(|band| band.floor)
    }

    /// Checks run in order: inactive, already redeemed, tier, points, stock.
    /// `benefit.stock` is the remaining stock.
    pub fn evaluate(
        &self,
        benefit: &BenefitDraft,
        already_redeemed: bool,
        progress: &LoyaltyProgress,
    ) -> BenefitEligibility {
        if !benefit.active {
            return BenefitEligibility::Inactive;
        }
        if already_redeemed {
            return BenefitEligibility::AlreadyRedeemed;
        }
        if progress.tier < benefit.min_tier {
            let points_missing = self
                .floor_for(benefit.min_tier)
                .map(|floor| floor.saturating_sub(progress.points))
                .unwrap_or(0);
            return BenefitEligibility::TierLocked {
                required: benefit.min_tier,
                points_missing,
            };
        }
        if let Some(min_points) = benefit.min_points {
            if progress.points < min_points {
                return BenefitEligibility::PointsLocked {
                    points_missing: min_points - progress.points,
                };
            }
        }
        if benefit.stock == Some(0) {
            return BenefitEligibility::OutOfStock;
        }
        BenefitEligibility::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::LoyaltyRuntime;

    fn benefit(min_tier: TierCode, min_points: Option<u64>, stock: Option<u32>) -> BenefitDraft {
        BenefitDraft {
            title: "Asesoría contable".to_string(),
            description: "Una sesión gratuita".to_string(),
            min_tier,
            min_points,
            stock,
            active: true,
        }
    }

    #[test]
    fn at_benefits_01_tier_lock_reports_missing_points() {
        let rt = LoyaltyRuntime::mvp_v1();
        let engine = BenefitEngine::new(rt.table().clone());
        let out = engine.evaluate(&benefit(TierCode::Gold, None, None), false, &rt.progress(130));
        assert_eq!(
            out,
            BenefitEligibility::TierLocked {
                required: TierCode::Gold,
                points_missing: 70,
            }
        );
        let out = engine.evaluate(&benefit(TierCode::Gold, None, None), false, &rt.progress(200));
        assert_eq!(out, BenefitEligibility::Eligible);
    }

    #[test]
    fn at_benefits_02_points_lock_after_tier() {
        let rt = LoyaltyRuntime::mvp_v1();
        let engine = BenefitEngine::new(rt.table().clone());
        let b = benefit(TierCode::Silver, Some(150), None);
        assert_eq!(
            engine.evaluate(&b, false, &rt.progress(120)),
            BenefitEligibility::PointsLocked { points_missing: 30 }
        );
        assert_eq!(
            engine.evaluate(&b, false, &rt.progress(150)),
            BenefitEligibility::Eligible
        );
    }

    #[test]
    fn at_benefits_03_precedence() {
        let rt = LoyaltyRuntime::mvp_v1();
        let engine = BenefitEngine::new(rt.table().clone());
        let low = rt.progress(0);

        let mut b = benefit(TierCode::Diamond, Some(1_000), Some(0));
        assert!(matches!(
            engine.evaluate(&b, false, &low),
            BenefitEligibility::TierLocked { .. }
        ));
        assert_eq!(
            engine.evaluate(&b, true, &low),
            BenefitEligibility::AlreadyRedeemed
        );
        b.active = false;
        assert_eq!(engine.evaluate(&b, true, &low), BenefitEligibility::Inactive);

        let sold_out = benefit(TierCode::Bronze, None, Some(0));
        assert_eq!(
            engine.evaluate(&sold_out, false, &low),
            BenefitEligibility::OutOfStock
        );
    }

    #[test]
    fn at_benefits_04_floor_for_partial_table() {
        let table = TierTable::uniform(&[TierCode::Bronze, TierCode::Gold], 100).unwrap();
        let engine = BenefitEngine::new(table);
        assert_eq!(engine.floor_for(TierCode::Silver), Some(100));
        assert_eq!(engine.floor_for(TierCode::Gold), Some(100));
        assert_eq!(engine.floor_for(TierCode::Platinum), None);
    }
}
