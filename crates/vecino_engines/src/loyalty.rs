#![forbid(unsafe_code)]

use vecino_kernel_contracts::loyalty::{
    LoyaltyProgress, TierCode, TierTable, TierTransition, DEFAULT_TIER_BAND_WIDTH,
};
use vecino_kernel_contracts::ContractViolation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyConfig {
    pub band_width: u64,
    pub tiers: Vec<TierCode>,
}

impl LoyaltyConfig {
    pub fn mvp_v1() -> Self {
        Self {
            band_width: DEFAULT_TIER_BAND_WIDTH,
            tiers: TierCode::all().to_vec(),
        }
    }

    pub fn with_band_width(band_width: u64) -> Self {
        Self {
            band_width,
            ..Self::mvp_v1()
        }
    }
}

/// Maps a point balance onto the tier table. Stateless; share freely.
#[derive(Debug, Clone)]
pub struct LoyaltyRuntime {
    config: LoyaltyConfig,
    table: TierTable,
}

impl LoyaltyRuntime {
    pub fn new(config: LoyaltyConfig) -> Result<Self, ContractViolation> {
        let table = TierTable::uniform(&config.tiers, config.band_width)?;
        Ok(Self { config, table })
    }

    pub fn mvp_v1() -> Self {
        Self {
            config: LoyaltyConfig::mvp_v1(),
            table: TierTable::mvp_v1(),
        }
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    pub fn table(&self) -> &TierTable {
        &self.table
    }

    pub fn tier_index_for(&self, points: u64) -> usize {
        self.table.index_for_points(points)
    }

    pub fn tier_for(&self, points: u64) -> TierCode {
        self.table.tier_for_points(points)
    }

    pub fn progress(&self, points: u64) -> LoyaltyProgress {
        let bands = self.table.bands();
        let tier_index = self.tier_index_for(points);
        let current = bands[tier_index];

        let Some(next) = bands.get(tier_index + 1) else {
            return LoyaltyProgress {
                points,
                tier_index,
                tier: current.code,
                tier_floor: current.floor,
                percent: 100,
                points_remaining: 0,
                next_tier: None,
                next_threshold: None,
            };
        };

        let band = next.floor - current.floor;
        let into_band = points - current.floor;
        // into_band < band, so the quotient is 0..=99.
        let percent = (u128::from(into_band) * 100 / u128::from(band)) as u8;

        LoyaltyProgress {
            points,
            tier_index,
            tier: current.code,
            tier_floor: current.floor,
            percent,
            points_remaining: next.floor - points,
            next_tier: Some(next.code),
            next_threshold: Some(next.floor),
        }
    }

    /// `Some` only when the balance change crosses into a higher tier.
    pub fn transition(&self, before: u64, after: u64) -> Option<TierTransition> {
        let from = self.tier_for(before);
        let to = self.tier_for(after);
        (to > from).then_some(TierTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecino_kernel_contracts::Validate;

    #[test]
    fn at_loyalty_01_zero_points_is_first_tier() {
        let rt = LoyaltyRuntime::mvp_v1();
        let p = rt.progress(0);
        assert_eq!(p.tier, TierCode::Bronze);
        assert_eq!(p.tier_index, 0);
        assert_eq!(p.percent, 0);
        assert_eq!(p.points_remaining, 100);
        assert_eq!(p.next_threshold, Some(100));
        assert_eq!(p.next_tier, Some(TierCode::Silver));
    }

    #[test]
    fn at_loyalty_02_one_below_threshold() {
        let p = LoyaltyRuntime::mvp_v1().progress(99);
        assert_eq!(p.tier, TierCode::Bronze);
        assert_eq!(p.percent, 99);
        assert_eq!(p.points_remaining, 1);
    }

    #[test]
    fn at_loyalty_03_threshold_belongs_to_higher_tier() {
        let p = LoyaltyRuntime::mvp_v1().progress(100);
        assert_eq!(p.tier, TierCode::Silver);
        assert_eq!(p.tier_index, 1);
        assert_eq!(p.percent, 0);
        assert_eq!(p.points_remaining, 100);
        assert_eq!(p.next_threshold, Some(200));
    }

    #[test]
    fn at_loyalty_04_final_tier_clamps() {
        let rt = LoyaltyRuntime::mvp_v1();
        for points in [400, 401, 499, 500, 10_000, u64::MAX] {
            let p = rt.progress(points);
            assert_eq!(p.tier, TierCode::Diamond);
            assert_eq!(p.percent, 100);
            assert_eq!(p.points_remaining, 0);
            assert_eq!(p.next_threshold, None);
            assert!(p.is_final_tier());
        }
    }

    #[test]
    fn at_loyalty_05_configurable_band_width() {
        let rt = LoyaltyRuntime::new(LoyaltyConfig::with_band_width(250)).unwrap();
        let p = rt.progress(375);
        assert_eq!(p.tier, TierCode::Silver);
        assert_eq!(p.percent, 50);
        assert_eq!(p.points_remaining, 125);
        assert!(LoyaltyRuntime::new(LoyaltyConfig::with_band_width(0)).is_err());
    }

    #[test]
    fn at_loyalty_06_transition_reports_level_ups_only() {
        let rt = LoyaltyRuntime::mvp_v1();
        assert_eq!(rt.transition(95, 99), None);
        assert_eq!(
            rt.transition(95, 105),
            Some(TierTransition {
                from: TierCode::Bronze,
                to: TierCode::Silver,
            })
        );
        assert_eq!(
            rt.transition(0, 450),
            Some(TierTransition {
                from: TierCode::Bronze,
                to: TierCode::Diamond,
            })
        );
        assert_eq!(rt.transition(450, 0), None);
    }

    #[test]
    fn at_loyalty_07_progress_records_validate() {
        let rt = LoyaltyRuntime::mvp_v1();
        for points in [0, 1, 50, 99, 100, 250, 399, 400, 9_999] {
            assert!(rt.progress(points).validate().is_ok(), "points={points}");
        }
    }
}
