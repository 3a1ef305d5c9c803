#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_id;
use crate::merchant::MerchantId;
use crate::tenant::TenantId;
use crate::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

pub const LOYALTY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Uniform band width used when no configuration overrides it.
pub const DEFAULT_TIER_BAND_WIDTH: u64 = 100;
pub const MAX_TIER_BAND_WIDTH: u64 = 1_000_000;
/// Largest single ledger credit.
pub const MAX_POINTS_PER_EVENT: u64 = 1_000_000;

/// Loyalty level. Declaration order is rank order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TierCode {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl TierCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
            Self::Diamond => "DIAMOND",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Bronze => "Bronce",
            Self::Silver => "Plata",
            Self::Gold => "Oro",
            Self::Platinum => "Platino",
            Self::Diamond => "Diamante",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::Bronze,
            Self::Silver,
            Self::Gold,
            Self::Platinum,
            Self::Diamond,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierBand {
    pub code: TierCode,
    /// Lowest balance that belongs to this tier.
    pub floor: u64,
}

/// Ordered tier list. Floors start at 0 and strictly increase; codes strictly
/// increase in rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TierTable {
    bands: Vec<TierBand>,
}

impl TierTable {
    pub fn new(bands: Vec<TierBand>) -> Result<Self, ContractViolation> {
        let t = Self { bands };
        t.validate()?;
        Ok(t)
    }

    /// Every tier spans `band_width` points; tier `i` starts at `i * band_width`.
    pub fn uniform(codes: &[TierCode], band_width: u64) -> Result<Self, ContractViolation> {
        if band_width == 0 || band_width > MAX_TIER_BAND_WIDTH {
            return Err(ContractViolation::InvalidRange {
                field: "tier_table.band_width",
                min: 1,
                max: MAX_TIER_BAND_WIDTH,
                got: band_width,
            });
        }
        let mut bands = Vec::with_capacity(codes.len());
        for (i, code) in codes.iter().enumerate() {
            let floor = (i as u64).checked_mul(band_width).ok_or(
                ContractViolation::InvalidValue {
                    field: "tier_table.band_width",
                    reason: "tier floor overflows u64",
                },
            )?;
            bands.push(TierBand { code: *code, floor });
        }
        Self::new(bands)
    }

    pub fn mvp_v1() -> Self {
        Self {
            bands: TierCode::all()
                .iter()
                .enumerate()
                .map(|(i, code)| TierBand {
                    code: *code,
                    floor: i as u64 * DEFAULT_TIER_BAND_WIDTH,
                })
                .collect(),
        }
    }

    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }

    pub fn last_index(&self) -> usize {
        self.bands.len() - 1
    }

    pub fn band(&self, index: usize) -> Option<&TierBand> {
        self.bands.get(index)
    }

    pub fn index_of(&self, code: TierCode) -> Option<usize> {
        self.bands.iter().position(|b| b.code == code)
    }

    pub fn floor_of(&self, code: TierCode) -> Option<u64> {
        self.bands.iter().find(|b| b.code == code).map(|b| b.floor)
    }

    /// Index of the last band whose floor is <= `points`. A balance exactly on
    /// a floor belongs to that (higher) band.
    pub fn index_for_points(&self, points: u64) -> usize {
        self.bands
            .partition_point(|band| band.floor <= points)
            .saturating_sub(1)
    }

    pub fn tier_for_points(&self, points: u64) -> TierCode {
        self.bands[self.index_for_points(points)].code
    }
}

impl Validate for TierTable {
    fn validate(&self) -> Result<(), ContractViolation> {
        let Some(first) = self.bands.first() else {
            return Err(ContractViolation::InvalidValue {
                field: "tier_table.bands",
                reason: "must contain at least one tier",
            });
        };
        if first.floor != 0 {
            return Err(ContractViolation::InvalidValue {
                field: "tier_table.bands[0].floor",
                reason: "first tier must start at 0",
            });
        }
        for pair in self.bands.windows(2) {
            if pair[1].floor <= pair[0].floor {
                return Err(ContractViolation::InvalidValue {
                    field: "tier_table.bands.floor",
                    reason: "floors must strictly increase",
                });
            }
            if pair[1].code <= pair[0].code {
                return Err(ContractViolation::InvalidValue {
                    field: "tier_table.bands.code",
                    reason: "codes must strictly increase in rank",
                });
            }
        }
        Ok(())
    }
}

/// Rendered view of where a balance sits in the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoyaltyProgress {
    pub points: u64,
    pub tier_index: usize,
    pub tier: TierCode,
    pub tier_floor: u64,
    /// 0..=100, truncated. Fixed at 100 on the final tier.
    pub percent: u8,
    /// Fixed at 0 on the final tier.
    pub points_remaining: u64,
    pub next_tier: Option<TierCode>,
    /// `None` on the final tier.
    pub next_threshold: Option<u64>,
}

impl LoyaltyProgress {
    pub fn is_final_tier(&self) -> bool {
        self.next_tier.is_none()
    }
}

impl Validate for LoyaltyProgress {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.percent > 100 {
            return Err(ContractViolation::InvalidRange {
                field: "loyalty_progress.percent",
                min: 0,
                max: 100,
                got: self.percent as u64,
            });
        }
        if self.points < self.tier_floor {
            return Err(ContractViolation::InvalidValue {
                field: "loyalty_progress.tier_floor",
                reason: "must be <= points",
            });
        }
        match (self.next_tier, self.next_threshold) {
            (None, None) => {
                if self.percent != 100 || self.points_remaining != 0 {
                    return Err(ContractViolation::InvalidValue {
                        field: "loyalty_progress.percent",
                        reason: "final tier must report 100 percent and 0 remaining",
                    });
                }
            }
            (Some(_), Some(next)) => {
                if next <= self.points || next - self.points != self.points_remaining {
                    return Err(ContractViolation::InvalidValue {
                        field: "loyalty_progress.points_remaining",
                        reason: "must equal next_threshold - points",
                    });
                }
            }
            _ => {
                return Err(ContractViolation::InvalidValue {
                    field: "loyalty_progress.next_threshold",
                    reason: "next_tier and next_threshold must be both set or both empty",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierTransition {
    pub from: TierCode,
    pub to: TierCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsEventKind {
    Registration,
    DailyLogin,
    PostPublished,
    CommentAdded,
    LikeReceived,
    ManualAdjustment,
}

impl PointsEventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "REGISTRATION",
            Self::DailyLogin => "DAILY_LOGIN",
            Self::PostPublished => "POST_PUBLISHED",
            Self::CommentAdded => "COMMENT_ADDED",
            Self::LikeReceived => "LIKE_RECEIVED",
            Self::ManualAdjustment => "MANUAL_ADJUSTMENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointsEventId(pub u64);

/// Credit to a member's balance. Balances only grow, so tiers never drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsLedgerEventInput {
    pub schema_version: SchemaVersion,
    pub created_at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    pub kind: PointsEventKind,
    pub points: u64,
    pub reason_code: ReasonCodeId,
    pub idempotency_key: Option<String>,
}

impl PointsLedgerEventInput {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        created_at: MonotonicTimeNs,
        tenant_id: TenantId,
        merchant_id: MerchantId,
        kind: PointsEventKind,
        points: u64,
        reason_code: ReasonCodeId,
        idempotency_key: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: LOYALTY_CONTRACT_VERSION,
            created_at,
            tenant_id,
            merchant_id,
            kind,
            points,
            reason_code,
            idempotency_key,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for PointsLedgerEventInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != LOYALTY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "points_ledger_event_input.schema_version",
                reason: "must match LOYALTY_CONTRACT_VERSION",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "points_ledger_event_input.created_at",
                reason: "must be > 0",
            });
        }
        self.tenant_id.validate()?;
        self.merchant_id.validate()?;
        if self.points == 0 || self.points > MAX_POINTS_PER_EVENT {
            return Err(ContractViolation::InvalidRange {
                field: "points_ledger_event_input.points",
                min: 1,
                max: MAX_POINTS_PER_EVENT,
                got: self.points,
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "points_ledger_event_input.reason_code",
                reason: "must be > 0",
            });
        }
        if let Some(k) = &self.idempotency_key {
            validate_id("points_ledger_event_input.idempotency_key", k, 128)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsLedgerEvent {
    pub schema_version: SchemaVersion,
    pub points_event_id: PointsEventId,
    pub created_at: MonotonicTimeNs,
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    pub kind: PointsEventKind,
    pub points: u64,
    pub reason_code: ReasonCodeId,
    pub idempotency_key: Option<String>,
}

impl PointsLedgerEvent {
    pub fn from_input_v1(
        points_event_id: PointsEventId,
        input: PointsLedgerEventInput,
    ) -> Result<Self, ContractViolation> {
        if points_event_id.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "points_ledger_event.points_event_id",
                reason: "must be > 0",
            });
        }
        input.validate()?;
        Ok(Self {
            schema_version: LOYALTY_CONTRACT_VERSION,
            points_event_id,
            created_at: input.created_at,
            tenant_id: input.tenant_id,
            merchant_id: input.merchant_id,
            kind: input.kind,
            points: input.points,
            reason_code: input.reason_code,
            idempotency_key: input.idempotency_key,
        })
    }
}

/// Cached projection of a member's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLoyaltyRecord {
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    pub points_balance: u64,
    pub tier: TierCode,
    pub last_event_id: Option<PointsEventId>,
    pub updated_at: MonotonicTimeNs,
}
