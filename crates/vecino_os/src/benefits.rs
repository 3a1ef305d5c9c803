#![forbid(unsafe_code)]

use tracing::info;
use vecino_engines::benefits::BenefitEngine;
use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitEligibility, BenefitId, RedemptionId};
use vecino_kernel_contracts::loyalty::LoyaltyProgress;
use vecino_kernel_contracts::merchant::SessionContext;
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use vecino_storage::store::{BenefitRecord, VecinoStore};

use crate::error::OsError;
use crate::loyalty::LoyaltyFlow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitView {
    pub benefit: BenefitRecord,
    pub eligibility: BenefitEligibility,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitsOverview {
    pub progress: LoyaltyProgress,
    pub benefits: Vec<BenefitView>,
}

#[derive(Debug, Clone)]
pub struct BenefitsFlow {
    loyalty: LoyaltyFlow,
    engine: BenefitEngine,
}

impl BenefitsFlow {
    pub fn new(loyalty: LoyaltyFlow) -> Self {
        let engine = BenefitEngine::new(loyalty.runtime().table().clone());
        Self { loyalty, engine }
    }

    /// A benefit whose `min_tier` sits above every configured tier could never
    /// unlock, so it is refused here rather than shown as locked forever.
    pub fn create_benefit(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        draft: BenefitDraft,
        now: MonotonicTimeNs,
    ) -> Result<BenefitId, OsError> {
        let min_tier = draft.min_tier;
        if self.engine.floor_for(min_tier).is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "benefit.min_tier",
                reason: "tier is not reachable with the configured tier table",
            }
            .into());
        }
        let id = store.insert_benefit(tenant_id, draft, now)?;
        info!(
            tenant = tenant_id.as_str(),
            benefit_id = id.0,
            min_tier = min_tier.as_str(),
            "benefit created"
        );
        Ok(id)
    }

    pub fn benefits_overview(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
    ) -> Result<BenefitsOverview, OsError> {
        let progress = self.loyalty.member_progress(store, ctx)?;
        let benefits = store
            .benefits(&ctx.tenant_id)
            .into_iter()
            .map(|b| BenefitView {
                eligibility: self.engine.evaluate(
                    &b.benefit,
                    store.has_redeemed(&ctx.tenant_id, b.benefit_id, ctx.merchant_id),
                    &progress,
                ),
                benefit: b.clone(),
            })
            .collect();
        Ok(BenefitsOverview { progress, benefits })
    }

    /// Re-checks eligibility at redemption time. Points are not spent.
    pub fn redeem_benefit(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        benefit_id: BenefitId,
        now: MonotonicTimeNs,
    ) -> Result<RedemptionId, OsError> {
        let progress = self.loyalty.member_progress(store, ctx)?;
        let benefit = store
            .benefit(&ctx.tenant_id, benefit_id)
            .ok_or(OsError::NotFound("benefit"))?;
        let eligibility = self.engine.evaluate(
            &benefit.benefit,
            store.has_redeemed(&ctx.tenant_id, benefit_id, ctx.merchant_id),
            &progress,
        );
        if !eligibility.is_eligible() {
            return Err(OsError::Ineligible(eligibility));
        }
        let id = store.insert_redemption(
            &ctx.tenant_id,
            benefit_id,
            ctx.merchant_id,
            progress.tier,
            progress.points,
            now,
        )?;
        info!(
            tenant = ctx.tenant_id.as_str(),
            merchant_id = ctx.merchant_id.0,
            benefit_id = benefit_id.0,
            tier = progress.tier.as_str(),
            "benefit redeemed"
        );
        Ok(id)
    }
}
