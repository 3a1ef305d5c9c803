#![forbid(unsafe_code)]

use tracing::{debug, info};
use vecino_engines::loyalty::LoyaltyRuntime;
use vecino_engines::points::{reason_code_for, PointsRules};
use vecino_kernel_contracts::loyalty::{
    LoyaltyProgress, PointsEventKind, PointsLedgerEventInput, MAX_POINTS_PER_EVENT,
};
use vecino_kernel_contracts::merchant::{MerchantId, SessionContext};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::{ContractViolation, MonotonicTimeNs};
use vecino_storage::store::{PointsAppend, VecinoStore};

use crate::error::OsError;

/// Credits points through the ledger and reads progress back from the
/// member projection.
#[derive(Debug, Clone)]
pub struct LoyaltyFlow {
    runtime: LoyaltyRuntime,
    rules: PointsRules,
}

impl LoyaltyFlow {
    pub fn new(runtime: LoyaltyRuntime, rules: PointsRules) -> Self {
        Self { runtime, rules }
    }

    pub fn mvp_v1() -> Self {
        Self::new(LoyaltyRuntime::mvp_v1(), PointsRules::mvp_v1())
    }

    pub fn runtime(&self) -> &LoyaltyRuntime {
        &self.runtime
    }

    pub fn rules(&self) -> &PointsRules {
        &self.rules
    }

    /// A store whose cached tier labels follow this flow's tier table.
    pub fn new_store(&self) -> VecinoStore {
        VecinoStore::with_tier_table(self.runtime.table().clone())
    }

    pub fn progress_of(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Result<LoyaltyProgress, OsError> {
        if store.merchant(tenant_id, merchant_id).is_none() {
            return Err(OsError::NotFound("merchant"));
        }
        Ok(self
            .runtime
            .progress(store.member_points(tenant_id, merchant_id)))
    }

    pub fn member_progress(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
    ) -> Result<LoyaltyProgress, OsError> {
        self.progress_of(store, &ctx.tenant_id, ctx.merchant_id)
    }

    /// Appends a credit. Zero-point credits are skipped and return `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn credit(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        kind: PointsEventKind,
        points: u64,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<Option<PointsAppend>, OsError> {
        if points == 0 {
            return Ok(None);
        }
        let input = PointsLedgerEventInput::v1(
            now,
            tenant_id.clone(),
            merchant_id,
            kind,
            points,
            reason_code_for(kind),
            idempotency_key,
        )?;
        let out = store.append_points_event(input)?;
        if !out.newly_applied {
            debug!(
                tenant = tenant_id.as_str(),
                merchant_id = merchant_id.0,
                kind = kind.as_str(),
                "points credit already applied"
            );
            return Ok(Some(out));
        }
        if let Some(t) = self.runtime.transition(out.balance_before, out.balance_after) {
            info!(
                tenant = tenant_id.as_str(),
                merchant_id = merchant_id.0,
                from = t.from.as_str(),
                to = t.to.as_str(),
                balance = out.balance_after,
                "member reached a new tier"
            );
        }
        Ok(Some(out))
    }

    /// Credits the rule amount for `kind` to `merchant_id`.
    pub fn award_event(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        kind: PointsEventKind,
        idempotency_key: String,
        now: MonotonicTimeNs,
    ) -> Result<u64, OsError> {
        let points = self.rules.award_for(kind);
        let out = self.credit(
            store,
            tenant_id,
            merchant_id,
            kind,
            points,
            Some(idempotency_key),
            now,
        )?;
        Ok(applied_points(out, points))
    }

    /// Operator adjustment. The key makes a retried adjustment a no-op.
    /// Unlike rule awards, an explicit zero is rejected.
    pub fn award_points(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        points: u64,
        idempotency_key: Option<String>,
        now: MonotonicTimeNs,
    ) -> Result<LoyaltyProgress, OsError> {
        if points == 0 || points > MAX_POINTS_PER_EVENT {
            return Err(ContractViolation::InvalidRange {
                field: "manual_adjustment.points",
                min: 1,
                max: MAX_POINTS_PER_EVENT,
                got: points,
            }
            .into());
        }
        if store.merchant(tenant_id, merchant_id).is_none() {
            return Err(OsError::NotFound("merchant"));
        }
        self.credit(
            store,
            tenant_id,
            merchant_id,
            PointsEventKind::ManualAdjustment,
            points,
            idempotency_key,
            now,
        )?;
        info!(
            tenant = tenant_id.as_str(),
            merchant_id = merchant_id.0,
            points,
            "manual points adjustment"
        );
        self.progress_of(store, tenant_id, merchant_id)
    }
}

/// Points actually added by an append: zero for skipped or replayed credits.
pub(crate) fn applied_points(out: Option<PointsAppend>, points: u64) -> u64 {
    match out {
        Some(a) if a.newly_applied => points,
        _ => 0,
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use vecino_kernel_contracts::merchant::{
        BusinessRelation, BusinessType, Email, MerchantId, MerchantRegistration,
    };
    use vecino_kernel_contracts::tenant::TenantId;
    use vecino_kernel_contracts::MonotonicTimeNs;
    use vecino_storage::store::VecinoStore;

    pub fn tenant() -> TenantId {
        TenantId::new("tenant_a").unwrap()
    }

    /// 2024-03-01T12:00:00Z plus `secs`.
    pub fn at(secs: u64) -> MonotonicTimeNs {
        MonotonicTimeNs((1_709_294_400 + secs) * 1_000_000_000)
    }

    pub fn registration(email: &str) -> MerchantRegistration {
        MerchantRegistration {
            full_name: "Rosa Martínez".to_string(),
            email: Email::parse(email).unwrap(),
            password: "almacen123".to_string(),
            confirm_password: "almacen123".to_string(),
            whatsapp: None,
            relation: BusinessRelation::Owner,
            business_type: BusinessType::NeighborhoodStore,
            comuna: "NUNOA".to_string(),
        }
    }

    /// Inserts a merchant directly, without the registration bonus.
    pub fn bare_merchant(store: &mut VecinoStore, email: &str) -> MerchantId {
        store
            .insert_merchant(tenant(), &registration(email), "h".to_string(), at(0))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::*;
    use super::*;
    use vecino_kernel_contracts::loyalty::TierCode;

    #[test]
    fn at_os_loyalty_01_event_awards_follow_rules_once_per_key() {
        let flow = LoyaltyFlow::mvp_v1();
        let mut store = flow.new_store();
        let m = bare_merchant(&mut store, "rosa@almacen.cl");

        let kind = PointsEventKind::PostPublished;
        let got = flow
            .award_event(&mut store, &tenant(), m, kind, "post:1".into(), at(1))
            .unwrap();
        assert_eq!(got, 10);
        let again = flow
            .award_event(&mut store, &tenant(), m, kind, "post:1".into(), at(2))
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(store.member_points(&tenant(), m), 10);
    }

    #[test]
    fn at_os_loyalty_02_manual_adjustment_moves_tier() {
        let flow = LoyaltyFlow::mvp_v1();
        let mut store = flow.new_store();
        let m = bare_merchant(&mut store, "rosa@almacen.cl");

        let p = flow
            .award_points(&mut store, &tenant(), m, 215, Some("adj:1".into()), at(1))
            .unwrap();
        assert_eq!(p.tier, TierCode::Gold);
        assert_eq!(p.points_remaining, 85);
        assert_eq!(store.member_loyalty(&tenant(), m).unwrap().tier, TierCode::Gold);

        let missing = flow.award_points(&mut store, &tenant(), MerchantId(404), 5, None, at(2));
        assert_eq!(missing, Err(OsError::NotFound("merchant")));
    }

    #[test]
    fn at_os_loyalty_03_zero_point_credit_is_skipped() {
        let flow = LoyaltyFlow::mvp_v1();
        let mut store = flow.new_store();
        let m = bare_merchant(&mut store, "rosa@almacen.cl");
        let out = flow
            .credit(&mut store, &tenant(), m, PointsEventKind::LikeReceived, 0, None, at(1))
            .unwrap();
        assert!(out.is_none());
        assert!(store.points_ledger().is_empty());
    }

    #[test]
    fn at_os_loyalty_04_manual_adjustment_of_zero_is_rejected() {
        let flow = LoyaltyFlow::mvp_v1();
        let mut store = flow.new_store();
        let m = bare_merchant(&mut store, "rosa@almacen.cl");

        let out = flow.award_points(&mut store, &tenant(), m, 0, Some("adj:0".into()), at(1));
        assert!(matches!(
            out,
            Err(OsError::Contract(ContractViolation::InvalidRange { got: 0, .. }))
        ));
        let too_many = flow.award_points(
            &mut store,
            &tenant(),
            m,
            MAX_POINTS_PER_EVENT + 1,
            None,
            at(2),
        );
        assert!(too_many.is_err());
        assert!(store.points_ledger().is_empty());
        assert_eq!(store.member_points(&tenant(), m), 0);
    }
}
