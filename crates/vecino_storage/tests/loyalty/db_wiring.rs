#![forbid(unsafe_code)]

use vecino_kernel_contracts::loyalty::{
    PointsEventKind, PointsLedgerEventInput, TierCode, TierTable,
};
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, MerchantId, MerchantRegistration,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};
use vecino_storage::repo::PointsLedgerRepo;
use vecino_storage::store::{StorageError, VecinoStore};

fn tenant() -> TenantId {
    TenantId::new("tenant_a").unwrap()
}

fn merchant(s: &mut VecinoStore, email: &str) -> MerchantId {
    let reg = MerchantRegistration {
        full_name: "Juan Pérez".to_string(),
        email: Email::parse(email).unwrap(),
        password: "botilleria9".to_string(),
        confirm_password: "botilleria9".to_string(),
        whatsapp: None,
        relation: BusinessRelation::Administrator,
        business_type: BusinessType::LiquorStore,
        comuna: "MAIPU".to_string(),
    };
    s.insert_merchant(tenant(), &reg, "h".to_string(), MonotonicTimeNs(1))
        .unwrap()
}

fn credit(t: u64, m: MerchantId, points: u64, key: Option<&str>) -> PointsLedgerEventInput {
    PointsLedgerEventInput::v1(
        MonotonicTimeNs(t),
        tenant(),
        m,
        PointsEventKind::PostPublished,
        points,
        ReasonCodeId(0x5650_0003),
        key.map(ToString::to_string),
    )
    .unwrap()
}

#[test]
fn at_loyalty_db_01_append_updates_balance_and_tier() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "juan@botilleria.cl");

    let out = s.append_points_row(credit(10, m, 95, Some("post:1"))).unwrap();
    assert!(out.newly_applied);
    assert_eq!((out.balance_before, out.balance_after), (0, 95));
    assert_eq!(s.member_loyalty_row(&tenant(), m).unwrap().tier, TierCode::Bronze);

    let out = s.append_points_row(credit(11, m, 10, Some("post:2"))).unwrap();
    assert_eq!(out.balance_after, 105);
    let row = s.member_loyalty_row(&tenant(), m).unwrap();
    assert_eq!(row.tier, TierCode::Silver);
    assert_eq!(row.last_event_id, Some(out.points_event_id));
}

#[test]
fn at_loyalty_db_02_idempotent_retry_is_a_no_op() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "juan@botilleria.cl");

    let first = s.append_points_row(credit(10, m, 20, Some("registration"))).unwrap();
    let retry = s.append_points_row(credit(12, m, 20, Some("registration"))).unwrap();
    assert_eq!(first.points_event_id, retry.points_event_id);
    assert!(!retry.newly_applied);
    assert_eq!(retry.balance_after, 20);
    assert_eq!(s.points_rows().len(), 1);

    // No key, no dedupe.
    s.append_points_row(credit(13, m, 5, None)).unwrap();
    s.append_points_row(credit(14, m, 5, None)).unwrap();
    assert_eq!(s.member_points(&tenant(), m), 30);
}

#[test]
fn at_loyalty_db_03_unknown_merchant_is_rejected() {
    let mut s = VecinoStore::new_in_memory();
    let out = s.append_points_row(credit(10, MerchantId(42), 5, None));
    assert!(matches!(out, Err(StorageError::ForeignKeyViolation { .. })));
    assert!(s.points_rows().is_empty());
}

#[test]
fn at_loyalty_db_04_ledger_is_append_only() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "juan@botilleria.cl");
    let out = s.append_points_row(credit(10, m, 5, None)).unwrap();
    assert!(matches!(
        s.attempt_overwrite_points_event(out.points_event_id),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_loyalty_db_05_rebuild_matches_incremental_projection() {
    let mut s = VecinoStore::new_in_memory();
    let a = merchant(&mut s, "a@x.cl");
    let b = merchant(&mut s, "b@x.cl");
    let idle = merchant(&mut s, "c@x.cl");
    for (i, pts) in [20u64, 5, 10, 3, 1, 150].iter().enumerate() {
        let who = if i % 2 == 0 { a } else { b };
        s.append_points_row(credit(10 + i as u64, who, *pts, None)).unwrap();
    }
    s.append_points_row(credit(30, a, 10, Some("post:9"))).unwrap();

    let before_a = s.member_loyalty_row(&tenant(), a).cloned();
    let before_b = s.member_loyalty_row(&tenant(), b).cloned();
    s.rebuild_member_loyalty_rows();
    assert_eq!(s.member_loyalty_row(&tenant(), a).cloned(), before_a);
    assert_eq!(s.member_loyalty_row(&tenant(), b).cloned(), before_b);
    assert_eq!(s.member_points(&tenant(), idle), 0);
    assert!(s.member_loyalty_row(&tenant(), idle).is_some());

    // The idempotency index survives a rebuild.
    let retry = s.append_points_row(credit(31, a, 10, Some("post:9"))).unwrap();
    assert!(!retry.newly_applied);
}

#[test]
fn at_loyalty_db_06_tier_table_swap_relabels_members() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "juan@botilleria.cl");
    s.append_points_row(credit(10, m, 260, None)).unwrap();
    assert_eq!(s.member_loyalty_row(&tenant(), m).unwrap().tier, TierCode::Gold);

    s.set_tier_table(TierTable::uniform(TierCode::all(), 250).unwrap());
    let row = s.member_loyalty_row(&tenant(), m).unwrap();
    assert_eq!(row.points_balance, 260);
    assert_eq!(row.tier, TierCode::Silver);
}
