#![forbid(unsafe_code)]

use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitId};
use vecino_kernel_contracts::loyalty::TierCode;
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, MerchantId, MerchantRegistration,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::repo::BenefitRepo;
use vecino_storage::store::{StorageError, VecinoStore};

fn tenant() -> TenantId {
    TenantId::new("tenant_a").unwrap()
}

fn merchant(s: &mut VecinoStore, email: &str) -> MerchantId {
    let reg = MerchantRegistration {
        full_name: "Lucía Fuentes".to_string(),
        email: Email::parse(email).unwrap(),
        password: "foodtruck8".to_string(),
        confirm_password: "foodtruck8".to_string(),
        whatsapp: None,
        relation: BusinessRelation::KeyEmployee,
        business_type: BusinessType::FoodTruck,
        comuna: "PROVIDENCIA".to_string(),
    };
    s.insert_merchant(tenant(), &reg, "h".to_string(), MonotonicTimeNs(1))
        .unwrap()
}

fn benefit(stock: Option<u32>) -> BenefitDraft {
    BenefitDraft {
        title: "Descuento en balanzas".to_string(),
        description: "15% con proveedor asociado".to_string(),
        min_tier: TierCode::Silver,
        min_points: None,
        stock,
        active: true,
    }
}

#[test]
fn at_benefits_db_01_redemption_is_unique_per_member() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "lucia@truck.cl");
    let b = s.insert_benefit_row(&tenant(), benefit(None), MonotonicTimeNs(2)).unwrap();

    s.insert_redemption_row(&tenant(), b, m, TierCode::Silver, 120, MonotonicTimeNs(3))
        .unwrap();
    assert!(s.redemption_exists(&tenant(), b, m));
    assert!(matches!(
        s.insert_redemption_row(&tenant(), b, m, TierCode::Silver, 120, MonotonicTimeNs(4)),
        Err(StorageError::DuplicateKey { .. })
    ));
    let rows = s.redemptions_for_merchant(&tenant(), m);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].points_at_redemption, 120);
}

#[test]
fn at_benefits_db_02_stock_is_consumed_and_exhausts() {
    let mut s = VecinoStore::new_in_memory();
    let first = merchant(&mut s, "a@truck.cl");
    let second = merchant(&mut s, "b@truck.cl");
    let b = s.insert_benefit(&tenant(), benefit(Some(1)), MonotonicTimeNs(2)).unwrap();

    s.insert_redemption(&tenant(), b, first, TierCode::Gold, 210, MonotonicTimeNs(3))
        .unwrap();
    assert_eq!(s.benefit(&tenant(), b).unwrap().benefit.stock, Some(0));

    let out = s.insert_redemption(&tenant(), b, second, TierCode::Gold, 210, MonotonicTimeNs(4));
    assert!(matches!(out, Err(StorageError::ContractViolation(_))));
    assert!(!s.has_redeemed(&tenant(), b, second));
}

#[test]
fn at_benefits_db_03_unknown_benefit_and_tenant_scoping() {
    let mut s = VecinoStore::new_in_memory();
    let m = merchant(&mut s, "lucia@truck.cl");
    assert!(matches!(
        s.insert_redemption(&tenant(), BenefitId(77), m, TierCode::Bronze, 0, MonotonicTimeNs(3)),
        Err(StorageError::ForeignKeyViolation { .. })
    ));

    s.insert_benefit(&tenant(), benefit(None), MonotonicTimeNs(2)).unwrap();
    let other = TenantId::new("tenant_b").unwrap();
    assert_eq!(s.benefit_rows(&tenant()).len(), 1);
    assert!(s.benefit_rows(&other).is_empty());

    let invalid = BenefitDraft {
        min_points: Some(0),
        ..benefit(None)
    };
    assert!(matches!(
        s.insert_benefit(&tenant(), invalid, MonotonicTimeNs(5)),
        Err(StorageError::ContractViolation(_))
    ));
}
