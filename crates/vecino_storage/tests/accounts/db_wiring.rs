#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, Interest, MerchantId, MerchantRegistration,
    ProfileUpdate, SessionToken, DEFAULT_BUSINESS_NAME,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::repo::MerchantRepo;
use vecino_storage::store::{StorageError, VecinoStore};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

fn registration(email: &str) -> MerchantRegistration {
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

#[test]
fn at_accounts_db_01_email_unique_per_tenant() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let b = tenant("tenant_b");

    let m = s
        .insert_merchant_row(
            a.clone(),
            &registration("rosa@almacen.cl"),
            "h".to_string(),
            MonotonicTimeNs(1),
        )
        .unwrap();
    let dup = s.insert_merchant_row(
        a.clone(),
        &registration("ROSA@almacen.cl"),
        "h".to_string(),
        MonotonicTimeNs(2),
    );
    assert!(matches!(dup, Err(StorageError::DuplicateKey { .. })));

    // Same address in another tenant is a different account.
    s.insert_merchant_row(
        b.clone(),
        &registration("rosa@almacen.cl"),
        "h".to_string(),
        MonotonicTimeNs(3),
    )
    .unwrap();

    let row = s
        .merchant_row_by_email(&a, &Email::parse("rosa@almacen.cl").unwrap())
        .unwrap();
    assert_eq!(row.merchant_id, m);
    assert_eq!(row.business_name, DEFAULT_BUSINESS_NAME);
    assert!(row.interests.is_empty());
}

#[test]
fn at_accounts_db_02_new_merchant_starts_with_zero_loyalty() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let m = s
        .insert_merchant(
            a.clone(),
            &registration("pan@espiga.cl"),
            "h".to_string(),
            MonotonicTimeNs(5),
        )
        .unwrap();
    let row = s.member_loyalty(&a, m).unwrap();
    assert_eq!(row.points_balance, 0);
    assert_eq!(row.last_event_id, None);
    assert_eq!(s.member_points(&a, m), 0);
}

#[test]
fn at_accounts_db_03_profile_update_is_partial() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let m = s
        .insert_merchant(
            a.clone(),
            &registration("kiosco@plaza.cl"),
            "h".to_string(),
            MonotonicTimeNs(5),
        )
        .unwrap();

    let interests: BTreeSet<Interest> = Interest::parse_list("MARKETING,FINANZAS").unwrap();
    s.update_merchant_profile_row(
        &a,
        m,
        &ProfileUpdate {
            business_name: Some("Kiosco La Plaza".to_string()),
            interests: Some(interests.clone()),
            profile_picture: None,
        },
    )
    .unwrap();
    s.update_merchant_profile_row(
        &a,
        m,
        &ProfileUpdate {
            business_name: None,
            interests: None,
            profile_picture: Some("profile_pics/kiosco.png".to_string()),
        },
    )
    .unwrap();

    let row = s.merchant_row(&a, m).unwrap();
    assert_eq!(row.business_name, "Kiosco La Plaza");
    assert_eq!(row.interests, interests);
    assert_eq!(row.profile_picture.as_deref(), Some("profile_pics/kiosco.png"));

    let missing = s.update_merchant_profile(
        &a,
        MerchantId(99),
        &ProfileUpdate {
            business_name: None,
            interests: None,
            profile_picture: None,
        },
    );
    assert!(matches!(missing, Err(StorageError::NotFound { .. })));
}

#[test]
fn at_accounts_db_04_sessions_resolve_and_revoke() {
    let mut s = VecinoStore::new_in_memory();
    let a = tenant("tenant_a");
    let m = s
        .insert_merchant(
            a.clone(),
            &registration("feria@lo-valledor.cl"),
            "h".to_string(),
            MonotonicTimeNs(5),
        )
        .unwrap();
    let token = SessionToken::new("tok_0123456789abcdef_feria").unwrap();

    s.insert_session_row(&token, &a, m, MonotonicTimeNs(6)).unwrap();
    assert!(matches!(
        s.insert_session_row(&token, &a, m, MonotonicTimeNs(7)),
        Err(StorageError::DuplicateKey { .. })
    ));
    let row = s.session_row(&token).unwrap();
    assert_eq!(row.merchant_id, m);
    assert_eq!(row.tenant_id, a);

    assert!(s.remove_session_row(&token));
    assert!(s.session_row(&token).is_none());
    assert!(!s.remove_session_row(&token));
}

#[test]
fn at_accounts_db_05_session_requires_existing_merchant() {
    let mut s = VecinoStore::new_in_memory();
    let token = SessionToken::new("tok_0123456789abcdef_ghost").unwrap();
    let out = s.insert_session(
        &token,
        &tenant("tenant_a"),
        MerchantId(1),
        MonotonicTimeNs(1),
    );
    assert!(matches!(out, Err(StorageError::ForeignKeyViolation { .. })));
}
