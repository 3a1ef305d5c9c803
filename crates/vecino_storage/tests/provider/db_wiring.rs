#![forbid(unsafe_code)]

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, MerchantId, MerchantRegistration,
};
use vecino_kernel_contracts::provider::{
    ComunaId, ContactRequestDraft, ContactRequestStatus, CountryId, Coverage, ProductCategory,
    ProductDraft, PromotionDraft, ProviderCategoryId, ProviderProfileDraft, RegionId,
    SocialLinks,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::repo::ProviderRepo;
use vecino_storage::store::{
    ComunaRecord, CountryRecord, ProviderCategoryRecord, RegionRecord, StorageError, VecinoStore,
};

fn tenant() -> TenantId {
    TenantId::new("tenant_a").unwrap()
}

fn merchant(s: &mut VecinoStore, email: &str) -> MerchantId {
    let reg = MerchantRegistration {
        full_name: "Pedro Rojas".to_string(),
        email: Email::parse(email).unwrap(),
        password: "mayorista1".to_string(),
        confirm_password: "mayorista1".to_string(),
        whatsapp: None,
        relation: BusinessRelation::Owner,
        business_type: BusinessType::Minimarket,
        comuna: "SANTIAGO".to_string(),
    };
    s.insert_merchant(tenant(), &reg, "h".to_string(), MonotonicTimeNs(1))
        .unwrap()
}

fn seeded_store() -> VecinoStore {
    let mut s = VecinoStore::new_in_memory();
    s.insert_country(CountryRecord {
        country_id: CountryId(1),
        name: "Chile".to_string(),
        code: "CL".to_string(),
    })
    .unwrap();
    s.insert_region(RegionRecord {
        region_id: RegionId(13),
        country_id: CountryId(1),
        name: "Metropolitana".to_string(),
    })
    .unwrap();
    for (id, name) in [(131, "Ñuñoa"), (132, "Maipú"), (133, "La Florida")] {
        s.insert_comuna(ComunaRecord {
            comuna_id: ComunaId(id),
            region_id: RegionId(13),
            name: name.to_string(),
        })
        .unwrap();
    }
    s.insert_provider_category(ProviderCategoryRecord {
        category_id: ProviderCategoryId(1),
        name: "Abarrotes".to_string(),
        description: None,
        icon: None,
        active: true,
    })
    .unwrap();
    s
}

fn profile(categories: &[u64]) -> ProviderProfileDraft {
    ProviderProfileDraft {
        company_name: "Distribuidora Andina".to_string(),
        description: "Abarrotes al por mayor".to_string(),
        categories: categories.iter().map(|c| ProviderCategoryId(*c)).collect(),
        country: Some(CountryId(1)),
        region: Some(RegionId(13)),
        comuna: Some(ComunaId(131)),
        address: None,
        coverage: Coverage::Regional,
        phone: None,
        whatsapp: "+56912345678".to_string(),
        email: Email::parse("ventas@andina.cl").unwrap(),
        website: None,
        social: SocialLinks::default(),
        photo: None,
    }
}

fn product(name: &str, price: &str) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        description: "Saco de 25 kg".to_string(),
        reference_price: Some(Decimal::from_str(price).unwrap()),
        category: ProductCategory::Food,
        image: None,
        active: true,
        featured: false,
    }
}

#[test]
fn at_provider_db_01_geo_catalog_fk_and_ordering() {
    let mut s = seeded_store();
    let names: Vec<&str> = s
        .comunas_for_region(RegionId(13))
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["La Florida", "Maipú", "Ñuñoa"]);

    let orphan = s.insert_comuna(ComunaRecord {
        comuna_id: ComunaId(501),
        region_id: RegionId(5),
        name: "Viña del Mar".to_string(),
    });
    assert!(matches!(orphan, Err(StorageError::ForeignKeyViolation { .. })));
}

#[test]
fn at_provider_db_02_one_profile_per_merchant_with_checked_refs() {
    let mut s = seeded_store();
    let m = merchant(&mut s, "pedro@andina.cl");

    let bad = s.insert_provider_row(&tenant(), m, profile(&[9]), MonotonicTimeNs(5));
    assert!(matches!(bad, Err(StorageError::ForeignKeyViolation { .. })));

    let p = s
        .insert_provider_row(&tenant(), m, profile(&[1]), MonotonicTimeNs(5))
        .unwrap();
    let dup = s.insert_provider_row(&tenant(), m, profile(&[1]), MonotonicTimeNs(6));
    assert!(matches!(dup, Err(StorageError::DuplicateKey { .. })));

    let row = s.provider_row_for_merchant(&tenant(), m).unwrap();
    assert_eq!(row.provider_id, p);
    assert!(row.status.active);
    assert_eq!(row.settings.language, "es");
    assert_eq!(s.increment_provider_visits(&tenant(), p).unwrap(), 1);
    assert_eq!(s.increment_provider_visits(&tenant(), p).unwrap(), 2);
}

#[test]
fn at_provider_db_03_product_and_promotion_lifecycle() {
    let mut s = seeded_store();
    let m = merchant(&mut s, "pedro@andina.cl");
    let p = s
        .insert_provider(&tenant(), m, profile(&[1]), MonotonicTimeNs(5))
        .unwrap();

    let harina = s
        .insert_product_row(&tenant(), p, product("Harina", "18990.50"), MonotonicTimeNs(6))
        .unwrap();
    let azucar = s
        .insert_product_row(&tenant(), p, product("Azúcar", "23000"), MonotonicTimeNs(7))
        .unwrap();
    s.set_product_featured(&tenant(), harina, true, MonotonicTimeNs(8))
        .unwrap();
    assert!(s.product(&tenant(), harina).unwrap().product.featured);
    assert_eq!(s.product_rows(&tenant(), p).len(), 2);

    s.delete_product(&tenant(), azucar).unwrap();
    assert!(matches!(
        s.delete_product(&tenant(), azucar),
        Err(StorageError::NotFound { .. })
    ));
    assert_eq!(s.product_rows(&tenant(), p).len(), 1);

    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
    let promo = PromotionDraft {
        title: "Septiembre patrio".to_string(),
        description: "10% en abarrotes".to_string(),
        image: None,
        starts_on: d(2024, 9, 1),
        ends_on: d(2024, 9, 30),
        active: true,
    };
    s.insert_promotion_row(&tenant(), p, promo.clone(), MonotonicTimeNs(9))
        .unwrap();
    assert_eq!(s.promotion_rows(&tenant(), p).len(), 1);

    let backwards = PromotionDraft {
        ends_on: d(2024, 8, 1),
        ..promo
    };
    assert!(matches!(
        s.insert_promotion_row(&tenant(), p, backwards, MonotonicTimeNs(10)),
        Err(StorageError::ContractViolation(_))
    ));
}

#[test]
fn at_provider_db_04_contact_requests_track_provider_counters() {
    let mut s = seeded_store();
    let owner = merchant(&mut s, "pedro@andina.cl");
    let shop = merchant(&mut s, "almacen@vecino.cl");
    let p = s
        .insert_provider(&tenant(), owner, profile(&[1]), MonotonicTimeNs(5))
        .unwrap();
    let msg = ContactRequestDraft {
        message: "Hola, ¿despachan a Ñuñoa?".to_string(),
    };

    let r = s
        .insert_contact_request_row(&tenant(), p, shop, &msg, MonotonicTimeNs(6))
        .unwrap();
    assert!(matches!(
        s.insert_contact_request_row(&tenant(), p, shop, &msg, MonotonicTimeNs(7)),
        Err(StorageError::DuplicateKey { .. })
    ));
    assert_eq!(s.provider(&tenant(), p).unwrap().contacts_sent, 1);

    let accepted = ContactRequestStatus::Accepted;
    s.set_contact_request_status_row(&tenant(), r, accepted, MonotonicTimeNs(8))
        .unwrap();
    // Accepting twice counts once.
    s.set_contact_request_status_row(&tenant(), r, accepted, MonotonicTimeNs(9))
        .unwrap();
    let provider = s.provider(&tenant(), p).unwrap();
    assert_eq!(provider.contacts_accepted, 1);

    // Once resolved, a new request may be opened.
    s.insert_contact_request_row(&tenant(), p, shop, &msg, MonotonicTimeNs(10))
        .unwrap();
    let inbox = s.contact_request_rows_for_recipient(&tenant(), shop);
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].status, ContactRequestStatus::Pending);
    assert_eq!(inbox[1].responded_at, Some(MonotonicTimeNs(9)));
}
