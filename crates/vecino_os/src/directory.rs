#![forbid(unsafe_code)]

use chrono::NaiveDate;
use tracing::debug;
use vecino_engines::directory::{
    paginate, DirectoryEntry, DirectoryQuery, PageInfo, DEFAULT_DIRECTORY_PAGE_SIZE,
    MAX_DIRECTORY_PAGE_SIZE,
};
use vecino_kernel_contracts::provider::{ProviderId, RegionId};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_storage::store::{
    ComunaRecord, ProductRecord, PromotionRecord, ProviderCategoryRecord, ProviderRecord,
    VecinoStore,
};

use crate::error::OsError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCard {
    pub provider: ProviderRecord,
    pub category_names: Vec<String>,
    pub comuna_name: Option<String>,
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPage {
    pub providers: Vec<ProviderCard>,
    pub page: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDetail {
    pub card: ProviderCard,
    /// Active products, featured first then newest.
    pub products: Vec<ProductRecord>,
    /// Current promotions, latest start first.
    pub promotions: Vec<PromotionRecord>,
}

fn card(store: &VecinoStore, provider: &ProviderRecord) -> ProviderCard {
    let profile = &provider.profile;
    ProviderCard {
        category_names: profile
            .categories
            .iter()
            .filter_map(|id| store.provider_category(*id))
            .map(|c| c.name.clone())
            .collect(),
        comuna_name: profile
            .comuna
            .and_then(|id| store.comuna(id))
            .map(|c| c.name.clone()),
        region_name: profile
            .region
            .and_then(|id| store.region(id))
            .map(|r| r.name.clone()),
        provider: provider.clone(),
    }
}

/// Public, read-mostly views over active providers.
#[derive(Debug, Clone)]
pub struct DirectoryFlow {
    page_size: usize,
}

impl Default for DirectoryFlow {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTORY_PAGE_SIZE)
    }
}

impl DirectoryFlow {
    /// Page size is clamped to 1..=100.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_DIRECTORY_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn directory_page(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        query: &DirectoryQuery,
        page: usize,
    ) -> DirectoryPage {
        let mut hits: Vec<&ProviderRecord> = store
            .providers(tenant_id)
            .into_iter()
            .filter(|p| p.status.active)
            .filter(|p| {
                query.matches(&DirectoryEntry {
                    categories: &p.profile.categories,
                    region: p.profile.region,
                    comuna: p.profile.comuna,
                    coverage: p.profile.coverage,
                    company_name: &p.profile.company_name,
                    description: &p.profile.description,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.status
                .featured
                .cmp(&a.status.featured)
                .then(b.registered_at.cmp(&a.registered_at))
                .then(b.provider_id.cmp(&a.provider_id))
        });
        let (rows, page) = paginate(hits, self.page_size, page);
        debug!(
            tenant = tenant_id.as_str(),
            page = page.number,
            total = page.total_items,
            "directory page served"
        );
        DirectoryPage {
            providers: rows.into_iter().map(|p| card(store, p)).collect(),
            page,
        }
    }

    /// Counts a visit. Inactive providers are hidden.
    pub fn provider_detail(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        today: NaiveDate,
    ) -> Result<ProviderDetail, OsError> {
        match store.provider(tenant_id, provider_id) {
            Some(p) if p.status.active => {}
            _ => return Err(OsError::NotFound("provider")),
        }
        store.increment_provider_visits(tenant_id, provider_id)?;

        let store = &*store;
        let provider = store
            .provider(tenant_id, provider_id)
            .ok_or(OsError::NotFound("provider"))?;
        let mut products: Vec<ProductRecord> = store
            .products_for_provider(tenant_id, provider_id)
            .into_iter()
            .filter(|p| p.product.active)
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            b.product
                .featured
                .cmp(&a.product.featured)
                .then(b.product_id.cmp(&a.product_id))
        });
        let mut promotions: Vec<PromotionRecord> = store
            .promotions_for_provider(tenant_id, provider_id)
            .into_iter()
            .filter(|p| p.promotion.is_current_on(today))
            .cloned()
            .collect();
        promotions.sort_by(|a, b| b.promotion.starts_on.cmp(&a.promotion.starts_on));
        Ok(ProviderDetail {
            card: card(store, provider),
            products,
            promotions,
        })
    }

    pub fn comunas_for_region(
        &self,
        store: &VecinoStore,
        region_id: RegionId,
    ) -> Result<Vec<ComunaRecord>, OsError> {
        if store.region(region_id).is_none() {
            return Err(OsError::NotFound("region"));
        }
        Ok(store
            .comunas_for_region(region_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn active_categories(&self, store: &VecinoStore) -> Vec<ProviderCategoryRecord> {
        store
            .active_provider_categories()
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::testkit::{at, bare_merchant, tenant};
    use crate::loyalty::LoyaltyFlow;
    use crate::provider::fixtures::{profile, seed_catalog};
    use vecino_kernel_contracts::provider::{ProductCategory, ProductDraft, PromotionDraft};
    use vecino_storage::store::ProviderStatusFlags;

    fn provider(
        store: &mut VecinoStore,
        email: &str,
        company: &str,
        category: u64,
        secs: u64,
    ) -> ProviderId {
        let m = bare_merchant(store, email);
        store
            .insert_provider(&tenant(), m, profile(company, category, 131), at(secs))
            .unwrap()
    }

    #[test]
    fn at_directory_os_01_featured_first_then_newest_and_inactive_hidden() {
        let mut store = LoyaltyFlow::mvp_v1().new_store();
        seed_catalog(&mut store);
        let old = provider(&mut store, "a@p.cl", "Distribuidora Antigua", 1, 1);
        let new = provider(&mut store, "b@p.cl", "Bebidas Nuevas", 2, 2);
        let star = provider(&mut store, "c@p.cl", "Panadería Estrella", 1, 0);
        let gone = provider(&mut store, "d@p.cl", "Cerrada", 1, 3);
        store
            .set_provider_status(
                &tenant(),
                star,
                ProviderStatusFlags {
                    featured: true,
                    ..ProviderStatusFlags::default()
                },
                at(4),
            )
            .unwrap();
        store
            .set_provider_status(
                &tenant(),
                gone,
                ProviderStatusFlags {
                    active: false,
                    ..ProviderStatusFlags::default()
                },
                at(4),
            )
            .unwrap();

        let flow = DirectoryFlow::new(2);
        let first = flow.directory_page(&store, &tenant(), &DirectoryQuery::default(), 1);
        let ids: Vec<ProviderId> = first.providers.iter().map(|c| c.provider.provider_id).collect();
        assert_eq!(ids, vec![star, new]);
        assert_eq!(first.page.total_items, 3);
        assert!(first.page.has_next);
        assert_eq!(first.providers[0].comuna_name.as_deref(), Some("Ñuñoa"));
        assert_eq!(first.providers[0].category_names, vec!["Abarrotes".to_string()]);

        let last = flow.directory_page(&store, &tenant(), &DirectoryQuery::default(), 99);
        assert_eq!(last.page.number, 2);
        assert_eq!(last.providers[0].provider.provider_id, old);

        let panaderia = flow.directory_page(
            &store,
            &tenant(),
            &DirectoryQuery {
                text: Some("panaderia".to_string()),
                ..DirectoryQuery::default()
            },
            1,
        );
        assert_eq!(panaderia.providers.len(), 1);
    }

    #[test]
    fn at_directory_os_02_detail_counts_visits_and_lists_public_items() {
        let mut store = LoyaltyFlow::mvp_v1().new_store();
        seed_catalog(&mut store);
        let p = provider(&mut store, "a@p.cl", "Andina", 1, 1);
        let draft = |name: &str, active: bool, featured: bool| ProductDraft {
            name: name.to_string(),
            description: "Saco de 25 kg".to_string(),
            reference_price: None,
            category: ProductCategory::Food,
            image: None,
            active,
            featured,
        };
        store.insert_product(&tenant(), p, draft("Azúcar", true, true), at(2)).unwrap();
        store.insert_product(&tenant(), p, draft("Harina", true, false), at(3)).unwrap();
        store.insert_product(&tenant(), p, draft("Oculto", false, false), at(4)).unwrap();
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        store
            .insert_promotion(
                &tenant(),
                p,
                PromotionDraft {
                    title: "Septiembre".to_string(),
                    description: "10% en compras sobre $50.000".to_string(),
                    image: None,
                    starts_on: d(2024, 9, 1),
                    ends_on: d(2024, 9, 30),
                    active: true,
                },
                at(5),
            )
            .unwrap();

        let flow = DirectoryFlow::default();
        let detail = flow
            .provider_detail(&mut store, &tenant(), p, d(2024, 9, 18))
            .unwrap();
        let names: Vec<&str> = detail.products.iter().map(|r| r.product.name.as_str()).collect();
        assert_eq!(names, vec!["Azúcar", "Harina"]);
        assert_eq!(detail.promotions.len(), 1);
        assert_eq!(detail.card.provider.visits, 1);

        let later = flow
            .provider_detail(&mut store, &tenant(), p, d(2024, 10, 2))
            .unwrap();
        assert!(later.promotions.is_empty());
        assert_eq!(later.card.provider.visits, 2);

        assert_eq!(
            flow.provider_detail(&mut store, &tenant(), ProviderId(404), d(2024, 9, 18)),
            Err(OsError::NotFound("provider"))
        );
    }

    #[test]
    fn at_directory_os_03_geo_lookups() {
        let mut store = LoyaltyFlow::mvp_v1().new_store();
        seed_catalog(&mut store);
        let flow = DirectoryFlow::default();
        let comunas = flow.comunas_for_region(&store, RegionId(13)).unwrap();
        let names: Vec<&str> = comunas.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Maipú", "Ñuñoa"]);
        assert_eq!(
            flow.comunas_for_region(&store, RegionId(99)),
            Err(OsError::NotFound("region"))
        );
        assert_eq!(flow.active_categories(&store).len(), 2);
        assert_eq!(DirectoryFlow::new(0).page_size(), 1);
    }
}
