#![forbid(unsafe_code)]

use chrono::NaiveDate;
use tracing::info;
use vecino_engines::directory::matches_text;
use vecino_kernel_contracts::merchant::{MerchantId, SessionContext};
use vecino_kernel_contracts::provider::{
    ActiveFilter, ContactRequestDraft, ContactRequestId, ContactRequestStatus, ProductCategory,
    ProductDraft, ProductId, PromotionDraft, PromotionId, PromotionValidity, ProviderId,
    ProviderProfileDraft, ProviderSettings,
};
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::store::{
    ContactRequestRecord, ProductRecord, PromotionRecord, ProviderRecord, VecinoStore,
};

use crate::error::OsError;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub active: ActiveFilter,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PromotionFilter {
    pub active: ActiveFilter,
    pub validity: PromotionValidity,
    pub text: Option<String>,
    /// Promotions starting on or after this date.
    pub starts_from: Option<NaiveDate>,
    /// Promotions ending on or before this date.
    pub ends_until: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDashboard {
    pub provider: ProviderRecord,
    pub total_products: usize,
    pub active_products: usize,
    pub current_promotions: usize,
    pub pending_contact_requests: usize,
    pub acceptance_rate: u8,
}

/// Accepted over sent, as a truncated percentage. Zero before any request.
pub fn acceptance_rate(provider: &ProviderRecord) -> u8 {
    if provider.contacts_sent == 0 {
        return 0;
    }
    let accepted = provider.contacts_accepted.min(provider.contacts_sent);
    (u128::from(accepted) * 100 / u128::from(provider.contacts_sent)) as u8
}

/// The provider panel. Every operation acts on the caller's own provider
/// profile; rows owned by another provider are `Forbidden`.
#[derive(Debug, Clone, Default)]
pub struct ProviderPanelFlow;

impl ProviderPanelFlow {
    pub fn new() -> Self {
        Self
    }

    fn own_provider_id(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
    ) -> Result<ProviderId, OsError> {
        store
            .provider_for_merchant(&ctx.tenant_id, ctx.merchant_id)
            .map(|p| p.provider_id)
            .ok_or(OsError::NotFound("provider profile"))
    }

    fn own_product(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        product_id: ProductId,
    ) -> Result<ProviderId, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        let product = store
            .product(&ctx.tenant_id, product_id)
            .ok_or(OsError::NotFound("product"))?;
        if product.provider_id != provider_id {
            return Err(OsError::Forbidden("product belongs to another provider"));
        }
        Ok(provider_id)
    }

    fn own_promotion(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        promotion_id: PromotionId,
    ) -> Result<ProviderId, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        let promotion = store
            .promotion(&ctx.tenant_id, promotion_id)
            .ok_or(OsError::NotFound("promotion"))?;
        if promotion.provider_id != provider_id {
            return Err(OsError::Forbidden("promotion belongs to another provider"));
        }
        Ok(provider_id)
    }

    pub fn create_provider_profile(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProviderId, OsError> {
        if store
            .provider_for_merchant(&ctx.tenant_id, ctx.merchant_id)
            .is_some()
        {
            return Err(OsError::Conflict("provider profile already exists"));
        }
        let id = store.insert_provider(&ctx.tenant_id, ctx.merchant_id, profile, now)?;
        info!(
            tenant = ctx.tenant_id.as_str(),
            merchant_id = ctx.merchant_id.0,
            provider_id = id.0,
            "provider profile created"
        );
        Ok(id)
    }

    pub fn my_provider<'a>(
        &self,
        store: &'a VecinoStore,
        ctx: &SessionContext,
    ) -> Result<&'a ProviderRecord, OsError> {
        store
            .provider_for_merchant(&ctx.tenant_id, ctx.merchant_id)
            .ok_or(OsError::NotFound("provider profile"))
    }

    pub fn update_provider_profile(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let id = self.own_provider_id(store, ctx)?;
        store.update_provider_profile(&ctx.tenant_id, id, profile, now)?;
        Ok(())
    }

    pub fn update_provider_settings(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        settings: ProviderSettings,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let id = self.own_provider_id(store, ctx)?;
        store.update_provider_settings(&ctx.tenant_id, id, settings, now)?;
        Ok(())
    }

    pub fn provider_dashboard(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        today: NaiveDate,
    ) -> Result<ProviderDashboard, OsError> {
        let provider = self.my_provider(store, ctx)?;
        let products = store.products_for_provider(&ctx.tenant_id, provider.provider_id);
        let current_promotions = store
            .promotions_for_provider(&ctx.tenant_id, provider.provider_id)
            .iter()
            .filter(|p| p.promotion.is_current_on(today))
            .count();
        let pending_contact_requests = store
            .contact_requests_for_provider(&ctx.tenant_id, provider.provider_id)
            .iter()
            .filter(|r| r.status.is_open())
            .count();
        Ok(ProviderDashboard {
            total_products: products.len(),
            active_products: products.iter().filter(|p| p.product.active).count(),
            current_promotions,
            pending_contact_requests,
            acceptance_rate: acceptance_rate(provider),
            provider: provider.clone(),
        })
    }

    // Products.

    pub fn create_product(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProductId, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        Ok(store.insert_product(&ctx.tenant_id, provider_id, product, now)?)
    }

    pub fn update_product(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        product_id: ProductId,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        self.own_product(store, ctx, product_id)?;
        store.update_product(&ctx.tenant_id, product_id, product, now)?;
        Ok(())
    }

    pub fn delete_product(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        product_id: ProductId,
    ) -> Result<(), OsError> {
        self.own_product(store, ctx, product_id)?;
        store.delete_product(&ctx.tenant_id, product_id)?;
        Ok(())
    }

    /// Returns the new `featured` flag.
    pub fn toggle_product_featured(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        product_id: ProductId,
        now: MonotonicTimeNs,
    ) -> Result<bool, OsError> {
        self.own_product(store, ctx, product_id)?;
        let featured = store
            .product(&ctx.tenant_id, product_id)
            .map(|p| !p.product.featured)
            .ok_or(OsError::NotFound("product"))?;
        store.set_product_featured(&ctx.tenant_id, product_id, featured, now)?;
        Ok(featured)
    }

    /// Newest first.
    pub fn list_products(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRecord>, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        let mut out: Vec<ProductRecord> = store
            .products_for_provider(&ctx.tenant_id, provider_id)
            .into_iter()
            .filter(|p| filter.category.map_or(true, |c| c == p.product.category))
            .filter(|p| filter.active.matches(p.product.active))
            .filter(|p| match &filter.text {
                Some(t) => matches_text(t, &[&p.product.name, &p.product.description]),
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.product_id.cmp(&a.product_id));
        Ok(out)
    }

    // Promotions.

    pub fn create_promotion(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        promotion: PromotionDraft,
        now: MonotonicTimeNs,
    ) -> Result<PromotionId, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        Ok(store.insert_promotion(&ctx.tenant_id, provider_id, promotion, now)?)
    }

    pub fn update_promotion(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        promotion_id: PromotionId,
        promotion: PromotionDraft,
    ) -> Result<(), OsError> {
        self.own_promotion(store, ctx, promotion_id)?;
        store.update_promotion(&ctx.tenant_id, promotion_id, promotion)?;
        Ok(())
    }

    pub fn delete_promotion(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        promotion_id: PromotionId,
    ) -> Result<(), OsError> {
        self.own_promotion(store, ctx, promotion_id)?;
        store.delete_promotion(&ctx.tenant_id, promotion_id)?;
        Ok(())
    }

    /// Latest start date first.
    pub fn list_promotions(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        filter: &PromotionFilter,
        today: NaiveDate,
    ) -> Result<Vec<PromotionRecord>, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        let mut out: Vec<PromotionRecord> = store
            .promotions_for_provider(&ctx.tenant_id, provider_id)
            .into_iter()
            .filter(|p| filter.active.matches(p.promotion.active))
            .filter(|p| filter.validity.matches(&p.promotion, today))
            .filter(|p| match &filter.text {
                Some(t) => matches_text(t, &[&p.promotion.title, &p.promotion.description]),
                None => true,
            })
            .filter(|p| filter.starts_from.map_or(true, |d| p.promotion.starts_on >= d))
            .filter(|p| filter.ends_until.map_or(true, |d| p.promotion.ends_on <= d))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.promotion
                .starts_on
                .cmp(&a.promotion.starts_on)
                .then(b.promotion_id.cmp(&a.promotion_id))
        });
        Ok(out)
    }

    // Contact requests.

    pub fn send_contact_request(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        recipient_id: MerchantId,
        draft: &ContactRequestDraft,
        now: MonotonicTimeNs,
    ) -> Result<ContactRequestId, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        if recipient_id == ctx.merchant_id {
            return Err(OsError::Forbidden("cannot contact yourself"));
        }
        if store.merchant(&ctx.tenant_id, recipient_id).is_none() {
            return Err(OsError::NotFound("merchant"));
        }
        let pending = store
            .contact_requests_for_provider(&ctx.tenant_id, provider_id)
            .iter()
            .any(|r| r.recipient_id == recipient_id && r.status.is_open());
        if pending {
            return Err(OsError::Conflict("a pending request to this merchant already exists"));
        }
        let id =
            store.insert_contact_request(&ctx.tenant_id, provider_id, recipient_id, draft, now)?;
        info!(
            tenant = ctx.tenant_id.as_str(),
            provider_id = provider_id.0,
            recipient_id = recipient_id.0,
            "contact request sent"
        );
        Ok(id)
    }

    /// The recipient accepts or rejects a pending request.
    pub fn respond_contact_request(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        request_id: ContactRequestId,
        accept: bool,
        now: MonotonicTimeNs,
    ) -> Result<ContactRequestStatus, OsError> {
        let request = store
            .contact_request(&ctx.tenant_id, request_id)
            .ok_or(OsError::NotFound("contact request"))?;
        if request.recipient_id != ctx.merchant_id {
            return Err(OsError::Forbidden("only the recipient may respond"));
        }
        if !request.status.is_open() {
            return Err(OsError::Conflict("contact request already resolved"));
        }
        let status = if accept {
            ContactRequestStatus::Accepted
        } else {
            ContactRequestStatus::Rejected
        };
        store.set_contact_request_status(&ctx.tenant_id, request_id, status, now)?;
        info!(
            tenant = ctx.tenant_id.as_str(),
            request_id = request_id.0,
            status = status.as_str(),
            "contact request answered"
        );
        Ok(status)
    }

    /// The sending provider withdraws a pending request.
    pub fn cancel_contact_request(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        request_id: ContactRequestId,
        now: MonotonicTimeNs,
    ) -> Result<(), OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        let request = store
            .contact_request(&ctx.tenant_id, request_id)
            .ok_or(OsError::NotFound("contact request"))?;
        if request.provider_id != provider_id {
            return Err(OsError::Forbidden("contact request belongs to another provider"));
        }
        if !request.status.is_open() {
            return Err(OsError::Conflict("contact request already resolved"));
        }
        store.set_contact_request_status(
            &ctx.tenant_id,
            request_id,
            ContactRequestStatus::Cancelled,
            now,
        )?;
        Ok(())
    }

    /// Requests sent by the caller's provider profile, newest first.
    pub fn list_contact_requests(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
        status: Option<ContactRequestStatus>,
    ) -> Result<Vec<ContactRequestRecord>, OsError> {
        let provider_id = self.own_provider_id(store, ctx)?;
        Ok(store
            .contact_requests_for_provider(&ctx.tenant_id, provider_id)
            .into_iter()
            .filter(|r| status.map_or(true, |s| s == r.status))
            .cloned()
            .collect())
    }

    /// Requests addressed to the caller as a merchant, newest first.
    pub fn incoming_contact_requests(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
    ) -> Vec<ContactRequestRecord> {
        store
            .contact_requests_for_recipient(&ctx.tenant_id, ctx.merchant_id)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use vecino_kernel_contracts::merchant::Email;
    use vecino_kernel_contracts::provider::{
        ComunaId, CountryId, Coverage, ProviderCategoryId, ProviderProfileDraft, RegionId,
        SocialLinks,
    };
    use vecino_storage::store::{
        ComunaRecord, CountryRecord, ProviderCategoryRecord, RegionRecord, VecinoStore,
    };

    pub fn seed_catalog(store: &mut VecinoStore) {
        store
            .insert_country(CountryRecord {
                country_id: CountryId(1),
                name: "Chile".to_string(),
                code: "CL".to_string(),
            })
            .unwrap();
        store
            .insert_region(RegionRecord {
                region_id: RegionId(13),
                country_id: CountryId(1),
                name: "Metropolitana".to_string(),
            })
            .unwrap();
        for (id, name) in [(131, "Ñuñoa"), (132, "Maipú")] {
            store
                .insert_comuna(ComunaRecord {
                    comuna_id: ComunaId(id),
                    region_id: RegionId(13),
                    name: name.to_string(),
                })
                .unwrap();
        }
        for (id, name) in [(1, "Abarrotes"), (2, "Bebidas")] {
            store
                .insert_provider_category(ProviderCategoryRecord {
                    category_id: ProviderCategoryId(id),
                    name: name.to_string(),
                    description: None,
                    icon: None,
                    active: true,
                })
                .unwrap();
        }
    }

    pub fn profile(company: &str, category: u64, comuna: u64) -> ProviderProfileDraft {
        ProviderProfileDraft {
            company_name: company.to_string(),
            description: "Despacho a almacenes de barrio".to_string(),
            categories: [ProviderCategoryId(category)].into_iter().collect(),
            country: Some(CountryId(1)),
            region: Some(RegionId(13)),
            comuna: Some(ComunaId(comuna)),
            address: None,
            coverage: Coverage::Comunal,
            phone: None,
            whatsapp: "+56987654321".to_string(),
            email: Email::parse("ventas@proveedor.cl").unwrap(),
            website: Some("https://proveedor.cl".to_string()),
            social: SocialLinks::default(),
            photo: None,
        }
    }
}
