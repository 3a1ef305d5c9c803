#![forbid(unsafe_code)]

pub mod config;
pub mod dto;
pub mod error;
pub mod http;
pub mod journal;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use vecino_engines::loyalty::{LoyaltyConfig, LoyaltyRuntime};
use vecino_kernel_contracts::benefit::BenefitId;
use vecino_kernel_contracts::forum::PostId;
use vecino_kernel_contracts::merchant::{MerchantId, SessionContext, SessionToken};
use vecino_kernel_contracts::provider::{ContactRequestId, ProductId, PromotionId, ProviderId};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_os::{OsError, VecinoOs, VecinoOsConfig};
use vecino_storage::store::VecinoStore;

pub use config::AdapterConfig;
pub use error::AdapterError;
pub use http::router;

use dto::{
    ContactStatusResponse, FeaturedResponse, IdResponse, LikeResponse, LoginRequest,
    MeResponse, PanelProfileResponse, ProductDto, ProgressResponse, PromotionDto, ProviderDto,
    ProviderDetailResponse, PublishedResponse, RegisterRequest, RegisteredResponse,
    SessionResponse,
};
use journal::{Access, Journal, JournalCommand, JournalEntry};

/// Who is calling. Operator status is granted by the HTTP layer after it
/// checks the operator token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Session(String),
    Operator,
}

#[derive(Debug)]
pub struct AdapterRuntime {
    os: VecinoOs,
    store: Arc<Mutex<VecinoStore>>,
    journal: Option<Journal>,
    operator_token: Option<String>,
    replayed_entries: usize,
}

impl AdapterRuntime {
    pub fn new(os: VecinoOs) -> Self {
        let store = Arc::new(Mutex::new(os.new_store()));
        Self {
            os,
            store,
            journal: None,
            operator_token: None,
            replayed_entries: 0,
        }
    }

    /// Opens (or creates) the journal and replays it before serving.
    pub fn new_with_persistence(os: VecinoOs, journal_path: PathBuf) -> Result<Self, AdapterError> {
        let mut runtime = Self::new(os);
        runtime.journal = Some(Journal::open(journal_path)?);
        runtime.replayed_entries = runtime.replay_journal_into_store()?;
        Ok(runtime)
    }

    pub fn with_operator_token(mut self, token: Option<String>) -> Self {
        self.operator_token = token;
        self
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, AdapterError> {
        let loyalty = LoyaltyRuntime::new(LoyaltyConfig::with_band_width(config.tier_band_width))?;
        let os = VecinoOs::new(VecinoOsConfig {
            loyalty,
            directory_page_size: config.directory_page_size,
            ..VecinoOsConfig::mvp_v1()
        });
        let runtime = if config.journal_enabled {
            Self::new_with_persistence(os, config.store_path.clone())?
        } else {
            Self::new(os)
        };
        Ok(runtime.with_operator_token(config.operator_token.clone()))
    }

    pub fn default_from_env() -> Result<Self, AdapterError> {
        Self::from_config(&AdapterConfig::from_env())
    }

    pub fn os(&self) -> &VecinoOs {
        &self.os
    }

    pub fn journal_enabled(&self) -> bool {
        self.journal.is_some()
    }

    pub fn replayed_entries(&self) -> usize {
        self.replayed_entries
    }

    pub fn is_operator(&self, presented: Option<&str>) -> bool {
        match (self.operator_token.as_deref(), presented) {
            (Some(expected), Some(presented)) => expected == presented.trim(),
            _ => false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VecinoStore>, AdapterError> {
        self.store.lock().map_err(|_| AdapterError::LockPoisoned)
    }

    fn resolve_session(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        token: &str,
    ) -> Result<SessionContext, AdapterError> {
        let token = SessionToken::new(token.trim()).map_err(|_| OsError::Unauthorized)?;
        Ok(self.os.account.resolve_session(store, tenant_id, &token)?)
    }

    fn authorize(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        actor: &Actor,
        access: Access,
    ) -> Result<Option<MerchantId>, AdapterError> {
        match (access, actor) {
            (Access::Public, _) => Ok(None),
            (Access::Merchant, Actor::Session(token)) => {
                Ok(Some(self.resolve_session(store, tenant_id, token)?.merchant_id))
            }
            (Access::Merchant, _) => Err(OsError::Unauthorized.into()),
            (Access::Operator, Actor::Operator) => Ok(None),
            (Access::Operator, _) => Err(AdapterError::OperatorOnly),
        }
    }

    /// Runs a mutating command and journals it once it succeeded. The store
    /// lock is held across both so journal order matches store order.
    pub fn execute(
        &self,
        tenant: &str,
        actor: &Actor,
        command: JournalCommand,
    ) -> Result<Value, AdapterError> {
        let tenant_id = TenantId::new(tenant)?;
        let now = MonotonicTimeNs(system_time_now_ns());
        let mut store = self.lock()?;
        let merchant_id = self.authorize(&store, &tenant_id, actor, command.access())?;
        let value = apply_command(&self.os, &mut store, &tenant_id, merchant_id, now, &command)?;
        debug!(
            tenant = tenant_id.as_str(),
            command = command.name(),
            "command applied"
        );
        self.append_journal_entry(JournalEntry::v1(&tenant_id, merchant_id, now, command))?;
        Ok(value)
    }

    /// Hashes outside the store lock; the journal keeps the hash, never the
    /// password.
    pub fn register(&self, tenant: &str, request: RegisterRequest) -> Result<Value, AdapterError> {
        let registration = request.to_registration()?;
        let password_hash = self.os.account.hash_registration_password(&registration)?;
        self.execute(
            tenant,
            &Actor::Anonymous,
            JournalCommand::RegisterMerchant {
                registration: request.without_passwords(),
                password_hash,
            },
        )
    }

    /// Sessions live in memory only; the journal records the login itself so
    /// the last-connection stamp and daily bonus survive a restart.
    pub fn login(
        &self,
        tenant: &str,
        request: &LoginRequest,
    ) -> Result<SessionResponse, AdapterError> {
        let tenant_id = TenantId::new(tenant)?;
        let now = MonotonicTimeNs(system_time_now_ns());
        let mut store = self.lock()?;
        let outcome =
            self.os
                .account
                .login(&mut store, &tenant_id, &request.email, &request.password, now)?;
        let merchant_id = outcome.context.merchant_id;
        self.append_journal_entry(JournalEntry::v1(
            &tenant_id,
            Some(merchant_id),
            now,
            JournalCommand::RecordLogin,
        ))?;
        let token = outcome
            .context
            .session_token
            .ok_or(OsError::Unauthorized)?;
        Ok(SessionResponse {
            token: token.as_str().to_string(),
            merchant_id: merchant_id.0,
            daily_bonus: outcome.daily_bonus,
        })
    }

    pub fn logout(&self, tenant: &str, token: &str) -> Result<(), AdapterError> {
        let tenant_id = TenantId::new(tenant)?;
        let mut store = self.lock()?;
        let ctx = self.resolve_session(&store, &tenant_id, token)?;
        self.os.account.logout(&mut store, &ctx)?;
        Ok(())
    }

    /// Read-only access. A presented session token must be valid; anonymous
    /// callers get `None`.
    pub fn read<T, F>(&self, tenant: &str, actor: &Actor, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce(
            &VecinoOs,
            &VecinoStore,
            &TenantId,
            Option<&SessionContext>,
        ) -> Result<T, AdapterError>,
    {
        let tenant_id = TenantId::new(tenant)?;
        let store = self.lock()?;
        let ctx = match actor {
            Actor::Session(token) => Some(self.resolve_session(&store, &tenant_id, token)?),
            Actor::Anonymous | Actor::Operator => None,
        };
        f(&self.os, &store, &tenant_id, ctx.as_ref())
    }

    /// Global reference data (geo catalog, provider categories).
    pub fn read_catalog<T, F>(&self, f: F) -> Result<T, AdapterError>
    where
        F: FnOnce(&VecinoOs, &VecinoStore) -> Result<T, AdapterError>,
    {
        let store = self.lock()?;
        f(&self.os, &store)
    }

    fn replay_journal_into_store(&self) -> Result<usize, AdapterError> {
        let Some(journal) = self.journal.as_ref() else {
            return Ok(0);
        };
        let entries = journal.read_entries()?;
        let mut store = self.lock()?;
        for (line_no, entry) in &entries {
            let tenant_id = TenantId::new(entry.tenant_id.clone()).map_err(|err| {
                AdapterError::Journal(format!("journal replay failed at line {line_no}: {err}"))
            })?;
            apply_command(
                &self.os,
                &mut store,
                &tenant_id,
                entry.merchant_id.map(MerchantId),
                MonotonicTimeNs(entry.now_ns),
                &entry.command,
            )
            .map_err(|err| {
                AdapterError::Journal(format!("journal replay failed at line {line_no}: {err}"))
            })?;
        }
        info!(
            path = %journal.path().display(),
            entries = entries.len(),
            "journal replayed"
        );
        Ok(entries.len())
    }

    fn append_journal_entry(&self, entry: JournalEntry) -> Result<(), AdapterError> {
        match self.journal.as_ref() {
            Some(journal) => journal.append(&entry),
            None => Ok(()),
        }
    }
}

pub fn signed_in(ctx: Option<&SessionContext>) -> Result<&SessionContext, AdapterError> {
    ctx.ok_or(AdapterError::Os(OsError::Unauthorized))
}

fn encode<T: Serialize>(value: T) -> Result<Value, AdapterError> {
    serde_json::to_value(value).map_err(|err| AdapterError::Encode(err.to_string()))
}

fn system_time_now_ns() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|ns| u64::try_from(ns).ok())
        .unwrap_or(0)
        .max(1)
}

/// Shared by live requests and journal replay, so both take the same path
/// through the flows.
fn apply_command(
    os: &VecinoOs,
    store: &mut VecinoStore,
    tenant_id: &TenantId,
    merchant_id: Option<MerchantId>,
    now: MonotonicTimeNs,
    command: &JournalCommand,
) -> Result<Value, AdapterError> {
    let session = || -> Result<SessionContext, AdapterError> {
        let merchant_id = merchant_id.ok_or(OsError::Unauthorized)?;
        Ok(SessionContext::new(tenant_id.clone(), merchant_id)?)
    };
    let panel_profile = |store: &VecinoStore, ctx: &SessionContext| -> Result<Value, AdapterError> {
        let provider = os.panel.my_provider(store, ctx)?;
        encode(PanelProfileResponse {
            provider: provider.into(),
            settings: (&provider.settings).into(),
        })
    };

    match command {
        JournalCommand::RegisterMerchant {
            registration,
            password_hash,
        } => {
            let registration = registration.to_registration()?;
            let registered = os.account.register_hashed(
                store,
                tenant_id,
                &registration,
                password_hash.clone(),
                now,
            )?;
            encode(RegisteredResponse {
                merchant_id: registered.merchant_id.0,
                points_awarded: registered.points_awarded,
            })
        }
        JournalCommand::RecordLogin => {
            let ctx = session()?;
            let daily_bonus = os.account.record_login(store, tenant_id, ctx.merchant_id, now)?;
            Ok(json!({ "daily_bonus": daily_bonus }))
        }
        JournalCommand::UpdateProfile { body } => {
            let ctx = session()?;
            let profile = os.account.update_profile(store, &ctx, &body.to_update()?)?;
            encode(MeResponse::from(profile))
        }
        JournalCommand::PublishPost { body } => {
            let ctx = session()?;
            let published = os.forum.publish_post(store, &ctx, &body.to_draft()?, now)?;
            encode(PublishedResponse {
                id: published.id.0,
                points_awarded: published.points_awarded,
            })
        }
        JournalCommand::AddComment { post_id, body } => {
            let ctx = session()?;
            let published =
                os.forum
                    .add_comment(store, &ctx, PostId(*post_id), &body.to_draft(), now)?;
            encode(PublishedResponse {
                id: published.id.0,
                points_awarded: published.points_awarded,
            })
        }
        JournalCommand::ToggleLike { post_id } => {
            let ctx = session()?;
            let toggle = os.forum.toggle_like(store, &ctx, PostId(*post_id), now)?;
            encode(LikeResponse {
                liked: toggle.liked,
                like_count: toggle.like_count,
                points_awarded: toggle.points_awarded,
            })
        }
        JournalCommand::CreateBenefit { body } => {
            let id = os
                .benefits
                .create_benefit(store, tenant_id, body.to_draft()?, now)?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::RedeemBenefit { benefit_id } => {
            let ctx = session()?;
            let id = os
                .benefits
                .redeem_benefit(store, &ctx, BenefitId(*benefit_id), now)?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::AdjustPoints { body } => {
            let progress = os.loyalty.award_points(
                store,
                tenant_id,
                MerchantId(body.merchant_id),
                body.points,
                body.idempotency_key.clone(),
                now,
            )?;
            encode(ProgressResponse::from(progress))
        }
        JournalCommand::CreateProviderProfile { body } => {
            let ctx = session()?;
            let id = os
                .panel
                .create_provider_profile(store, &ctx, body.to_draft()?, now)?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::UpdateProviderProfile { body } => {
            let ctx = session()?;
            os.panel
                .update_provider_profile(store, &ctx, body.to_draft()?, now)?;
            panel_profile(&*store, &ctx)
        }
        JournalCommand::UpdateProviderSettings { body } => {
            let ctx = session()?;
            let current = os.panel.my_provider(store, &ctx)?.settings.clone();
            os.panel
                .update_provider_settings(store, &ctx, body.apply_to(current), now)?;
            panel_profile(&*store, &ctx)
        }
        JournalCommand::CreateProduct { body } => {
            let ctx = session()?;
            let id = os.panel.create_product(store, &ctx, body.to_draft()?, now)?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::UpdateProduct { product_id, body } => {
            let ctx = session()?;
            let product_id = ProductId(*product_id);
            os.panel
                .update_product(store, &ctx, product_id, body.to_draft()?, now)?;
            let product = store
                .product(tenant_id, product_id)
                .cloned()
                .ok_or(OsError::NotFound("product"))?;
            encode(ProductDto::from(product))
        }
        JournalCommand::DeleteProduct { product_id } => {
            let ctx = session()?;
            os.panel.delete_product(store, &ctx, ProductId(*product_id))?;
            Ok(json!({ "deleted": true }))
        }
        JournalCommand::ToggleProductFeatured { product_id } => {
            let ctx = session()?;
            let featured =
                os.panel
                    .toggle_product_featured(store, &ctx, ProductId(*product_id), now)?;
            encode(FeaturedResponse { featured })
        }
        JournalCommand::CreatePromotion { body } => {
            let ctx = session()?;
            let id = os.panel.create_promotion(store, &ctx, body.to_draft()?, now)?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::UpdatePromotion { promotion_id, body } => {
            let ctx = session()?;
            let promotion_id = PromotionId(*promotion_id);
            os.panel
                .update_promotion(store, &ctx, promotion_id, body.to_draft()?)?;
            let promotion = store
                .promotion(tenant_id, promotion_id)
                .cloned()
                .ok_or(OsError::NotFound("promotion"))?;
            encode(PromotionDto::from(promotion))
        }
        JournalCommand::DeletePromotion { promotion_id } => {
            let ctx = session()?;
            os.panel
                .delete_promotion(store, &ctx, PromotionId(*promotion_id))?;
            Ok(json!({ "deleted": true }))
        }
        JournalCommand::SendContactRequest { body } => {
            let ctx = session()?;
            let id = os.panel.send_contact_request(
                store,
                &ctx,
                MerchantId(body.recipient_id),
                &body.to_draft(),
                now,
            )?;
            encode(IdResponse { id: id.0 })
        }
        JournalCommand::RespondContactRequest { request_id, accept } => {
            let ctx = session()?;
            let status = os.panel.respond_contact_request(
                store,
                &ctx,
                ContactRequestId(*request_id),
                *accept,
                now,
            )?;
            encode(ContactStatusResponse {
                status: status.as_str(),
            })
        }
        JournalCommand::CancelContactRequest { request_id } => {
            let ctx = session()?;
            os.panel
                .cancel_contact_request(store, &ctx, ContactRequestId(*request_id), now)?;
            let status = store
                .contact_request(tenant_id, ContactRequestId(*request_id))
                .map(|r| r.status.as_str())
                .ok_or(OsError::NotFound("contact request"))?;
            encode(ContactStatusResponse { status })
        }
        JournalCommand::VisitProvider { provider_id } => {
            let detail = os.directory.provider_detail(
                store,
                tenant_id,
                ProviderId(*provider_id),
                now.utc_date(),
            )?;
            encode(ProviderDetailResponse::from(detail))
        }
        JournalCommand::AddCountry { body } => {
            store.insert_country(body.to_record())?;
            Ok(json!({ "id": body.country_id }))
        }
        JournalCommand::AddRegion { body } => {
            store.insert_region(body.to_record())?;
            Ok(json!({ "id": body.region_id }))
        }
        JournalCommand::AddComuna { body } => {
            store.insert_comuna(body.to_record())?;
            Ok(json!({ "id": body.comuna_id }))
        }
        JournalCommand::AddProviderCategory { body } => {
            store.insert_provider_category(body.to_record())?;
            Ok(json!({ "id": body.category_id }))
        }
        JournalCommand::SetProviderStatus { provider_id, body } => {
            let provider_id = ProviderId(*provider_id);
            store.set_provider_status(tenant_id, provider_id, (*body).into(), now)?;
            let provider = store
                .provider(tenant_id, provider_id)
                .ok_or(OsError::NotFound("provider"))?;
            encode(ProviderDto::from(provider))
        }
    }
}
