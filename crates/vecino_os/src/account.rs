#![forbid(unsafe_code)]

use std::sync::OnceLock;

use tracing::{info, warn};
use vecino_engines::credentials::{
    dummy_password_hash, hash_password, issue_session_token, verify_password, CredentialConfig,
};
use vecino_engines::points::{daily_login_key, registration_key};
use vecino_kernel_contracts::loyalty::{LoyaltyProgress, PointsEventKind};
use vecino_kernel_contracts::merchant::{
    Email, MerchantId, MerchantRegistration, ProfileUpdate, SessionContext, SessionToken,
    DEFAULT_PROFILE_PICTURE_URL,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::{MonotonicTimeNs, Validate};
use vecino_storage::store::{MerchantRecord, VecinoStore};

use crate::error::OsError;
use crate::loyalty::LoyaltyFlow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub merchant_id: MerchantId,
    pub points_awarded: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Carries the freshly issued session token.
    pub context: SessionContext,
    /// Zero when today's bonus was already credited.
    pub daily_bonus: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantProfile {
    pub merchant: MerchantRecord,
    pub profile_picture_url: String,
    pub progress: LoyaltyProgress,
}

/// Public URL for a stored profile picture path.
pub fn profile_picture_url(stored: Option<&str>) -> String {
    match stored {
        Some(path) => format!("/media/{path}"),
        None => DEFAULT_PROFILE_PICTURE_URL.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AccountFlow {
    credentials: CredentialConfig,
    loyalty: LoyaltyFlow,
    /// Stands in for the stored hash when no account matches, built lazily
    /// with the configured cost.
    dummy_hash: OnceLock<String>,
}

impl AccountFlow {
    pub fn new(credentials: CredentialConfig, loyalty: LoyaltyFlow) -> Self {
        Self {
            credentials,
            loyalty,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn register_merchant(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        registration: &MerchantRegistration,
        now: MonotonicTimeNs,
    ) -> Result<Registered, OsError> {
        let password_hash = self.hash_registration_password(registration)?;
        self.register_hashed(store, tenant_id, registration, password_hash, now)
    }

    /// Validates the whole form, passwords included, and returns the stored
    /// password hash.
    pub fn hash_registration_password(
        &self,
        registration: &MerchantRegistration,
    ) -> Result<String, OsError> {
        registration.validate()?;
        Ok(hash_password(&registration.password, self.credentials))
    }

    /// Registration with an already hashed password. The password fields of
    /// `registration` are ignored.
    pub fn register_hashed(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        registration: &MerchantRegistration,
        password_hash: String,
        now: MonotonicTimeNs,
    ) -> Result<Registered, OsError> {
        tenant_id.validate()?;
        registration.validate_identity()?;
        if store
            .merchant_by_email(tenant_id, &registration.email)
            .is_some()
        {
            return Err(OsError::Conflict("email already registered"));
        }
        let merchant_id =
            store.insert_merchant(tenant_id.clone(), registration, password_hash, now)?;
        let points_awarded = self.loyalty.award_event(
            store,
            tenant_id,
            merchant_id,
            PointsEventKind::Registration,
            registration_key(),
            now,
        )?;
        info!(
            tenant = tenant_id.as_str(),
            merchant_id = merchant_id.0,
            business_type = registration.business_type.as_str(),
            "merchant registered"
        );
        Ok(Registered {
            merchant_id,
            points_awarded,
        })
    }

    /// Unknown email and wrong password fail the same way, and both pay for
    /// one full password derivation.
    pub fn login(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        email: &str,
        password: &str,
        now: MonotonicTimeNs,
    ) -> Result<LoginOutcome, OsError> {
        let merchant = Email::parse(email)
            .ok()
            .and_then(|email| store.merchant_by_email(tenant_id, &email));
        let stored = merchant.map(|m| m.password_hash.as_str());
        let verified = self.check_password(password, stored);
        let merchant_id = match merchant {
            Some(m) if verified => m.merchant_id,
            Some(m) => {
                warn!(
                    tenant = tenant_id.as_str(),
                    merchant_id = m.merchant_id.0,
                    "login with wrong password"
                );
                return Err(OsError::InvalidCredentials);
            }
            None => {
                warn!(tenant = tenant_id.as_str(), "login for unknown email");
                return Err(OsError::InvalidCredentials);
            }
        };

        let daily_bonus = self.record_login(store, tenant_id, merchant_id, now)?;
        let token = issue_session_token()?;
        store.insert_session(&token, tenant_id, merchant_id, now)?;
        info!(
            tenant = tenant_id.as_str(),
            merchant_id = merchant_id.0,
            daily_bonus,
            "merchant logged in"
        );
        Ok(LoginOutcome {
            context: SessionContext::new(tenant_id.clone(), merchant_id)?.with_token(token),
            daily_bonus,
        })
    }

    /// Stamps the last connection and credits the daily bonus. Returns the
    /// points credited, zero after the first login of the UTC day.
    pub fn record_login(
        &self,
        store: &mut VecinoStore,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        now: MonotonicTimeNs,
    ) -> Result<u64, OsError> {
        store.record_merchant_login(tenant_id, merchant_id, now)?;
        self.loyalty.award_event(
            store,
            tenant_id,
            merchant_id,
            PointsEventKind::DailyLogin,
            daily_login_key(now),
            now,
        )
    }

    /// Always runs the verifier. Without a stored hash the dummy is checked
    /// and the answer is `false` whatever it says.
    fn check_password(&self, password: &str, stored: Option<&str>) -> bool {
        match stored {
            Some(encoded) => verify_password(password, encoded),
            None => {
                std::hint::black_box(verify_password(password, self.dummy_hash()));
                false
            }
        }
    }

    fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| dummy_password_hash(self.credentials))
    }

    pub fn logout(&self, store: &mut VecinoStore, ctx: &SessionContext) -> Result<(), OsError> {
        let token = ctx.session_token.as_ref().ok_or(OsError::Unauthorized)?;
        if !store.remove_session(token) {
            return Err(OsError::Unauthorized);
        }
        info!(
            tenant = ctx.tenant_id.as_str(),
            merchant_id = ctx.merchant_id.0,
            "merchant logged out"
        );
        Ok(())
    }

    /// A session belongs to exactly one tenant; a token presented under another
    /// tenant is rejected.
    pub fn resolve_session(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        token: &SessionToken,
    ) -> Result<SessionContext, OsError> {
        let session = store.session(token).ok_or(OsError::Unauthorized)?;
        if &session.tenant_id != tenant_id {
            return Err(OsError::Unauthorized);
        }
        Ok(SessionContext::new(session.tenant_id.clone(), session.merchant_id)?
            .with_token(token.clone()))
    }

    pub fn merchant_profile(
        &self,
        store: &VecinoStore,
        ctx: &SessionContext,
    ) -> Result<MerchantProfile, OsError> {
        let merchant = store
            .merchant(&ctx.tenant_id, ctx.merchant_id)
            .ok_or(OsError::NotFound("merchant"))?
            .clone();
        let progress = self.loyalty.member_progress(store, ctx)?;
        Ok(MerchantProfile {
            profile_picture_url: profile_picture_url(merchant.profile_picture.as_deref()),
            merchant,
            progress,
        })
    }

    pub fn update_profile(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        update: &ProfileUpdate,
    ) -> Result<MerchantProfile, OsError> {
        store.update_merchant_profile(&ctx.tenant_id, ctx.merchant_id, update)?;
        self.merchant_profile(store, ctx)
    }
}
