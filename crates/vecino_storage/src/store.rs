#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use thiserror::Error;
use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitId, RedemptionId};
use vecino_kernel_contracts::common::validate_text;
use vecino_kernel_contracts::forum::{
    CommentDraft, CommentId, PostAttachment, PostCategory, PostDraft, PostId, PostTags,
};
use vecino_kernel_contracts::loyalty::{
    MemberLoyaltyRecord, PointsEventId, PointsLedgerEvent, PointsLedgerEventInput, TierCode,
    TierTable,
};
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, Interest, MerchantId, MerchantRegistration,
    ProfileUpdate, SessionToken, WhatsApp, DEFAULT_BUSINESS_NAME,
};
use vecino_kernel_contracts::provider::{
    ComunaId, ContactRequestDraft, ContactRequestId, ContactRequestStatus, CountryId,
    ProductDraft, ProductId, PromotionDraft, PromotionId, ProviderCategoryId, ProviderId,
    ProviderProfileDraft, ProviderSettings, RegionId,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("duplicate key on {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table} is append-only")]
    AppendOnlyViolation { table: &'static str },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

fn tenant_key(tenant_id: &TenantId, id: u64) -> String {
    format!("{}/{}", tenant_id.as_str(), id)
}

/// Sessions are indexed by token digest; the raw token is never stored.
fn session_digest(token: &SessionToken) -> String {
    let digest = Sha256::digest(token.as_str().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantRecord {
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    pub full_name: String,
    pub email: Email,
    pub password_hash: String,
    pub whatsapp: Option<WhatsApp>,
    pub relation: BusinessRelation,
    pub business_type: BusinessType,
    pub comuna: String,
    pub business_name: String,
    pub interests: BTreeSet<Interest>,
    pub profile_picture: Option<String>,
    pub registered_at: MonotonicTimeNs,
    pub last_login_at: Option<MonotonicTimeNs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub tenant_id: TenantId,
    pub merchant_id: MerchantId,
    pub created_at: MonotonicTimeNs,
}

/// Result of a ledger append. A replayed idempotency key reports
/// `newly_applied == false` and an unchanged balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsAppend {
    pub points_event_id: PointsEventId,
    pub newly_applied: bool,
    pub balance_before: u64,
    pub balance_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub tenant_id: TenantId,
    pub post_id: PostId,
    pub author_id: MerchantId,
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub image_url: Option<String>,
    pub tags: PostTags,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub tenant_id: TenantId,
    pub comment_id: CommentId,
    pub post_id: PostId,
    pub author_id: MerchantId,
    pub content: String,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    pub country_id: CountryId,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub region_id: RegionId,
    pub country_id: CountryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComunaRecord {
    pub comuna_id: ComunaId,
    pub region_id: RegionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCategoryRecord {
    pub category_id: ProviderCategoryId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderStatusFlags {
    pub active: bool,
    pub verified: bool,
    pub featured: bool,
}

impl Default for ProviderStatusFlags {
    fn default() -> Self {
        Self {
            active: true,
            verified: false,
            featured: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub tenant_id: TenantId,
    pub provider_id: ProviderId,
    pub merchant_id: MerchantId,
    pub profile: ProviderProfileDraft,
    pub settings: ProviderSettings,
    pub status: ProviderStatusFlags,
    pub visits: u64,
    pub contacts_sent: u64,
    pub contacts_accepted: u64,
    pub registered_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub provider_id: ProviderId,
    pub product: ProductDraft,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRecord {
    pub tenant_id: TenantId,
    pub promotion_id: PromotionId,
    pub provider_id: ProviderId,
    pub promotion: PromotionDraft,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRequestRecord {
    pub tenant_id: TenantId,
    pub contact_request_id: ContactRequestId,
    pub provider_id: ProviderId,
    pub recipient_id: MerchantId,
    pub message: String,
    pub status: ContactRequestStatus,
    pub requested_at: MonotonicTimeNs,
    pub responded_at: Option<MonotonicTimeNs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenefitRecord {
    pub tenant_id: TenantId,
    pub benefit_id: BenefitId,
    /// `stock` here is the remaining stock.
    pub benefit: BenefitDraft,
    pub created_at: MonotonicTimeNs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRecord {
    pub tenant_id: TenantId,
    pub redemption_id: RedemptionId,
    pub benefit_id: BenefitId,
    pub merchant_id: MerchantId,
    pub tier_at_redemption: TierCode,
    pub points_at_redemption: u64,
    pub redeemed_at: MonotonicTimeNs,
}

/// Tenant-scoped in-memory store. Rows are keyed by `(TenantId, id)`; the geo
/// catalog and provider categories are shared reference data.
#[derive(Debug, Clone)]
pub struct VecinoStore {
    tier_table: TierTable,

    merchants: BTreeMap<(TenantId, MerchantId), MerchantRecord>,
    merchant_email_index: BTreeMap<(TenantId, Email), MerchantId>,
    next_merchant_id: u64,
    sessions: BTreeMap<String, SessionRecord>,

    // Append-only; (tenant, merchant, idempotency_key) -> event id.
    points_ledger: Vec<PointsLedgerEvent>,
    next_points_event_id: u64,
    points_idempotency_index: BTreeMap<(TenantId, MerchantId, String), PointsEventId>,
    // Rebuildable projection of the ledger.
    member_loyalty: BTreeMap<(TenantId, MerchantId), MemberLoyaltyRecord>,

    posts: BTreeMap<(TenantId, PostId), PostRecord>,
    next_post_id: u64,
    comments: BTreeMap<(TenantId, CommentId), CommentRecord>,
    next_comment_id: u64,
    likes: BTreeSet<(TenantId, PostId, MerchantId)>,

    countries: BTreeMap<CountryId, CountryRecord>,
    regions: BTreeMap<RegionId, RegionRecord>,
    comunas: BTreeMap<ComunaId, ComunaRecord>,
    provider_categories: BTreeMap<ProviderCategoryId, ProviderCategoryRecord>,

    providers: BTreeMap<(TenantId, ProviderId), ProviderRecord>,
    provider_by_merchant: BTreeMap<(TenantId, MerchantId), ProviderId>,
    next_provider_id: u64,
    products: BTreeMap<(TenantId, ProductId), ProductRecord>,
    next_product_id: u64,
    promotions: BTreeMap<(TenantId, PromotionId), PromotionRecord>,
    next_promotion_id: u64,
    contact_requests: BTreeMap<(TenantId, ContactRequestId), ContactRequestRecord>,
    next_contact_request_id: u64,

    benefits: BTreeMap<(TenantId, BenefitId), BenefitRecord>,
    next_benefit_id: u64,
    redemptions: BTreeMap<(TenantId, RedemptionId), RedemptionRecord>,
    redemption_index: BTreeSet<(TenantId, BenefitId, MerchantId)>,
    next_redemption_id: u64,
}

impl Default for VecinoStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

fn take_id(next: &mut u64) -> u64 {
    let id = *next;
    *next = next.saturating_add(1);
    id
}

impl VecinoStore {
    pub fn new_in_memory() -> Self {
        Self::with_tier_table(TierTable::mvp_v1())
    }

    pub fn with_tier_table(tier_table: TierTable) -> Self {
        Self {
            tier_table,
            merchants: BTreeMap::new(),
            merchant_email_index: BTreeMap::new(),
            next_merchant_id: 1,
            sessions: BTreeMap::new(),
            points_ledger: Vec::new(),
            next_points_event_id: 1,
            points_idempotency_index: BTreeMap::new(),
            member_loyalty: BTreeMap::new(),
            posts: BTreeMap::new(),
            next_post_id: 1,
            comments: BTreeMap::new(),
            next_comment_id: 1,
            likes: BTreeSet::new(),
            countries: BTreeMap::new(),
            regions: BTreeMap::new(),
            comunas: BTreeMap::new(),
            provider_categories: BTreeMap::new(),
            providers: BTreeMap::new(),
            provider_by_merchant: BTreeMap::new(),
            next_provider_id: 1,
            products: BTreeMap::new(),
            next_product_id: 1,
            promotions: BTreeMap::new(),
            next_promotion_id: 1,
            contact_requests: BTreeMap::new(),
            next_contact_request_id: 1,
            benefits: BTreeMap::new(),
            next_benefit_id: 1,
            redemptions: BTreeMap::new(),
            redemption_index: BTreeSet::new(),
            next_redemption_id: 1,
        }
    }

    pub fn tier_table(&self) -> &TierTable {
        &self.tier_table
    }

    /// Swaps the tier table and re-derives every cached tier label.
    pub fn set_tier_table(&mut self, tier_table: TierTable) {
        self.tier_table = tier_table;
        self.rebuild_member_loyalty_from_ledger();
    }

    // ------------------------
    // Merchants and sessions.
    // ------------------------

    pub fn insert_merchant(
        &mut self,
        tenant_id: TenantId,
        registration: &MerchantRegistration,
        password_hash: String,
        now: MonotonicTimeNs,
    ) -> Result<MerchantId, StorageError> {
        tenant_id.validate()?;
        registration.validate_identity()?;

        let email_key = (tenant_id.clone(), registration.email.clone());
        if self.merchant_email_index.contains_key(&email_key) {
            return Err(StorageError::DuplicateKey {
                table: "merchants.email",
                key: format!("{}/{}", tenant_id.as_str(), registration.email.as_str()),
            });
        }

        let merchant_id = MerchantId(take_id(&mut self.next_merchant_id));
        let record = MerchantRecord {
            tenant_id: tenant_id.clone(),
            merchant_id,
            full_name: registration.full_name.trim().to_string(),
            email: registration.email.clone(),
            password_hash,
            whatsapp: registration.whatsapp.clone(),
            relation: registration.relation,
            business_type: registration.business_type,
            comuna: registration.comuna.clone(),
            business_name: DEFAULT_BUSINESS_NAME.to_string(),
            interests: BTreeSet::new(),
            profile_picture: None,
            registered_at: now,
            last_login_at: None,
        };
        self.merchants
            .insert((tenant_id.clone(), merchant_id), record);
        self.merchant_email_index.insert(email_key, merchant_id);
        self.member_loyalty.insert(
            (tenant_id.clone(), merchant_id),
            self.zero_loyalty_row(tenant_id, merchant_id, now),
        );
        Ok(merchant_id)
    }

    fn zero_loyalty_row(
        &self,
        tenant_id: TenantId,
        merchant_id: MerchantId,
        at: MonotonicTimeNs,
    ) -> MemberLoyaltyRecord {
        MemberLoyaltyRecord {
            tenant_id,
            merchant_id,
            points_balance: 0,
            tier: self.tier_table.tier_for_points(0),
            last_event_id: None,
            updated_at: at,
        }
    }

    pub fn merchant(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MerchantRecord> {
        self.merchants.get(&(tenant_id.clone(), merchant_id))
    }

    pub fn merchant_by_email(
        &self,
        tenant_id: &TenantId,
        email: &Email,
    ) -> Option<&MerchantRecord> {
        let id = self
            .merchant_email_index
            .get(&(tenant_id.clone(), email.clone()))?;
        self.merchant(tenant_id, *id)
    }

    fn require_merchant(
        &self,
        table: &'static str,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Result<(), StorageError> {
        if self.merchants.contains_key(&(tenant_id.clone(), merchant_id)) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table,
                key: tenant_key(tenant_id, merchant_id.0),
            })
        }
    }

    fn merchant_mut(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Result<&mut MerchantRecord, StorageError> {
        self.merchants
            .get_mut(&(tenant_id.clone(), merchant_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "merchants",
                key: tenant_key(tenant_id, merchant_id.0),
            })
    }

    pub fn update_merchant_profile(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        update: &ProfileUpdate,
    ) -> Result<(), StorageError> {
        update.validate()?;
        let m = self.merchant_mut(tenant_id, merchant_id)?;
        if let Some(name) = &update.business_name {
            m.business_name = name.trim().to_string();
        }
        if let Some(interests) = &update.interests {
            m.interests = interests.clone();
        }
        if let Some(picture) = &update.profile_picture {
            m.profile_picture = Some(picture.clone());
        }
        Ok(())
    }

    pub fn record_merchant_login(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.merchant_mut(tenant_id, merchant_id)?.last_login_at = Some(now);
        Ok(())
    }

    pub fn insert_session(
        &mut self,
        token: &SessionToken,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        token.validate()?;
        self.require_merchant("sessions.merchant_id", tenant_id, merchant_id)?;
        let digest = session_digest(token);
        if self.sessions.contains_key(&digest) {
            return Err(StorageError::DuplicateKey {
                table: "sessions",
                key: digest,
            });
        }
        self.sessions.insert(
            digest,
            SessionRecord {
                tenant_id: tenant_id.clone(),
                merchant_id,
                created_at: now,
            },
        );
        Ok(())
    }

    pub fn session(&self, token: &SessionToken) -> Option<&SessionRecord> {
        self.sessions.get(&session_digest(token))
    }

    pub fn remove_session(&mut self, token: &SessionToken) -> bool {
        self.sessions.remove(&session_digest(token)).is_some()
    }

    // ------------------------
    // Points ledger (append-only) and member loyalty projection.
    // ------------------------

    fn apply_points_event_to_member(&mut self, ev: &PointsLedgerEvent) -> (u64, u64) {
        let key = (ev.tenant_id.clone(), ev.merchant_id);
        let before = self
            .member_loyalty
            .get(&key)
            .map(|r| r.points_balance)
            .unwrap_or(0);
        let after = before.saturating_add(ev.points);
        let row = MemberLoyaltyRecord {
            tenant_id: ev.tenant_id.clone(),
            merchant_id: ev.merchant_id,
            points_balance: after,
            tier: self.tier_table.tier_for_points(after),
            last_event_id: Some(ev.points_event_id),
            updated_at: ev.created_at,
        };
        self.member_loyalty.insert(key, row);
        (before, after)
    }

    /// Appends a credit and updates the cached balance and tier in the same call.
    pub fn append_points_event(
        &mut self,
        input: PointsLedgerEventInput,
    ) -> Result<PointsAppend, StorageError> {
        input.validate()?;
        self.require_merchant("points_ledger.merchant_id", &input.tenant_id, input.merchant_id)?;

        if let Some(k) = &input.idempotency_key {
            let idx = (input.tenant_id.clone(), input.merchant_id, k.clone());
            if let Some(existing) = self.points_idempotency_index.get(&idx) {
                let balance = self.member_points(&input.tenant_id, input.merchant_id);
                return Ok(PointsAppend {
                    points_event_id: *existing,
                    newly_applied: false,
                    balance_before: balance,
                    balance_after: balance,
                });
            }
        }

        let points_event_id = PointsEventId(take_id(&mut self.next_points_event_id));
        let row = PointsLedgerEvent::from_input_v1(points_event_id, input)?;
        if let Some(k) = &row.idempotency_key {
            self.points_idempotency_index.insert(
                (row.tenant_id.clone(), row.merchant_id, k.clone()),
                points_event_id,
            );
        }
        let (balance_before, balance_after) = self.apply_points_event_to_member(&row);
        self.points_ledger.push(row);
        Ok(PointsAppend {
            points_event_id,
            newly_applied: true,
            balance_before,
            balance_after,
        })
    }

    pub fn points_ledger(&self) -> &[PointsLedgerEvent] {
        &self.points_ledger
    }

    pub fn points_events_for_member(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Vec<&PointsLedgerEvent> {
        self.points_ledger
            .iter()
            .filter(|e| &e.tenant_id == tenant_id && e.merchant_id == merchant_id)
            .collect()
    }

    pub fn member_loyalty(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MemberLoyaltyRecord> {
        self.member_loyalty.get(&(tenant_id.clone(), merchant_id))
    }

    pub fn member_points(&self, tenant_id: &TenantId, merchant_id: MerchantId) -> u64 {
        self.member_loyalty(tenant_id, merchant_id)
            .map(|r| r.points_balance)
            .unwrap_or(0)
    }

    pub fn rebuild_member_loyalty_from_ledger(&mut self) {
        self.member_loyalty.clear();
        self.points_idempotency_index.clear();

        let seeds: Vec<MemberLoyaltyRecord> = self
            .merchants
            .values()
            .map(|m| self.zero_loyalty_row(m.tenant_id.clone(), m.merchant_id, m.registered_at))
            .collect();
        for row in seeds {
            self.member_loyalty
                .insert((row.tenant_id.clone(), row.merchant_id), row);
        }

        let mut ordered = self.points_ledger.clone();
        ordered.sort_by_key(|r| r.points_event_id);
        for row in ordered {
            if let Some(k) = &row.idempotency_key {
                self.points_idempotency_index.insert(
                    (row.tenant_id.clone(), row.merchant_id, k.clone()),
                    row.points_event_id,
                );
            }
            self.apply_points_event_to_member(&row);
        }
    }

    pub fn attempt_overwrite_points_event(
        &mut self,
        _points_event_id: PointsEventId,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "points_ledger",
        })
    }

    // ------------------------
    // Forum.
    // ------------------------

    pub fn insert_post(
        &mut self,
        tenant_id: &TenantId,
        author_id: MerchantId,
        draft: &PostDraft,
        now: MonotonicTimeNs,
    ) -> Result<PostId, StorageError> {
        draft.validate()?;
        self.require_merchant("posts.author_id", tenant_id, author_id)?;
        let post_id = PostId(take_id(&mut self.next_post_id));
        self.posts.insert(
            (tenant_id.clone(), post_id),
            PostRecord {
                tenant_id: tenant_id.clone(),
                post_id,
                author_id,
                title: draft.title.trim().to_string(),
                content: draft.content.clone(),
                category: draft.category,
                image_url: draft.attachment.as_ref().map(PostAttachment::public_url),
                tags: draft.tags.clone(),
                created_at: now,
            },
        );
        Ok(post_id)
    }

    pub fn post(&self, tenant_id: &TenantId, post_id: PostId) -> Option<&PostRecord> {
        self.posts.get(&(tenant_id.clone(), post_id))
    }

    /// Newest first; ties broken by id so the order is stable.
    pub fn posts_newest_first(&self, tenant_id: &TenantId) -> Vec<&PostRecord> {
        let mut out: Vec<&PostRecord> = self
            .posts
            .values()
            .filter(|p| &p.tenant_id == tenant_id)
            .collect();
        out.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.post_id.cmp(&a.post_id))
        });
        out
    }

    fn require_post(&self, tenant_id: &TenantId, post_id: PostId) -> Result<(), StorageError> {
        if self.posts.contains_key(&(tenant_id.clone(), post_id)) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table: "posts",
                key: tenant_key(tenant_id, post_id.0),
            })
        }
    }

    pub fn insert_comment(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        author_id: MerchantId,
        draft: &CommentDraft,
        now: MonotonicTimeNs,
    ) -> Result<CommentId, StorageError> {
        draft.validate()?;
        self.require_post(tenant_id, post_id)?;
        self.require_merchant("comments.author_id", tenant_id, author_id)?;
        let comment_id = CommentId(take_id(&mut self.next_comment_id));
        self.comments.insert(
            (tenant_id.clone(), comment_id),
            CommentRecord {
                tenant_id: tenant_id.clone(),
                comment_id,
                post_id,
                author_id,
                content: draft.content.trim().to_string(),
                created_at: now,
            },
        );
        Ok(comment_id)
    }

    pub fn comments_oldest_first(
        &self,
        tenant_id: &TenantId,
        post_id: PostId,
    ) -> Vec<&CommentRecord> {
        let mut out: Vec<&CommentRecord> = self
            .comments
            .values()
            .filter(|c| &c.tenant_id == tenant_id && c.post_id == post_id)
            .collect();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.comment_id.cmp(&b.comment_id))
        });
        out
    }

    pub fn comment_count(&self, tenant_id: &TenantId, post_id: PostId) -> usize {
        self.comments
            .values()
            .filter(|c| &c.tenant_id == tenant_id && c.post_id == post_id)
            .count()
    }

    pub fn insert_like(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> Result<(), StorageError> {
        self.require_post(tenant_id, post_id)?;
        self.require_merchant("likes.merchant_id", tenant_id, merchant_id)?;
        if !self
            .likes
            .insert((tenant_id.clone(), post_id, merchant_id))
        {
            return Err(StorageError::DuplicateKey {
                table: "likes",
                key: format!("{}/{}/{}", tenant_id.as_str(), post_id.0, merchant_id.0),
            });
        }
        Ok(())
    }

    pub fn remove_like(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> bool {
        self.likes.remove(&(tenant_id.clone(), post_id, merchant_id))
    }

    pub fn has_liked(
        &self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> bool {
        self.likes.contains(&(tenant_id.clone(), post_id, merchant_id))
    }

    pub fn like_count(&self, tenant_id: &TenantId, post_id: PostId) -> usize {
        self.likes
            .iter()
            .filter(|(t, p, _)| t == tenant_id && *p == post_id)
            .count()
    }

    // ------------------------
    // Geo catalog and provider categories (shared reference data).
    // ------------------------

    pub fn insert_country(&mut self, row: CountryRecord) -> Result<(), StorageError> {
        validate_text("country.name", &row.name, 100)?;
        if self.countries.contains_key(&row.country_id)
            || self.countries.values().any(|c| c.code == row.code)
        {
            return Err(StorageError::DuplicateKey {
                table: "countries",
                key: row.code,
            });
        }
        self.countries.insert(row.country_id, row);
        Ok(())
    }

    pub fn insert_region(&mut self, row: RegionRecord) -> Result<(), StorageError> {
        validate_text("region.name", &row.name, 100)?;
        if !self.countries.contains_key(&row.country_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "regions.country_id",
                key: row.country_id.0.to_string(),
            });
        }
        if self.regions.contains_key(&row.region_id) {
            return Err(StorageError::DuplicateKey {
                table: "regions",
                key: row.region_id.0.to_string(),
            });
        }
        self.regions.insert(row.region_id, row);
        Ok(())
    }

    pub fn insert_comuna(&mut self, row: ComunaRecord) -> Result<(), StorageError> {
        validate_text("comuna.name", &row.name, 100)?;
        if !self.regions.contains_key(&row.region_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "comunas.region_id",
                key: row.region_id.0.to_string(),
            });
        }
        if self.comunas.contains_key(&row.comuna_id) {
            return Err(StorageError::DuplicateKey {
                table: "comunas",
                key: row.comuna_id.0.to_string(),
            });
        }
        self.comunas.insert(row.comuna_id, row);
        Ok(())
    }

    pub fn country(&self, country_id: CountryId) -> Option<&CountryRecord> {
        self.countries.get(&country_id)
    }

    pub fn region(&self, region_id: RegionId) -> Option<&RegionRecord> {
        self.regions.get(&region_id)
    }

    pub fn comuna(&self, comuna_id: ComunaId) -> Option<&ComunaRecord> {
        self.comunas.get(&comuna_id)
    }

    pub fn regions(&self) -> Vec<&RegionRecord> {
        self.regions.values().collect()
    }

    /// Sorted by name.
    pub fn comunas_for_region(&self, region_id: RegionId) -> Vec<&ComunaRecord> {
        let mut out: Vec<&ComunaRecord> = self
            .comunas
            .values()
            .filter(|c| c.region_id == region_id)
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn insert_provider_category(
        &mut self,
        row: ProviderCategoryRecord,
    ) -> Result<(), StorageError> {
        validate_text("provider_category.name", &row.name, 100)?;
        if self.provider_categories.contains_key(&row.category_id) {
            return Err(StorageError::DuplicateKey {
                table: "provider_categories",
                key: row.category_id.0.to_string(),
            });
        }
        self.provider_categories.insert(row.category_id, row);
        Ok(())
    }

    pub fn provider_category(
        &self,
        category_id: ProviderCategoryId,
    ) -> Option<&ProviderCategoryRecord> {
        self.provider_categories.get(&category_id)
    }

    pub fn active_provider_categories(&self) -> Vec<&ProviderCategoryRecord> {
        self.provider_categories
            .values()
            .filter(|c| c.active)
            .collect()
    }

    // ------------------------
    // Providers, products, promotions, contact requests.
    // ------------------------

    fn check_provider_refs(&self, profile: &ProviderProfileDraft) -> Result<(), StorageError> {
        for c in &profile.categories {
            if !self.provider_categories.contains_key(c) {
                return Err(StorageError::ForeignKeyViolation {
                    table: "providers.categories",
                    key: c.0.to_string(),
                });
            }
        }
        if let Some(id) = profile.country {
            if !self.countries.contains_key(&id) {
                return Err(StorageError::ForeignKeyViolation {
                    table: "providers.country_id",
                    key: id.0.to_string(),
                });
            }
        }
        if let Some(id) = profile.region {
            if !self.regions.contains_key(&id) {
                return Err(StorageError::ForeignKeyViolation {
                    table: "providers.region_id",
                    key: id.0.to_string(),
                });
            }
        }
        if let Some(id) = profile.comuna {
            if !self.comunas.contains_key(&id) {
                return Err(StorageError::ForeignKeyViolation {
                    table: "providers.comuna_id",
                    key: id.0.to_string(),
                });
            }
        }
        Ok(())
    }

    /// One provider profile per merchant.
    pub fn insert_provider(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProviderId, StorageError> {
        profile.validate()?;
        self.require_merchant("providers.merchant_id", tenant_id, merchant_id)?;
        self.check_provider_refs(&profile)?;
        let owner_key = (tenant_id.clone(), merchant_id);
        if self.provider_by_merchant.contains_key(&owner_key) {
            return Err(StorageError::DuplicateKey {
                table: "providers.merchant_id",
                key: tenant_key(tenant_id, merchant_id.0),
            });
        }
        let provider_id = ProviderId(take_id(&mut self.next_provider_id));
        self.providers.insert(
            (tenant_id.clone(), provider_id),
            ProviderRecord {
                tenant_id: tenant_id.clone(),
                provider_id,
                merchant_id,
                profile,
                settings: ProviderSettings::default(),
                status: ProviderStatusFlags::default(),
                visits: 0,
                contacts_sent: 0,
                contacts_accepted: 0,
                registered_at: now,
                updated_at: now,
            },
        );
        self.provider_by_merchant.insert(owner_key, provider_id);
        Ok(provider_id)
    }

    pub fn provider(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Option<&ProviderRecord> {
        self.providers.get(&(tenant_id.clone(), provider_id))
    }

    pub fn provider_for_merchant(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&ProviderRecord> {
        let id = self
            .provider_by_merchant
            .get(&(tenant_id.clone(), merchant_id))?;
        self.provider(tenant_id, *id)
    }

    pub fn providers(&self, tenant_id: &TenantId) -> Vec<&ProviderRecord> {
        self.providers
            .values()
            .filter(|p| &p.tenant_id == tenant_id)
            .collect()
    }

    fn provider_mut(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Result<&mut ProviderRecord, StorageError> {
        self.providers
            .get_mut(&(tenant_id.clone(), provider_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "providers",
                key: tenant_key(tenant_id, provider_id.0),
            })
    }

    fn require_provider(
        &self,
        table: &'static str,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Result<(), StorageError> {
        if self.providers.contains_key(&(tenant_id.clone(), provider_id)) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation {
                table,
                key: tenant_key(tenant_id, provider_id.0),
            })
        }
    }

    pub fn update_provider_profile(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        profile.validate()?;
        self.check_provider_refs(&profile)?;
        let p = self.provider_mut(tenant_id, provider_id)?;
        p.profile = profile;
        p.updated_at = now;
        Ok(())
    }

    pub fn update_provider_settings(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        settings: ProviderSettings,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        settings.validate()?;
        let p = self.provider_mut(tenant_id, provider_id)?;
        p.settings = settings;
        p.updated_at = now;
        Ok(())
    }

    pub fn set_provider_status(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        status: ProviderStatusFlags,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let p = self.provider_mut(tenant_id, provider_id)?;
        p.status = status;
        p.updated_at = now;
        Ok(())
    }

    /// Returns the new visit count.
    pub fn increment_provider_visits(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Result<u64, StorageError> {
        let p = self.provider_mut(tenant_id, provider_id)?;
        p.visits = p.visits.saturating_add(1);
        Ok(p.visits)
    }

    pub fn insert_product(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProductId, StorageError> {
        product.validate()?;
        self.require_provider("products.provider_id", tenant_id, provider_id)?;
        let product_id = ProductId(take_id(&mut self.next_product_id));
        self.products.insert(
            (tenant_id.clone(), product_id),
            ProductRecord {
                tenant_id: tenant_id.clone(),
                product_id,
                provider_id,
                product,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(product_id)
    }

    pub fn product(&self, tenant_id: &TenantId, product_id: ProductId) -> Option<&ProductRecord> {
        self.products.get(&(tenant_id.clone(), product_id))
    }

    fn product_mut(
        &mut self,
        tenant_id: &TenantId,
        product_id: ProductId,
    ) -> Result<&mut ProductRecord, StorageError> {
        self.products
            .get_mut(&(tenant_id.clone(), product_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "products",
                key: tenant_key(tenant_id, product_id.0),
            })
    }

    pub fn update_product(
        &mut self,
        tenant_id: &TenantId,
        product_id: ProductId,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        product.validate()?;
        let row = self.product_mut(tenant_id, product_id)?;
        row.product = product;
        row.updated_at = now;
        Ok(())
    }

    pub fn set_product_featured(
        &mut self,
        tenant_id: &TenantId,
        product_id: ProductId,
        featured: bool,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let row = self.product_mut(tenant_id, product_id)?;
        row.product.featured = featured;
        row.updated_at = now;
        Ok(())
    }

    pub fn delete_product(
        &mut self,
        tenant_id: &TenantId,
        product_id: ProductId,
    ) -> Result<ProductRecord, StorageError> {
        self.products
            .remove(&(tenant_id.clone(), product_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "products",
                key: tenant_key(tenant_id, product_id.0),
            })
    }

    pub fn products_for_provider(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Vec<&ProductRecord> {
        self.products
            .values()
            .filter(|p| &p.tenant_id == tenant_id && p.provider_id == provider_id)
            .collect()
    }

    pub fn insert_promotion(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        promotion: PromotionDraft,
        now: MonotonicTimeNs,
    ) -> Result<PromotionId, StorageError> {
        promotion.validate()?;
        self.require_provider("promotions.provider_id", tenant_id, provider_id)?;
        let promotion_id = PromotionId(take_id(&mut self.next_promotion_id));
        self.promotions.insert(
            (tenant_id.clone(), promotion_id),
            PromotionRecord {
                tenant_id: tenant_id.clone(),
                promotion_id,
                provider_id,
                promotion,
                created_at: now,
            },
        );
        Ok(promotion_id)
    }

    pub fn promotion(
        &self,
        tenant_id: &TenantId,
        promotion_id: PromotionId,
    ) -> Option<&PromotionRecord> {
        self.promotions.get(&(tenant_id.clone(), promotion_id))
    }

    pub fn update_promotion(
        &mut self,
        tenant_id: &TenantId,
        promotion_id: PromotionId,
        promotion: PromotionDraft,
    ) -> Result<(), StorageError> {
        promotion.validate()?;
        let row = self
            .promotions
            .get_mut(&(tenant_id.clone(), promotion_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "promotions",
                key: tenant_key(tenant_id, promotion_id.0),
            })?;
        row.promotion = promotion;
        Ok(())
    }

    pub fn delete_promotion(
        &mut self,
        tenant_id: &TenantId,
        promotion_id: PromotionId,
    ) -> Result<PromotionRecord, StorageError> {
        self.promotions
            .remove(&(tenant_id.clone(), promotion_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "promotions",
                key: tenant_key(tenant_id, promotion_id.0),
            })
    }

    pub fn promotions_for_provider(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Vec<&PromotionRecord> {
        self.promotions
            .values()
            .filter(|p| &p.tenant_id == tenant_id && p.provider_id == provider_id)
            .collect()
    }

    /// Rejects a second pending request from the same provider to the same
    /// recipient. Counts toward the provider's `contacts_sent`.
    pub fn insert_contact_request(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        recipient_id: MerchantId,
        draft: &ContactRequestDraft,
        now: MonotonicTimeNs,
    ) -> Result<ContactRequestId, StorageError> {
        draft.validate()?;
        self.require_provider("contact_requests.provider_id", tenant_id, provider_id)?;
        self.require_merchant("contact_requests.recipient_id", tenant_id, recipient_id)?;
        let pending_exists = self.contact_requests.values().any(|r| {
            &r.tenant_id == tenant_id
                && r.provider_id == provider_id
                && r.recipient_id == recipient_id
                && r.status.is_open()
        });
        if pending_exists {
            return Err(StorageError::DuplicateKey {
                table: "contact_requests.pending",
                key: format!("{}/{}/{}", tenant_id.as_str(), provider_id.0, recipient_id.0),
            });
        }

        let contact_request_id = ContactRequestId(take_id(&mut self.next_contact_request_id));
        self.contact_requests.insert(
            (tenant_id.clone(), contact_request_id),
            ContactRequestRecord {
                tenant_id: tenant_id.clone(),
                contact_request_id,
                provider_id,
                recipient_id,
                message: draft.message.trim().to_string(),
                status: ContactRequestStatus::Pending,
                requested_at: now,
                responded_at: None,
            },
        );
        let p = self.provider_mut(tenant_id, provider_id)?;
        p.contacts_sent = p.contacts_sent.saturating_add(1);
        Ok(contact_request_id)
    }

    pub fn contact_request(
        &self,
        tenant_id: &TenantId,
        contact_request_id: ContactRequestId,
    ) -> Option<&ContactRequestRecord> {
        self.contact_requests
            .get(&(tenant_id.clone(), contact_request_id))
    }

    /// Moving into `Accepted` counts toward the provider's `contacts_accepted`.
    pub fn set_contact_request_status(
        &mut self,
        tenant_id: &TenantId,
        contact_request_id: ContactRequestId,
        status: ContactRequestStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        let row = self
            .contact_requests
            .get_mut(&(tenant_id.clone(), contact_request_id))
            .ok_or_else(|| StorageError::NotFound {
                table: "contact_requests",
                key: tenant_key(tenant_id, contact_request_id.0),
            })?;
        let newly_accepted = status == ContactRequestStatus::Accepted
            && row.status != ContactRequestStatus::Accepted;
        row.status = status;
        row.responded_at = Some(now);
        let provider_id = row.provider_id;
        if newly_accepted {
            let p = self.provider_mut(tenant_id, provider_id)?;
            p.contacts_accepted = p.contacts_accepted.saturating_add(1);
        }
        Ok(())
    }

    fn newest_requests<'a>(
        mut rows: Vec<&'a ContactRequestRecord>,
    ) -> Vec<&'a ContactRequestRecord> {
        rows.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then(b.contact_request_id.cmp(&a.contact_request_id))
        });
        rows
    }

    pub fn contact_requests_for_provider(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Vec<&ContactRequestRecord> {
        Self::newest_requests(
            self.contact_requests
                .values()
                .filter(|r| &r.tenant_id == tenant_id && r.provider_id == provider_id)
                .collect(),
        )
    }

    pub fn contact_requests_for_recipient(
        &self,
        tenant_id: &TenantId,
        recipient_id: MerchantId,
    ) -> Vec<&ContactRequestRecord> {
        Self::newest_requests(
            self.contact_requests
                .values()
                .filter(|r| &r.tenant_id == tenant_id && r.recipient_id == recipient_id)
                .collect(),
        )
    }

    // ------------------------
    // Benefits and redemptions.
    // ------------------------

    pub fn insert_benefit(
        &mut self,
        tenant_id: &TenantId,
        benefit: BenefitDraft,
        now: MonotonicTimeNs,
    ) -> Result<BenefitId, StorageError> {
        tenant_id.validate()?;
        benefit.validate()?;
        let benefit_id = BenefitId(take_id(&mut self.next_benefit_id));
        self.benefits.insert(
            (tenant_id.clone(), benefit_id),
            BenefitRecord {
                tenant_id: tenant_id.clone(),
                benefit_id,
                benefit,
                created_at: now,
            },
        );
        Ok(benefit_id)
    }

    pub fn benefit(&self, tenant_id: &TenantId, benefit_id: BenefitId) -> Option<&BenefitRecord> {
        self.benefits.get(&(tenant_id.clone(), benefit_id))
    }

    pub fn benefits(&self, tenant_id: &TenantId) -> Vec<&BenefitRecord> {
        self.benefits
            .values()
            .filter(|b| &b.tenant_id == tenant_id)
            .collect()
    }

    pub fn has_redeemed(
        &self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
    ) -> bool {
        self.redemption_index
            .contains(&(tenant_id.clone(), benefit_id, merchant_id))
    }

    /// Records the redemption and takes one unit of stock.
    pub fn insert_redemption(
        &mut self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
        tier_at_redemption: TierCode,
        points_at_redemption: u64,
        now: MonotonicTimeNs,
    ) -> Result<RedemptionId, StorageError> {
        self.require_merchant("redemptions.merchant_id", tenant_id, merchant_id)?;
        let index_key = (tenant_id.clone(), benefit_id, merchant_id);
        if self.redemption_index.contains(&index_key) {
            return Err(StorageError::DuplicateKey {
                table: "redemptions",
                key: format!("{}/{}/{}", tenant_id.as_str(), benefit_id.0, merchant_id.0),
            });
        }
        let benefit = self
            .benefits
            .get_mut(&(tenant_id.clone(), benefit_id))
            .ok_or_else(|| StorageError::ForeignKeyViolation {
                table: "redemptions.benefit_id",
                key: tenant_key(tenant_id, benefit_id.0),
            })?;
        if let Some(stock) = benefit.benefit.stock.as_mut() {
            if *stock == 0 {
                return Err(StorageError::ContractViolation(
                    ContractViolation::InvalidValue {
                        field: "benefit.stock",
                        reason: "out of stock",
                    },
                ));
            }
            *stock -= 1;
        }

        let redemption_id = RedemptionId(take_id(&mut self.next_redemption_id));
        self.redemptions.insert(
            (tenant_id.clone(), redemption_id),
            RedemptionRecord {
                tenant_id: tenant_id.clone(),
                redemption_id,
                benefit_id,
                merchant_id,
                tier_at_redemption,
                points_at_redemption,
                redeemed_at: now,
            },
        );
        self.redemption_index.insert(index_key);
        Ok(redemption_id)
    }

    pub fn redemptions_for_merchant(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Vec<&RedemptionRecord> {
        self.redemptions
            .values()
            .filter(|r| &r.tenant_id == tenant_id && r.merchant_id == merchant_id)
            .collect()
    }
}
