#![forbid(unsafe_code)]

//! Wire shapes. Requests carry plain strings and are parsed into contract
//! types here; responses flatten records into JSON-friendly fields.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vecino_engines::directory::{DirectoryQuery, PageInfo};
use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitEligibility};
use vecino_kernel_contracts::forum::{
    CommentDraft, PostAttachment, PostCategory, PostDraft, PostTags,
};
use vecino_kernel_contracts::loyalty::{LoyaltyProgress, TierCode};
use vecino_kernel_contracts::merchant::{
    BusinessRelation, BusinessType, Email, Interest, MerchantRegistration, ProfileUpdate, WhatsApp,
};
use vecino_kernel_contracts::provider::{
    ActiveFilter, ComunaId, ContactRequestDraft, ContactRequestStatus, CountryId, Coverage,
    ProductCategory, ProductDraft, PromotionDraft, PromotionValidity, ProviderCategoryId,
    ProviderProfileDraft, ProviderSettings, RegionId, SocialLinks,
};
use vecino_os::account::MerchantProfile;
use vecino_os::benefits::BenefitView;
use vecino_os::directory::{ProviderCard, ProviderDetail};
use vecino_os::forum::{AuthorView, CommentView, PostDetail, PostSummary};
use vecino_os::provider::{acceptance_rate, ProductFilter, PromotionFilter, ProviderDashboard};
use vecino_storage::store::{
    ComunaRecord, ContactRequestRecord, CountryRecord, ProductRecord, PromotionRecord,
    ProviderCategoryRecord, ProviderRecord, ProviderStatusFlags, RegionRecord,
};

use crate::error::AdapterError;

fn bad(msg: impl Into<String>) -> AdapterError {
    AdapterError::BadRequest(msg.into())
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AdapterError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| bad(format!("{field} must be a YYYY-MM-DD date")))
}

fn parse_opt_id(field: &str, raw: Option<String>) -> Result<Option<u64>, AdapterError> {
    match non_blank(raw) {
        Some(s) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| bad(format!("{field} must be a numeric id"))),
        None => Ok(None),
    }
}

fn default_true() -> bool {
    true
}

// ------------------------
// Accounts.
// ------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    /// Blank in journal entries, which carry the hash instead.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confirm_password: String,
    #[serde(default)]
    pub whatsapp: Option<String>,
    pub relation: String,
    pub business_type: String,
    pub comuna: String,
}

impl RegisterRequest {
    pub fn to_registration(&self) -> Result<MerchantRegistration, AdapterError> {
        Ok(MerchantRegistration {
            full_name: self.full_name.clone(),
            email: Email::parse(&self.email)?,
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
            whatsapp: non_blank(self.whatsapp.clone())
                .map(|w| WhatsApp::parse(&w))
                .transpose()?,
            relation: BusinessRelation::parse(&self.relation)
                .ok_or_else(|| bad("unknown relation"))?,
            business_type: BusinessType::parse(&self.business_type)
                .ok_or_else(|| bad("unknown business_type"))?,
            comuna: self.comuna.trim().to_string(),
        })
    }

    pub fn without_passwords(&self) -> Self {
        Self {
            password: String::new(),
            confirm_password: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfilePatchRequest {
    #[serde(default)]
    pub business_name: Option<String>,
    /// Comma separated interest codes.
    #[serde(default)]
    pub interests: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl ProfilePatchRequest {
    pub fn to_update(&self) -> Result<ProfileUpdate, AdapterError> {
        Ok(ProfileUpdate {
            business_name: self.business_name.clone(),
            interests: self
                .interests
                .as_deref()
                .map(Interest::parse_list)
                .transpose()?,
            profile_picture: non_blank(self.profile_picture.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredResponse {
    pub merchant_id: u64,
    pub points_awarded: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub merchant_id: u64,
    pub daily_bonus: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    #[serde(flatten)]
    pub progress: LoyaltyProgress,
    pub tier_name: &'static str,
    pub next_tier_name: Option<&'static str>,
}

impl From<LoyaltyProgress> for ProgressResponse {
    fn from(progress: LoyaltyProgress) -> Self {
        Self {
            tier_name: progress.tier.display_name(),
            next_tier_name: progress.next_tier.map(TierCode::display_name),
            progress,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub merchant_id: u64,
    pub full_name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub relation: &'static str,
    pub business_type: &'static str,
    pub comuna: String,
    pub business_name: String,
    pub interests: Vec<&'static str>,
    pub profile_picture_url: String,
    pub registered_at_ns: u64,
    pub last_login_at_ns: Option<u64>,
    pub loyalty: ProgressResponse,
}

impl From<MerchantProfile> for MeResponse {
    fn from(p: MerchantProfile) -> Self {
        let m = p.merchant;
        Self {
            merchant_id: m.merchant_id.0,
            full_name: m.full_name,
            email: m.email.as_str().to_string(),
            whatsapp: m.whatsapp.map(|w| w.as_str().to_string()),
            relation: m.relation.as_str(),
            business_type: m.business_type.as_str(),
            comuna: m.comuna,
            business_name: m.business_name,
            interests: m.interests.iter().map(|i| i.as_str()).collect(),
            profile_picture_url: p.profile_picture_url,
            registered_at_ns: m.registered_at.0,
            last_login_at_ns: m.last_login_at.map(|t| t.0),
            loyalty: p.progress.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierRow {
    pub code: TierCode,
    pub name: &'static str,
    pub floor: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TiersResponse {
    pub band_width: u64,
    pub tiers: Vec<TierRow>,
}

// ------------------------
// Forum.
// ------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub url_link: Option<String>,
    #[serde(default)]
    pub uploaded_file_name: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl PostRequest {
    pub fn to_draft(&self) -> Result<PostDraft, AdapterError> {
        let category = match non_blank(self.category.clone()) {
            Some(c) => PostCategory::parse(&c).ok_or_else(|| bad("unknown post category"))?,
            None => PostCategory::default(),
        };
        Ok(PostDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            category,
            attachment: PostAttachment::from_form(
                non_blank(self.url_link.clone()),
                non_blank(self.uploaded_file_name.clone()),
            )?,
            tags: PostTags::parse(self.tags.as_deref().unwrap_or(""))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

impl CommentRequest {
    pub fn to_draft(&self) -> CommentDraft {
        CommentDraft {
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthorDto {
    pub merchant_id: u64,
    pub full_name: String,
    pub business_name: String,
}

impl From<AuthorView> for AuthorDto {
    fn from(a: AuthorView) -> Self {
        Self {
            merchant_id: a.merchant_id.0,
            full_name: a.full_name,
            business_name: a.business_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDto {
    pub post_id: u64,
    pub title: String,
    pub content: String,
    pub category: &'static str,
    pub category_label: &'static str,
    pub image_url: Option<String>,
    pub mentions: BTreeSet<String>,
    pub hashtags: BTreeSet<String>,
    pub author: AuthorDto,
    pub like_count: usize,
    pub comment_count: usize,
    pub created_at_ns: u64,
}

impl From<PostSummary> for PostDto {
    fn from(s: PostSummary) -> Self {
        let p = s.post;
        Self {
            post_id: p.post_id.0,
            title: p.title,
            content: p.content,
            category: p.category.as_str(),
            category_label: p.category.label(),
            image_url: p.image_url,
            mentions: p.tags.mentions,
            hashtags: p.tags.hashtags,
            author: s.author.into(),
            like_count: s.like_count,
            comment_count: s.comment_count,
            created_at_ns: p.created_at.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub categories: Vec<&'static str>,
    pub posts: Vec<PostDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentDto {
    pub comment_id: u64,
    pub content: String,
    pub author: AuthorDto,
    pub created_at_ns: u64,
}

impl From<CommentView> for CommentDto {
    fn from(c: CommentView) -> Self {
        Self {
            comment_id: c.comment.comment_id.0,
            content: c.comment.content,
            author: c.author.into(),
            created_at_ns: c.comment.created_at.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetailResponse {
    pub post: PostDto,
    pub comments: Vec<CommentDto>,
    pub liked_by_viewer: bool,
}

impl From<PostDetail> for PostDetailResponse {
    fn from(d: PostDetail) -> Self {
        Self {
            post: d.summary.into(),
            comments: d.comments.into_iter().map(Into::into).collect(),
            liked_by_viewer: d.liked_by_viewer,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishedResponse {
    pub id: u64,
    pub points_awarded: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: usize,
    pub points_awarded: u64,
}

// ------------------------
// Loyalty and benefits.
// ------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub merchant_id: u64,
    pub points: u64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitRequest {
    pub title: String,
    pub description: String,
    pub min_tier: String,
    #[serde(default)]
    pub min_points: Option<u64>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl BenefitRequest {
    pub fn to_draft(&self) -> Result<BenefitDraft, AdapterError> {
        Ok(BenefitDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            min_tier: TierCode::parse(&self.min_tier).ok_or_else(|| bad("unknown min_tier"))?,
            min_points: self.min_points,
            stock: self.stock,
            active: self.active,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenefitDto {
    pub benefit_id: u64,
    pub title: String,
    pub description: String,
    pub min_tier: TierCode,
    pub min_points: Option<u64>,
    pub stock: Option<u32>,
    pub active: bool,
    pub eligibility: BenefitEligibility,
}

impl From<BenefitView> for BenefitDto {
    fn from(v: BenefitView) -> Self {
        let b = v.benefit.benefit;
        Self {
            benefit_id: v.benefit.benefit_id.0,
            title: b.title,
            description: b.description,
            min_tier: b.min_tier,
            min_points: b.min_points,
            stock: b.stock,
            active: b.active,
            eligibility: v.eligibility,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenefitsResponse {
    pub loyalty: ProgressResponse,
    pub benefits: Vec<BenefitDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdResponse {
    pub id: u64,
}

// ------------------------
// Provider panel.
// ------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfileRequest {
    pub company_name: String,
    pub description: String,
    pub categories: Vec<u64>,
    #[serde(default)]
    pub country: Option<u64>,
    #[serde(default)]
    pub region: Option<u64>,
    #[serde(default)]
    pub comuna: Option<u64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub coverage: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub whatsapp: String,
    pub email: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl ProviderProfileRequest {
    pub fn to_draft(&self) -> Result<ProviderProfileDraft, AdapterError> {
        let coverage = match non_blank(self.coverage.clone()) {
            Some(c) => Coverage::parse(&c).ok_or_else(|| bad("unknown coverage"))?,
            None => Coverage::default(),
        };
        Ok(ProviderProfileDraft {
            company_name: self.company_name.clone(),
            description: self.description.clone(),
            categories: self
                .categories
                .iter()
                .map(|id| ProviderCategoryId(*id))
                .collect(),
            country: self.country.map(CountryId),
            region: self.region.map(RegionId),
            comuna: self.comuna.map(ComunaId),
            address: non_blank(self.address.clone()),
            coverage,
            phone: non_blank(self.phone.clone()),
            whatsapp: self.whatsapp.trim().to_string(),
            email: Email::parse(&self.email)?,
            website: non_blank(self.website.clone()),
            social: SocialLinks {
                facebook: non_blank(self.facebook.clone()),
                instagram: non_blank(self.instagram.clone()),
                twitter: non_blank(self.twitter.clone()),
                linkedin: non_blank(self.linkedin.clone()),
            },
            photo: non_blank(self.photo.clone()),
        })
    }
}

/// Fields left out keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderSettingsRequest {
    #[serde(default)]
    pub dark_mode: Option<bool>,
    #[serde(default)]
    pub notify_email: Option<bool>,
    #[serde(default)]
    pub notify_messages: Option<bool>,
    #[serde(default)]
    pub notify_orders: Option<bool>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub public_profile: Option<bool>,
    #[serde(default)]
    pub show_stats: Option<bool>,
}

impl ProviderSettingsRequest {
    pub fn apply_to(&self, mut s: ProviderSettings) -> ProviderSettings {
        if let Some(v) = self.dark_mode {
            s.dark_mode = v;
        }
        if let Some(v) = self.notify_email {
            s.notify_email = v;
        }
        if let Some(v) = self.notify_messages {
            s.notify_messages = v;
        }
        if let Some(v) = self.notify_orders {
            s.notify_orders = v;
        }
        if let Some(v) = &self.language {
            s.language = v.trim().to_string();
        }
        if let Some(v) = &self.timezone {
            s.timezone = v.trim().to_string();
        }
        if let Some(v) = self.public_profile {
            s.public_profile = v;
        }
        if let Some(v) = self.show_stats {
            s.show_stats = v;
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    /// Decimal string, e.g. "1290.50".
    #[serde(default)]
    pub reference_price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub featured: bool,
}

impl ProductRequest {
    pub fn to_draft(&self) -> Result<ProductDraft, AdapterError> {
        let reference_price = match non_blank(self.reference_price.clone()) {
            Some(raw) => Some(
                Decimal::from_str(&raw).map_err(|_| bad("reference_price must be a decimal"))?,
            ),
            None => None,
        };
        let category = match non_blank(self.category.clone()) {
            Some(c) => ProductCategory::parse(&c).ok_or_else(|| bad("unknown product category"))?,
            None => ProductCategory::default(),
        };
        Ok(ProductDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            reference_price,
            category,
            image: non_blank(self.image.clone()),
            active: self.active,
            featured: self.featured,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub starts_on: String,
    pub ends_on: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl PromotionRequest {
    pub fn to_draft(&self) -> Result<PromotionDraft, AdapterError> {
        Ok(PromotionDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            image: non_blank(self.image.clone()),
            starts_on: parse_date("starts_on", &self.starts_on)?,
            ends_on: parse_date("ends_on", &self.ends_on)?,
            active: self.active,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequestRequest {
    pub recipient_id: u64,
    pub message: String,
}

impl ContactRequestRequest {
    pub fn to_draft(&self) -> ContactRequestDraft {
        ContactRequestDraft {
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResponseRequest {
    pub accept: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductListQuery {
    pub categoria: Option<String>,
    pub estado: Option<String>,
    pub q: Option<String>,
}

impl ProductListQuery {
    pub fn to_filter(&self) -> Result<ProductFilter, AdapterError> {
        let category = match non_blank(self.categoria.clone()) {
            Some(c) => Some(
                ProductCategory::parse(&c).ok_or_else(|| bad("unknown product category"))?,
            ),
            None => None,
        };
        Ok(ProductFilter {
            category,
            active: ActiveFilter::parse(self.estado.as_deref().unwrap_or("")),
            text: non_blank(self.q.clone()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromotionListQuery {
    pub estado: Option<String>,
    pub vigencia: Option<String>,
    pub q: Option<String>,
    pub desde: Option<String>,
    pub hasta: Option<String>,
}

impl PromotionListQuery {
    pub fn to_filter(&self) -> Result<PromotionFilter, AdapterError> {
        Ok(PromotionFilter {
            active: ActiveFilter::parse(self.estado.as_deref().unwrap_or("")),
            validity: PromotionValidity::parse(self.vigencia.as_deref().unwrap_or("")),
            text: non_blank(self.q.clone()),
            starts_from: non_blank(self.desde.clone())
                .map(|d| parse_date("desde", &d))
                .transpose()?,
            ends_until: non_blank(self.hasta.clone())
                .map(|d| parse_date("hasta", &d))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactListQuery {
    pub estado: Option<String>,
}

impl ContactListQuery {
    pub fn to_status(&self) -> Result<Option<ContactRequestStatus>, AdapterError> {
        match non_blank(self.estado.clone()) {
            Some(s) => ContactRequestStatus::parse(&s)
                .map(Some)
                .ok_or_else(|| bad("unknown contact request status")),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDto {
    pub provider_id: u64,
    pub merchant_id: u64,
    pub company_name: String,
    pub description: String,
    pub categories: Vec<u64>,
    pub country: Option<u64>,
    pub region: Option<u64>,
    pub comuna: Option<u64>,
    pub address: Option<String>,
    pub coverage: &'static str,
    pub phone: Option<String>,
    pub whatsapp: String,
    pub email: String,
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub photo: Option<String>,
    pub active: bool,
    pub verified: bool,
    pub featured: bool,
    pub visits: u64,
    pub contacts_sent: u64,
    pub contacts_accepted: u64,
    pub acceptance_rate: u8,
    pub registered_at_ns: u64,
}

impl From<&ProviderRecord> for ProviderDto {
    fn from(r: &ProviderRecord) -> Self {
        let p = &r.profile;
        Self {
            provider_id: r.provider_id.0,
            merchant_id: r.merchant_id.0,
            company_name: p.company_name.clone(),
            description: p.description.clone(),
            categories: p.categories.iter().map(|c| c.0).collect(),
            country: p.country.map(|c| c.0),
            region: p.region.map(|c| c.0),
            comuna: p.comuna.map(|c| c.0),
            address: p.address.clone(),
            coverage: p.coverage.as_str(),
            phone: p.phone.clone(),
            whatsapp: p.whatsapp.clone(),
            email: p.email.as_str().to_string(),
            website: p.website.clone(),
            facebook: p.social.facebook.clone(),
            instagram: p.social.instagram.clone(),
            twitter: p.social.twitter.clone(),
            linkedin: p.social.linkedin.clone(),
            photo: p.photo.clone(),
            active: r.status.active,
            verified: r.status.verified,
            featured: r.status.featured,
            visits: r.visits,
            contacts_sent: r.contacts_sent,
            contacts_accepted: r.contacts_accepted,
            acceptance_rate: acceptance_rate(r),
            registered_at_ns: r.registered_at.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsDto {
    pub dark_mode: bool,
    pub notify_email: bool,
    pub notify_messages: bool,
    pub notify_orders: bool,
    pub language: String,
    pub timezone: String,
    pub public_profile: bool,
    pub show_stats: bool,
}

impl From<&ProviderSettings> for SettingsDto {
    fn from(s: &ProviderSettings) -> Self {
        Self {
            dark_mode: s.dark_mode,
            notify_email: s.notify_email,
            notify_messages: s.notify_messages,
            notify_orders: s.notify_orders,
            language: s.language.clone(),
            timezone: s.timezone.clone(),
            public_profile: s.public_profile,
            show_stats: s.show_stats,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelProfileResponse {
    pub provider: ProviderDto,
    pub settings: SettingsDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub provider: ProviderDto,
    pub total_products: usize,
    pub active_products: usize,
    pub current_promotions: usize,
    pub pending_contact_requests: usize,
    pub acceptance_rate: u8,
}

impl From<ProviderDashboard> for DashboardResponse {
    fn from(d: ProviderDashboard) -> Self {
        Self {
            provider: (&d.provider).into(),
            total_products: d.total_products,
            active_products: d.active_products,
            current_promotions: d.current_promotions,
            pending_contact_requests: d.pending_contact_requests,
            acceptance_rate: d.acceptance_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDto {
    pub product_id: u64,
    pub provider_id: u64,
    pub name: String,
    pub description: String,
    pub reference_price: Option<String>,
    pub category: &'static str,
    pub image: Option<String>,
    pub active: bool,
    pub featured: bool,
    pub created_at_ns: u64,
}

impl From<ProductRecord> for ProductDto {
    fn from(r: ProductRecord) -> Self {
        let p = r.product;
        Self {
            product_id: r.product_id.0,
            provider_id: r.provider_id.0,
            name: p.name,
            description: p.description,
            reference_price: p.reference_price.map(|d| d.to_string()),
            category: p.category.as_str(),
            image: p.image,
            active: p.active,
            featured: p.featured,
            created_at_ns: r.created_at.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionDto {
    pub promotion_id: u64,
    pub provider_id: u64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub starts_on: String,
    pub ends_on: String,
    pub active: bool,
}

impl From<PromotionRecord> for PromotionDto {
    fn from(r: PromotionRecord) -> Self {
        let p = r.promotion;
        Self {
            promotion_id: r.promotion_id.0,
            provider_id: r.provider_id.0,
            title: p.title,
            description: p.description,
            image: p.image,
            starts_on: p.starts_on.format("%Y-%m-%d").to_string(),
            ends_on: p.ends_on.format("%Y-%m-%d").to_string(),
            active: p.active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRequestDto {
    pub contact_request_id: u64,
    pub provider_id: u64,
    pub recipient_id: u64,
    pub message: String,
    pub status: &'static str,
    pub requested_at_ns: u64,
    pub responded_at_ns: Option<u64>,
}

impl From<ContactRequestRecord> for ContactRequestDto {
    fn from(r: ContactRequestRecord) -> Self {
        Self {
            contact_request_id: r.contact_request_id.0,
            provider_id: r.provider_id.0,
            recipient_id: r.recipient_id.0,
            message: r.message,
            status: r.status.as_str(),
            requested_at_ns: r.requested_at.0,
            responded_at_ns: r.responded_at.map(|t| t.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturedResponse {
    pub featured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactStatusResponse {
    pub status: &'static str,
}

// ------------------------
// Directory and reference data.
// ------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryParams {
    pub categoria: Option<String>,
    pub region: Option<String>,
    pub comuna: Option<String>,
    pub cobertura: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
}

impl DirectoryParams {
    pub fn to_query(&self) -> Result<DirectoryQuery, AdapterError> {
        let coverage = match non_blank(self.cobertura.clone()) {
            Some(c) => Some(Coverage::parse(&c).ok_or_else(|| bad("unknown coverage"))?),
            None => None,
        };
        Ok(DirectoryQuery {
            category: parse_opt_id("categoria", self.categoria.clone())?.map(ProviderCategoryId),
            region: parse_opt_id("region", self.region.clone())?.map(RegionId),
            comuna: parse_opt_id("comuna", self.comuna.clone())?.map(ComunaId),
            coverage,
            text: non_blank(self.q.clone()),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderCardDto {
    #[serde(flatten)]
    pub provider: ProviderDto,
    pub category_names: Vec<String>,
    pub comuna_name: Option<String>,
    pub region_name: Option<String>,
}

impl From<ProviderCard> for ProviderCardDto {
    fn from(c: ProviderCard) -> Self {
        Self {
            provider: (&c.provider).into(),
            category_names: c.category_names,
            comuna_name: c.comuna_name,
            region_name: c.region_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryResponse {
    pub providers: Vec<ProviderCardDto>,
    pub page: PageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderDetailResponse {
    pub provider: ProviderCardDto,
    pub products: Vec<ProductDto>,
    pub promotions: Vec<PromotionDto>,
}

impl From<ProviderDetail> for ProviderDetailResponse {
    fn from(d: ProviderDetail) -> Self {
        Self {
            provider: d.card.into(),
            products: d.products.into_iter().map(Into::into).collect(),
            promotions: d.promotions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRequest {
    pub country_id: u64,
    pub name: String,
    pub code: String,
}

impl CountryRequest {
    pub fn to_record(&self) -> CountryRecord {
        CountryRecord {
            country_id: CountryId(self.country_id),
            name: self.name.trim().to_string(),
            code: self.code.trim().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub region_id: u64,
    pub country_id: u64,
    pub name: String,
}

impl RegionRequest {
    pub fn to_record(&self) -> RegionRecord {
        RegionRecord {
            region_id: RegionId(self.region_id),
            country_id: CountryId(self.country_id),
            name: self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComunaRequest {
    pub comuna_id: u64,
    pub region_id: u64,
    pub name: String,
}

impl ComunaRequest {
    pub fn to_record(&self) -> ComunaRecord {
        ComunaRecord {
            comuna_id: ComunaId(self.comuna_id),
            region_id: RegionId(self.region_id),
            name: self.name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionDto {
    pub region_id: u64,
    pub country_id: u64,
    pub name: String,
}

impl From<&RegionRecord> for RegionDto {
    fn from(r: &RegionRecord) -> Self {
        Self {
            region_id: r.region_id.0,
            country_id: r.country_id.0,
            name: r.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComunaDto {
    pub comuna_id: u64,
    pub name: String,
}

impl From<ComunaRecord> for ComunaDto {
    fn from(c: ComunaRecord) -> Self {
        Self {
            comuna_id: c.comuna_id.0,
            name: c.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub category_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CategoryRequest {
    pub fn to_record(&self) -> ProviderCategoryRecord {
        ProviderCategoryRecord {
            category_id: ProviderCategoryId(self.category_id),
            name: self.name.trim().to_string(),
            description: non_blank(self.description.clone()),
            icon: non_blank(self.icon.clone()),
            active: self.active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryDto {
    pub category_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl From<ProviderCategoryRecord> for CategoryDto {
    fn from(c: ProviderCategoryRecord) -> Self {
        Self {
            category_id: c.category_id.0,
            name: c.name,
            description: c.description,
            icon: c.icon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatusRequest {
    pub active: bool,
    pub verified: bool,
    pub featured: bool,
}

impl From<ProviderStatusRequest> for ProviderStatusFlags {
    fn from(r: ProviderStatusRequest) -> Self {
        Self {
            active: r.active,
            verified: r.verified,
            featured: r.featured,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub journal_enabled: bool,
    pub replayed_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_dto_01_post_request_rejects_link_plus_upload() {
        let req = PostRequest {
            title: "Hola".to_string(),
            content: "Texto".to_string(),
            category: Some("duda".to_string()),
            url_link: Some("https://example.cl/x.png".to_string()),
            uploaded_file_name: Some("x.png".to_string()),
            tags: None,
        };
        assert!(matches!(req.to_draft(), Err(AdapterError::Os(_))));

        let ok = PostRequest {
            uploaded_file_name: None,
            tags: Some("@rosa, #ventas".to_string()),
            ..req
        }
        .to_draft()
        .unwrap();
        assert_eq!(ok.category, PostCategory::Question);
        assert!(ok.tags.hashtags.contains("ventas"));
    }

    #[test]
    fn at_dto_02_register_request_drops_passwords_for_journal() {
        let req = RegisterRequest {
            full_name: "Rosa Martínez".to_string(),
            email: "Rosa@Almacen.cl".to_string(),
            password: "almacen123".to_string(),
            confirm_password: "almacen123".to_string(),
            whatsapp: Some("+56912345678".to_string()),
            relation: "dueno".to_string(),
            business_type: "almacen".to_string(),
            comuna: "NUNOA".to_string(),
        };
        let stripped = req.without_passwords();
        let json = serde_json::to_string(&stripped).unwrap();
        assert!(!json.contains("almacen123"));
        let reg = stripped.to_registration().unwrap();
        assert_eq!(reg.email.as_str(), "rosa@almacen.cl");
        assert_eq!(reg.relation, BusinessRelation::Owner);
    }

    #[test]
    fn at_dto_03_list_queries_parse_spanish_filters() {
        let f = PromotionListQuery {
            estado: Some("activas".to_string()),
            vigencia: Some("vigentes".to_string()),
            desde: Some("2024-09-01".to_string()),
            ..PromotionListQuery::default()
        }
        .to_filter()
        .unwrap();
        assert_eq!(f.active, ActiveFilter::Active);
        assert_eq!(f.validity, PromotionValidity::Current);
        assert_eq!(f.starts_from, NaiveDate::from_ymd_opt(2024, 9, 1));

        let bad_date = PromotionListQuery {
            hasta: Some("01/09/2024".to_string()),
            ..PromotionListQuery::default()
        };
        assert!(matches!(bad_date.to_filter(), Err(AdapterError::BadRequest(_))));

        let q = DirectoryParams {
            categoria: Some("3".to_string()),
            cobertura: Some("Nacional".to_string()),
            ..DirectoryParams::default()
        }
        .to_query()
        .unwrap();
        assert_eq!(q.category, Some(ProviderCategoryId(3)));
        assert_eq!(q.coverage, Some(Coverage::National));
    }
}
