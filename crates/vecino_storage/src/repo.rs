#![forbid(unsafe_code)]

use vecino_kernel_contracts::benefit::{BenefitDraft, BenefitId, RedemptionId};
use vecino_kernel_contracts::forum::{CommentDraft, CommentId, PostDraft, PostId};
use vecino_kernel_contracts::loyalty::{
    MemberLoyaltyRecord, PointsLedgerEvent, PointsLedgerEventInput, TierCode,
};
use vecino_kernel_contracts::merchant::{
    Email, MerchantId, MerchantRegistration, ProfileUpdate, SessionToken,
};
use vecino_kernel_contracts::provider::{
    ContactRequestDraft, ContactRequestId, ContactRequestStatus, ProductDraft, ProductId,
    PromotionDraft, PromotionId, ProviderId, ProviderProfileDraft,
};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;

use crate::store::{
    BenefitRecord, CommentRecord, ContactRequestRecord, MerchantRecord, PointsAppend,
    PostRecord, ProductRecord, PromotionRecord, ProviderRecord, SessionRecord, StorageError,
    VecinoStore,
};

/// Typed repository interface for merchant accounts and sessions.
pub trait MerchantRepo {
    fn insert_merchant_row(
        &mut self,
        tenant_id: TenantId,
        registration: &MerchantRegistration,
        password_hash: String,
        now: MonotonicTimeNs,
    ) -> Result<MerchantId, StorageError>;
    fn merchant_row(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MerchantRecord>;
    fn merchant_row_by_email(&self, tenant_id: &TenantId, email: &Email) -> Option<&MerchantRecord>;
    fn update_merchant_profile_row(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        update: &ProfileUpdate,
    ) -> Result<(), StorageError>;
    fn insert_session_row(
        &mut self,
        token: &SessionToken,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn session_row(&self, token: &SessionToken) -> Option<&SessionRecord>;
    fn remove_session_row(&mut self, token: &SessionToken) -> bool;
}

/// Typed repository interface for the points ledger and its loyalty projection.
pub trait PointsLedgerRepo {
    fn append_points_row(
        &mut self,
        input: PointsLedgerEventInput,
    ) -> Result<PointsAppend, StorageError>;
    fn points_rows(&self) -> &[PointsLedgerEvent];
    fn member_loyalty_row(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MemberLoyaltyRecord>;
    fn rebuild_member_loyalty_rows(&mut self);
}

pub trait ForumRepo {
    fn insert_post_row(
        &mut self,
        tenant_id: &TenantId,
        author_id: MerchantId,
        draft: &PostDraft,
        now: MonotonicTimeNs,
    ) -> Result<PostId, StorageError>;
    fn post_rows_newest_first(&self, tenant_id: &TenantId) -> Vec<&PostRecord>;
    fn insert_comment_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        author_id: MerchantId,
        draft: &CommentDraft,
        now: MonotonicTimeNs,
    ) -> Result<CommentId, StorageError>;
    fn comment_rows(&self, tenant_id: &TenantId, post_id: PostId) -> Vec<&CommentRecord>;
    fn insert_like_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> Result<(), StorageError>;
    fn remove_like_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> bool;
}

pub trait ProviderRepo {
    fn insert_provider_row(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProviderId, StorageError>;
    fn provider_row_for_merchant(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&ProviderRecord>;
    fn insert_product_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProductId, StorageError>;
    fn product_rows(&self, tenant_id: &TenantId, provider_id: ProviderId) -> Vec<&ProductRecord>;
    fn insert_promotion_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        promotion: PromotionDraft,
        now: MonotonicTimeNs,
    ) -> Result<PromotionId, StorageError>;
    fn promotion_rows(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Vec<&PromotionRecord>;
    fn insert_contact_request_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        recipient_id: MerchantId,
        draft: &ContactRequestDraft,
        now: MonotonicTimeNs,
    ) -> Result<ContactRequestId, StorageError>;
    fn set_contact_request_status_row(
        &mut self,
        tenant_id: &TenantId,
        contact_request_id: ContactRequestId,
        status: ContactRequestStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError>;
    fn contact_request_rows_for_recipient(
        &self,
        tenant_id: &TenantId,
        recipient_id: MerchantId,
    ) -> Vec<&ContactRequestRecord>;
}

pub trait BenefitRepo {
    fn insert_benefit_row(
        &mut self,
        tenant_id: &TenantId,
        benefit: BenefitDraft,
        now: MonotonicTimeNs,
    ) -> Result<BenefitId, StorageError>;
    fn benefit_rows(&self, tenant_id: &TenantId) -> Vec<&BenefitRecord>;
    fn insert_redemption_row(
        &mut self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
        tier_at_redemption: TierCode,
        points_at_redemption: u64,
        now: MonotonicTimeNs,
    ) -> Result<RedemptionId, StorageError>;
    fn redemption_exists(
        &self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
    ) -> bool;
}

impl MerchantRepo for VecinoStore {
    fn insert_merchant_row(
        &mut self,
        tenant_id: TenantId,
        registration: &MerchantRegistration,
        password_hash: String,
        now: MonotonicTimeNs,
    ) -> Result<MerchantId, StorageError> {
        self.insert_merchant(tenant_id, registration, password_hash, now)
    }

    fn merchant_row(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MerchantRecord> {
        self.merchant(tenant_id, merchant_id)
    }

    fn merchant_row_by_email(
        &self,
        tenant_id: &TenantId,
        email: &Email,
    ) -> Option<&MerchantRecord> {
        self.merchant_by_email(tenant_id, email)
    }

    fn update_merchant_profile_row(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        update: &ProfileUpdate,
    ) -> Result<(), StorageError> {
        self.update_merchant_profile(tenant_id, merchant_id, update)
    }

    fn insert_session_row(
        &mut self,
        token: &SessionToken,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.insert_session(token, tenant_id, merchant_id, now)
    }

    fn session_row(&self, token: &SessionToken) -> Option<&SessionRecord> {
        self.session(token)
    }

    fn remove_session_row(&mut self, token: &SessionToken) -> bool {
        self.remove_session(token)
    }
}

impl PointsLedgerRepo for VecinoStore {
    fn append_points_row(
        &mut self,
        input: PointsLedgerEventInput,
    ) -> Result<PointsAppend, StorageError> {
        self.append_points_event(input)
    }

    fn points_rows(&self) -> &[PointsLedgerEvent] {
        self.points_ledger()
    }

    fn member_loyalty_row(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&MemberLoyaltyRecord> {
        self.member_loyalty(tenant_id, merchant_id)
    }

    fn rebuild_member_loyalty_rows(&mut self) {
        self.rebuild_member_loyalty_from_ledger()
    }
}

impl ForumRepo for VecinoStore {
    fn insert_post_row(
        &mut self,
        tenant_id: &TenantId,
        author_id: MerchantId,
        draft: &PostDraft,
        now: MonotonicTimeNs,
    ) -> Result<PostId, StorageError> {
        self.insert_post(tenant_id, author_id, draft, now)
    }

    fn post_rows_newest_first(&self, tenant_id: &TenantId) -> Vec<&PostRecord> {
        self.posts_newest_first(tenant_id)
    }

    fn insert_comment_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        author_id: MerchantId,
        draft: &CommentDraft,
        now: MonotonicTimeNs,
    ) -> Result<CommentId, StorageError> {
        self.insert_comment(tenant_id, post_id, author_id, draft, now)
    }

    fn comment_rows(&self, tenant_id: &TenantId, post_id: PostId) -> Vec<&CommentRecord> {
        self.comments_oldest_first(tenant_id, post_id)
    }

    fn insert_like_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> Result<(), StorageError> {
        self.insert_like(tenant_id, post_id, merchant_id)
    }

    fn remove_like_row(
        &mut self,
        tenant_id: &TenantId,
        post_id: PostId,
        merchant_id: MerchantId,
    ) -> bool {
        self.remove_like(tenant_id, post_id, merchant_id)
    }
}

impl ProviderRepo for VecinoStore {
    fn insert_provider_row(
        &mut self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
        profile: ProviderProfileDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProviderId, StorageError> {
        self.insert_provider(tenant_id, merchant_id, profile, now)
    }

    fn provider_row_for_merchant(
        &self,
        tenant_id: &TenantId,
        merchant_id: MerchantId,
    ) -> Option<&ProviderRecord> {
        self.provider_for_merchant(tenant_id, merchant_id)
    }

    fn insert_product_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        product: ProductDraft,
        now: MonotonicTimeNs,
    ) -> Result<ProductId, StorageError> {
        self.insert_product(tenant_id, provider_id, product, now)
    }

    fn product_rows(&self, tenant_id: &TenantId, provider_id: ProviderId) -> Vec<&ProductRecord> {
        self.products_for_provider(tenant_id, provider_id)
    }

    fn insert_promotion_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        promotion: PromotionDraft,
        now: MonotonicTimeNs,
    ) -> Result<PromotionId, StorageError> {
        self.insert_promotion(tenant_id, provider_id, promotion, now)
    }

    fn promotion_rows(
        &self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
    ) -> Vec<&PromotionRecord> {
        self.promotions_for_provider(tenant_id, provider_id)
    }

    fn insert_contact_request_row(
        &mut self,
        tenant_id: &TenantId,
        provider_id: ProviderId,
        recipient_id: MerchantId,
        draft: &ContactRequestDraft,
        now: MonotonicTimeNs,
    ) -> Result<ContactRequestId, StorageError> {
        self.insert_contact_request(tenant_id, provider_id, recipient_id, draft, now)
    }

    fn set_contact_request_status_row(
        &mut self,
        tenant_id: &TenantId,
        contact_request_id: ContactRequestId,
        status: ContactRequestStatus,
        now: MonotonicTimeNs,
    ) -> Result<(), StorageError> {
        self.set_contact_request_status(tenant_id, contact_request_id, status, now)
    }

    fn contact_request_rows_for_recipient(
        &self,
        tenant_id: &TenantId,
        recipient_id: MerchantId,
    ) -> Vec<&ContactRequestRecord> {
        self.contact_requests_for_recipient(tenant_id, recipient_id)
    }
}

impl BenefitRepo for VecinoStore {
    fn insert_benefit_row(
        &mut self,
        tenant_id: &TenantId,
        benefit: BenefitDraft,
        now: MonotonicTimeNs,
    ) -> Result<BenefitId, StorageError> {
        self.insert_benefit(tenant_id, benefit, now)
    }

    fn benefit_rows(&self, tenant_id: &TenantId) -> Vec<&BenefitRecord> {
        self.benefits(tenant_id)
    }

    fn insert_redemption_row(
        &mut self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
        tier_at_redemption: TierCode,
        points_at_redemption: u64,
        now: MonotonicTimeNs,
    ) -> Result<RedemptionId, StorageError> {
        self.insert_redemption(
            tenant_id,
            benefit_id,
            merchant_id,
            tier_at_redemption,
            points_at_redemption,
            now,
        )
    }

    fn redemption_exists(
        &self,
        tenant_id: &TenantId,
        benefit_id: BenefitId,
        merchant_id: MerchantId,
    ) -> bool {
        self.has_redeemed(tenant_id, benefit_id, merchant_id)
    }
}
