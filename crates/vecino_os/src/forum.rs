#![forbid(unsafe_code)]

use tracing::info;
use vecino_engines::points::{comment_key, like_key, post_key};
use vecino_kernel_contracts::forum::{CategoryFilter, CommentDraft, CommentId, PostDraft, PostId};
use vecino_kernel_contracts::loyalty::PointsEventKind;
use vecino_kernel_contracts::merchant::{MerchantId, SessionContext};
use vecino_kernel_contracts::tenant::TenantId;
use vecino_kernel_contracts::MonotonicTimeNs;
use vecino_storage::store::{CommentRecord, PostRecord, VecinoStore};

use crate::error::OsError;
use crate::loyalty::{applied_points, LoyaltyFlow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorView {
    pub merchant_id: MerchantId,
    pub full_name: String,
    pub business_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub post: PostRecord,
    pub author: AuthorView,
    pub like_count: usize,
    pub comment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub comment: CommentRecord,
    pub author: AuthorView,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub summary: PostSummary,
    /// Oldest first.
    pub comments: Vec<CommentView>,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published<T> {
    pub id: T,
    pub points_awarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: usize,
    /// Credited to the post author.
    pub points_awarded: u64,
}

fn author_view(store: &VecinoStore, tenant_id: &TenantId, merchant_id: MerchantId) -> AuthorView {
    match store.merchant(tenant_id, merchant_id) {
        Some(m) => AuthorView {
            merchant_id,
            full_name: m.full_name.clone(),
            business_name: m.business_name.clone(),
        },
        None => AuthorView {
            merchant_id,
            full_name: String::new(),
            business_name: String::new(),
        },
    }
}

fn summarize(store: &VecinoStore, post: &PostRecord) -> PostSummary {
    PostSummary {
        author: author_view(store, &post.tenant_id, post.author_id),
        like_count: store.like_count(&post.tenant_id, post.post_id),
        comment_count: store.comment_count(&post.tenant_id, post.post_id),
        post: post.clone(),
    }
}

#[derive(Debug, Clone)]
pub struct ForumFlow {
    loyalty: LoyaltyFlow,
}

impl ForumFlow {
    pub fn new(loyalty: LoyaltyFlow) -> Self {
        Self { loyalty }
    }

    pub fn publish_post(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        draft: &PostDraft,
        now: MonotonicTimeNs,
    ) -> Result<Published<PostId>, OsError> {
        let post_id = store.insert_post(&ctx.tenant_id, ctx.merchant_id, draft, now)?;
        let points_awarded = self.loyalty.award_event(
            store,
            &ctx.tenant_id,
            ctx.merchant_id,
            PointsEventKind::PostPublished,
            post_key(post_id),
            now,
        )?;
        info!(
            tenant = ctx.tenant_id.as_str(),
            merchant_id = ctx.merchant_id.0,
            post_id = post_id.0,
            category = draft.category.as_str(),
            "post published"
        );
        Ok(Published {
            id: post_id,
            points_awarded,
        })
    }

    /// Newest first, narrowed by category.
    pub fn feed(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        filter: &CategoryFilter,
    ) -> Vec<PostSummary> {
        store
            .posts_newest_first(tenant_id)
            .into_iter()
            .filter(|p| filter.matches(p.category))
            .map(|p| summarize(store, p))
            .collect()
    }

    pub fn post_detail(
        &self,
        store: &VecinoStore,
        tenant_id: &TenantId,
        post_id: PostId,
        viewer: Option<MerchantId>,
    ) -> Result<PostDetail, OsError> {
        let post = store
            .post(tenant_id, post_id)
            .ok_or(OsError::NotFound("post"))?;
        let comments = store
            .comments_oldest_first(tenant_id, post_id)
            .into_iter()
            .map(|c| CommentView {
                author: author_view(store, tenant_id, c.author_id),
                comment: c.clone(),
            })
            .collect();
        Ok(PostDetail {
            summary: summarize(store, post),
            comments,
            liked_by_viewer: viewer.is_some_and(|v| store.has_liked(tenant_id, post_id, v)),
        })
    }

    /// The commenter earns points only on someone else's post.
    pub fn add_comment(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        post_id: PostId,
        draft: &CommentDraft,
        now: MonotonicTimeNs,
    ) -> Result<Published<CommentId>, OsError> {
        let author = store
            .post(&ctx.tenant_id, post_id)
            .ok_or(OsError::NotFound("post"))?
            .author_id;
        let comment_id =
            store.insert_comment(&ctx.tenant_id, post_id, ctx.merchant_id, draft, now)?;
        let points = self.loyalty.rules().award_for_actor(
            PointsEventKind::CommentAdded,
            ctx.merchant_id,
            author,
        );
        let out = self.loyalty.credit(
            store,
            &ctx.tenant_id,
            ctx.merchant_id,
            PointsEventKind::CommentAdded,
            points,
            Some(comment_key(comment_id)),
            now,
        )?;
        Ok(Published {
            id: comment_id,
            points_awarded: applied_points(out, points),
        })
    }

    /// Likes or unlikes. The author is credited once per (post, liker), so an
    /// unlike/like cycle does not farm points.
    pub fn toggle_like(
        &self,
        store: &mut VecinoStore,
        ctx: &SessionContext,
        post_id: PostId,
        now: MonotonicTimeNs,
    ) -> Result<LikeToggle, OsError> {
        let author = store
            .post(&ctx.tenant_id, post_id)
            .ok_or(OsError::NotFound("post"))?
            .author_id;

        if store.remove_like(&ctx.tenant_id, post_id, ctx.merchant_id) {
            return Ok(LikeToggle {
                liked: false,
                like_count: store.like_count(&ctx.tenant_id, post_id),
                points_awarded: 0,
            });
        }

        store.insert_like(&ctx.tenant_id, post_id, ctx.merchant_id)?;
        let points = self.loyalty.rules().award_for_actor(
            PointsEventKind::LikeReceived,
            ctx.merchant_id,
            author,
        );
        let out = self.loyalty.credit(
            store,
            &ctx.tenant_id,
            author,
            PointsEventKind::LikeReceived,
            points,
            Some(like_key(post_id, ctx.merchant_id)),
            now,
        )?;
        Ok(LikeToggle {
            liked: true,
            like_count: store.like_count(&ctx.tenant_id, post_id),
            points_awarded: applied_points(out, points),
        })
    }
}
