#![forbid(unsafe_code)]

use vecino_kernel_contracts::forum::{CommentId, PostId};
use vecino_kernel_contracts::loyalty::PointsEventKind;
use vecino_kernel_contracts::merchant::MerchantId;
use vecino_kernel_contracts::{MonotonicTimeNs, ReasonCodeId};

pub mod reason_codes {
    use vecino_kernel_contracts::ReasonCodeId;

    pub const POINTS_REGISTRATION: ReasonCodeId = ReasonCodeId(0x5650_0001);
    pub const POINTS_DAILY_LOGIN: ReasonCodeId = ReasonCodeId(0x5650_0002);
    pub const POINTS_POST_PUBLISHED: ReasonCodeId = ReasonCodeId(0x5650_0003);
    pub const POINTS_COMMENT_ADDED: ReasonCodeId = ReasonCodeId(0x5650_0004);
    pub const POINTS_LIKE_RECEIVED: ReasonCodeId = ReasonCodeId(0x5650_0005);
    pub const POINTS_MANUAL_ADJUSTMENT: ReasonCodeId = ReasonCodeId(0x5650_0010);
}

/// Credit earned per activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsRules {
    pub registration: u64,
    pub daily_login: u64,
    pub post_published: u64,
    pub comment_added: u64,
    pub like_received: u64,
}

impl PointsRules {
    pub fn mvp_v1() -> Self {
        Self {
            registration: 20,
            daily_login: 5,
            post_published: 10,
            comment_added: 3,
            like_received: 1,
        }
    }

    /// Manual adjustments carry their own amount and award nothing here.
    pub fn award_for(&self, kind: PointsEventKind) -> u64 {
        match kind {
            PointsEventKind::Registration => self.registration,
            PointsEventKind::DailyLogin => self.daily_login,
            PointsEventKind::PostPublished => self.post_published,
            PointsEventKind::CommentAdded => self.comment_added,
            PointsEventKind::LikeReceived => self.like_received,
            PointsEventKind::ManualAdjustment => 0,
        }
    }

    /// Award for an interaction between `actor` and the owner of the content it
    /// targets. Commenting on or liking your own post earns nothing.
    pub fn award_for_actor(
        &self,
        kind: PointsEventKind,
        actor: MerchantId,
        content_owner: MerchantId,
    ) -> u64 {
        match kind {
            PointsEventKind::CommentAdded | PointsEventKind::LikeReceived
                if actor == content_owner =>
            {
                0
            }
            _ => self.award_for(kind),
        }
    }
}

pub fn reason_code_for(kind: PointsEventKind) -> ReasonCodeId {
    match kind {
        PointsEventKind::Registration => reason_codes::POINTS_REGISTRATION,
        PointsEventKind::DailyLogin => reason_codes::POINTS_DAILY_LOGIN,
        PointsEventKind::PostPublished => reason_codes::POINTS_POST_PUBLISHED,
        PointsEventKind::CommentAdded => reason_codes::POINTS_COMMENT_ADDED,
        PointsEventKind::LikeReceived => reason_codes::POINTS_LIKE_RECEIVED,
        PointsEventKind::ManualAdjustment => reason_codes::POINTS_MANUAL_ADJUSTMENT,
    }
}

// Idempotency keys. Each activity credits a member at most once per key.

pub fn registration_key() -> String {
    "registration".to_string()
}

pub fn daily_login_key(now: MonotonicTimeNs) -> String {
    format!("login:{}", now.utc_day_index())
}

pub fn post_key(post_id: PostId) -> String {
    format!("post:{}", post_id.0)
}

pub fn comment_key(comment_id: CommentId) -> String {
    format!("comment:{}", comment_id.0)
}

pub fn like_key(post_id: PostId, liker: MerchantId) -> String {
    format!("like:{}:{}", post_id.0, liker.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_points_01_mvp_awards() {
        let rules = PointsRules::mvp_v1();
        assert_eq!(rules.award_for(PointsEventKind::Registration), 20);
        assert_eq!(rules.award_for(PointsEventKind::DailyLogin), 5);
        assert_eq!(rules.award_for(PointsEventKind::PostPublished), 10);
        assert_eq!(rules.award_for(PointsEventKind::CommentAdded), 3);
        assert_eq!(rules.award_for(PointsEventKind::LikeReceived), 1);
        assert_eq!(rules.award_for(PointsEventKind::ManualAdjustment), 0);
    }

    #[test]
    fn at_points_02_self_interactions_earn_nothing() {
        let rules = PointsRules::mvp_v1();
        let a = MerchantId(1);
        let b = MerchantId(2);
        assert_eq!(rules.award_for_actor(PointsEventKind::CommentAdded, a, a), 0);
        assert_eq!(rules.award_for_actor(PointsEventKind::LikeReceived, a, a), 0);
        assert_eq!(rules.award_for_actor(PointsEventKind::CommentAdded, a, b), 3);
        assert_eq!(rules.award_for_actor(PointsEventKind::LikeReceived, b, a), 1);
        assert_eq!(rules.award_for_actor(PointsEventKind::PostPublished, a, a), 10);
    }

    #[test]
    fn at_points_03_login_key_changes_at_utc_midnight() {
        let day_ns = 86_400 * 1_000_000_000u64;
        let late = MonotonicTimeNs(20_000 * day_ns - 1);
        let early = MonotonicTimeNs(20_000 * day_ns);
        assert_eq!(daily_login_key(late), "login:19999");
        assert_eq!(daily_login_key(early), "login:20000");
    }

    #[test]
    fn at_points_04_reason_codes_are_distinct() {
        let mut codes: Vec<u32> = [
            PointsEventKind::Registration,
            PointsEventKind::DailyLogin,
            PointsEventKind::PostPublished,
            PointsEventKind::CommentAdded,
            PointsEventKind::LikeReceived,
            PointsEventKind::ManualAdjustment,
        ]
        .iter()
        .map(|k| reason_code_for(*k).0)
        .collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 6);
    }
}
