//! 使用量プラン（スロットリング・クォータ）ミドルウェア
//!
//! API Gatewayの使用量プランを再現する。
//! - rate/burst: トークンバケット（governor）で超過時は429 Too Many Requests
//! - 日次クォータ: UTC日付ごとのカウンターで超過時は429 Limit Exceeded
//! - /healthエンドポイントは対象外

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, Utc};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};

use crate::error::ApiError;

/// 単一キー向けのレートリミッター
type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// デフォルトの定常レート（リクエスト/秒）
pub const DEFAULT_RATE_LIMIT: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// デフォルトのバースト上限
pub const DEFAULT_BURST_LIMIT: NonZeroU32 = NonZeroU32::new(200).unwrap();

/// デフォルトの日次クォータ
pub const DEFAULT_QUOTA_LIMIT: NonZeroU32 = NonZeroU32::new(1000).unwrap();

/// 使用量プラン
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsagePlan {
    /// 定常レート（リクエスト/秒）
    pub rate_limit: NonZeroU32,
    /// バースト上限
    pub burst_limit: NonZeroU32,
    /// 1日あたりのリクエスト上限
    pub quota_limit: NonZeroU32,
}

impl UsagePlan {
    /// Terraformで設定している値（rate 100, burst 200, quota 1000/日）
    pub fn default_plan() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            burst_limit: DEFAULT_BURST_LIMIT,
            quota_limit: DEFAULT_QUOTA_LIMIT,
        }
    }
}

/// 日次クォータのカウンター
#[derive(Debug)]
struct DailyQuota {
    /// カウント対象の日付（UTC）
    date: NaiveDate,
    /// 使用済みリクエスト数
    used: u32,
}

/// 使用量プランの状態
///
/// axumのStateとして共有される。クローンしても同じカウンターを参照する。
#[derive(Clone)]
pub struct ThrottleState {
    plan: UsagePlan,
    limiter: Arc<DirectRateLimiter>,
    quota: Arc<Mutex<DailyQuota>>,
}

/// スロットリング判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// 通過
    Allowed,
    /// rate/burst超過
    RateLimited,
    /// 日次クォータ超過
    QuotaExceeded,
}

impl ThrottleState {
    /// 使用量プランから状態を作成
    pub fn new(plan: UsagePlan) -> Self {
        let quota = Quota::per_second(plan.rate_limit).allow_burst(plan.burst_limit);

        Self {
            plan,
            limiter: Arc::new(RateLimiter::direct(quota)),
            quota: Arc::new(Mutex::new(DailyQuota {
                date: Utc::now().date_naive(),
                used: 0,
            })),
        }
    }

    /// 使用量プランを取得
    pub fn plan(&self) -> UsagePlan {
        self.plan
    }

    /// 指定日付でリクエストを1件判定する
    ///
    /// rate/burstを先に判定し、通過したリクエストだけをクォータに数える。
    /// 日付が変わったらクォータをリセットする。
    pub fn check(&self, today: NaiveDate) -> ThrottleDecision {
        if self.limiter.check().is_err() {
            return ThrottleDecision::RateLimited;
        }

        let mut quota = self.quota.lock().unwrap_or_else(|e| e.into_inner());
        if quota.date != today {
            quota.date = today;
            quota.used = 0;
        }

        if quota.used >= self.plan.quota_limit.get() {
            return ThrottleDecision::QuotaExceeded;
        }

        quota.used += 1;
        ThrottleDecision::Allowed
    }

    /// 当日の残りクォータ
    pub fn remaining_quota(&self, today: NaiveDate) -> u32 {
        let quota = self.quota.lock().unwrap_or_else(|e| e.into_inner());
        if quota.date != today {
            return self.plan.quota_limit.get();
        }
        self.plan.quota_limit.get().saturating_sub(quota.used)
    }
}

/// 使用量プランミドルウェア
///
/// 認証ミドルウェアの後段で実行される前提（APIキーごとのプランを再現するため）。
pub async fn throttle_middleware(
    State(state): State<ThrottleState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let today = Utc::now().date_naive();
    let plan = state.plan();

    match state.check(today) {
        ThrottleDecision::Allowed => {
            tracing::debug!(remaining_quota = state.remaining_quota(today), "使用量プランを通過");
            next.run(request).await
        }
        ThrottleDecision::RateLimited => {
            tracing::warn!(
                rate_limit = plan.rate_limit.get(),
                burst_limit = plan.burst_limit.get(),
                "レート制限超過"
            );
            ApiError::too_many_requests().into_response()
        }
        ThrottleDecision::QuotaExceeded => {
            tracing::warn!(quota_limit = plan.quota_limit.get(), "日次クォータ超過");
            ApiError::limit_exceeded().into_response()
        }
    }
}
