//! 헬스 체크 endpoint.
//!
//! 로드밸런서나 오케스트레이션 시스템(Kubernetes 등)에서 사용됩니다.

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router,
};
use jubot_exchange::KisEnvironment;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 준비 상태 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// "ready" | "not_ready"
    pub status: String,
    /// API 버전
    pub version: String,
    /// 서버 업타임(초)
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    /// KIS 연동 상태
    pub kis: KisStatus,
    /// 호출 제한기 부하
    pub rate_limiter: LimiterStatus,
}

/// KIS 연동 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct KisStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// 캐시된 토큰이 아직 유효한지
    pub token_cached: bool,
}

/// 호출 제한기 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct LimiterStatus {
    pub in_flight: usize,
    pub queued: usize,
    pub max_concurrency: usize,
}

fn environment_label(env: KisEnvironment) -> &'static str {
    match env {
        KisEnvironment::Real => "real",
        KisEnvironment::Paper => "paper",
    }
}

/// 간단한 헬스 체크 (liveness probe용).
///
/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// 준비 상태 확인 (readiness probe용).
///
/// KIS 자격증명이 없으면 503을 반환합니다.
/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let token_cached = match &state.oauth {
        Some(oauth) => oauth.has_valid_token().await,
        None => false,
    };
    let configured = state.has_quote_source();

    let response = ReadyResponse {
        status: if configured { "ready" } else { "not_ready" }.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        kis: KisStatus {
            configured,
            environment: state
                .kis_environment
                .map(|env| environment_label(env).to_string()),
            token_cached,
        },
        rate_limiter: LimiterStatus {
            in_flight: state.limiter.in_flight(),
            queued: state.limiter.queued(),
            max_concurrency: state.limiter.config().max_concurrency,
        },
    };

    let status_code = if configured {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        let app = Router::new().route("/health", get(health_check));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_without_kis_is_unavailable() {
        let app = Router::new()
            .route("/health/ready", get(health_ready))
            .with_state(Arc::new(create_test_state()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ReadyResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, "not_ready");
        assert!(!body.kis.configured);
        assert_eq!(body.rate_limiter.max_concurrency, 10);
        assert_eq!(body.rate_limiter.in_flight, 0);
    }
}
