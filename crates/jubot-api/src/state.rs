//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 토큰 캐시, 호출 제한기, 일괄 조회기는 프로세스당 하나씩 만들어 `Arc`로 공유합니다.

use jubot_core::AppConfig;
use jubot_exchange::connector::kis::{build_http_client, KisTokenIssuer};
use jubot_exchange::{
    BatchConfig, BatchFetcher, ExchangeError, IndexSource, KisConfig, KisEnvironment, KisOAuth,
    KisQuoteSource, KisTransport, QuoteSource, RateLimiter, RateLimiterConfig,
};
use std::sync::Arc;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// KIS 호출 제한기 (모든 업스트림 요청이 공유)
    pub limiter: Arc<RateLimiter>,

    /// 시세 소스 (KIS 미설정 시 `None`)
    pub quotes: Option<Arc<dyn QuoteSource>>,

    /// 지수 소스 (KIS 미설정 시 `None`)
    pub indices: Option<Arc<dyn IndexSource>>,

    /// 일괄 조회기 (KIS 미설정 시 `None`)
    pub batch: Option<Arc<BatchFetcher>>,

    /// KIS 토큰 캐시 (KIS 미설정 시 `None`)
    pub oauth: Option<Arc<KisOAuth>>,

    /// KIS 환경
    pub kis_environment: Option<KisEnvironment>,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// KIS 연동 없이 생성.
    ///
    /// 시세 엔드포인트는 `503 KIS_NOT_CONFIGURED`를 반환합니다.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(RateLimiterConfig::from(&config.rate_limit))),
            quotes: None,
            indices: None,
            batch: None,
            oauth: None,
            kis_environment: None,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// KIS 연동 상태 생성.
    ///
    /// `rate_limit.throttle_token_issue`가 켜져 있으면 토큰 발급 요청도 시세 요청과
    /// 같은 호출 제한기를 거칩니다.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 에러를 반환합니다.
    pub fn with_kis(config: &AppConfig, kis: KisConfig) -> Result<Self, ExchangeError> {
        let state = Self::new(config);
        let client = build_http_client(&kis)?;
        let environment = kis.environment;

        let mut issuer = KisTokenIssuer::new(kis.clone(), client.clone());
        if config.rate_limit.throttle_token_issue {
            issuer = issuer.with_limiter(Arc::clone(&state.limiter));
        }
        let oauth = Arc::new(KisOAuth::with_issuer(kis, Arc::new(issuer)));

        let transport = KisTransport::new(Arc::clone(&oauth), Arc::clone(&state.limiter), client);
        let kis_source = Arc::new(KisQuoteSource::from_transport(transport));
        let source: Arc<dyn QuoteSource> = kis_source.clone();

        Ok(Self {
            oauth: Some(oauth),
            kis_environment: Some(environment),
            ..state
                .with_quote_source(source, BatchConfig::from(&config.batch))
                .with_index_source(kis_source)
        })
    }

    /// 시세 소스와 일괄 조회기 설정.
    pub fn with_quote_source(mut self, source: Arc<dyn QuoteSource>, batch: BatchConfig) -> Self {
        self.batch = Some(Arc::new(BatchFetcher::new(Arc::clone(&source), batch)));
        self.quotes = Some(source);
        self
    }

    /// 지수 소스 설정.
    pub fn with_index_source(mut self, source: Arc<dyn IndexSource>) -> Self {
        self.indices = Some(source);
        self
    }

    /// 시세 조회 가능 여부.
    pub fn has_quote_source(&self) -> bool {
        self.quotes.is_some()
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}

/// 테스트용 상태 생성 (시세 소스 없음).
#[cfg(test)]
pub fn create_test_state() -> AppState {
    AppState::new(&AppConfig::default())
}
