//! KIS OAuth 2.0 인증 모듈.
//!
//! 처리 기능:
//! - 접근 토큰 발급 (POST /oauth2/tokenP)
//! - 만료 전 갱신, 진행 중인 갱신 공유 (실패 포함)
//! - 토큰 저장소를 통한 재시작 간 재사용
//! - 인증 헤더 생성

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::config::KisConfig;
use super::token_store::{FileTokenStore, TokenStore};
use crate::clock::{Clock, SystemClock};
use crate::rate_limiter::RateLimiter;
use crate::ExchangeError;

/// KIS OAuth 토큰 응답.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// 접근 토큰
    #[serde(default)]
    pub access_token: String,
    /// 토큰 타입 (항상 "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// 토큰 만료 시간 (초)
    #[serde(default)]
    pub expires_in: i64,
    /// 접근 토큰 만료 시각 (KIS 형식: "YYYY-MM-DD HH:MM:SS")
    #[serde(default)]
    pub access_token_token_expired: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// KIS OAuth 오류 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
pub struct KisOAuthErrorResponse {
    /// 에러 코드 (예: "EGW00103")
    pub error_code: String,
    /// 에러 설명
    pub error_description: String,
}

/// 만료 추적이 포함된 토큰 상태.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입
    pub token_type: String,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 새 토큰 상태 생성.
    pub fn new(access_token: String, token_type: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type,
            expires_at,
        }
    }

    /// `now` 기준으로 `margin` 이상 유효 기간이 남아 있는지 확인.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now < self.expires_at - margin
    }

    /// `now` 기준으로 아직 만료되지 않았는지 확인.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// 인증 헤더 값 반환.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// 접근 토큰 발급자.
///
/// 실제 구현은 [`KisTokenIssuer`]이며 테스트에서는 가짜 발급자로 대체합니다.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// 새 토큰 발급.
    async fn issue(&self) -> Result<TokenState, ExchangeError>;
}

/// `POST /oauth2/tokenP`를 호출하는 토큰 발급자.
pub struct KisTokenIssuer {
    config: KisConfig,
    client: Client,
    limiter: Option<Arc<RateLimiter>>,
}

impl KisTokenIssuer {
    /// 새 발급자 생성.
    pub fn new(config: KisConfig, client: Client) -> Self {
        Self {
            config,
            client,
            limiter: None,
        }
    }

    /// 발급 요청도 호출 제한기를 거치도록 설정.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    async fn request(&self) -> Result<(reqwest::StatusCode, String), ExchangeError> {
        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            appkey: &'a str,
            appsecret: &'a str,
        }

        let url = format!("{}/oauth2/tokenP", self.config.rest_base_url());
        let request_body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
        };

        let send = || async {
            let response = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json; charset=utf-8")
                .json(&request_body)
                .send()
                .await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, ExchangeError>((status, body))
        };

        match &self.limiter {
            Some(limiter) => limiter.add(send).await,
            None => send().await,
        }
    }
}

#[async_trait]
impl TokenIssuer for KisTokenIssuer {
    async fn issue(&self) -> Result<TokenState, ExchangeError> {
        self.config.validate()?;

        info!(app_key = %self.config.masked_app_key(), "Requesting new KIS access token");

        let (status, body) = self.request().await?;

        if !status.is_success() {
            error!(status = %status, "Token request failed: {}", body);

            if let Ok(oauth_error) = serde_json::from_str::<KisOAuthErrorResponse>(&body) {
                let message = match oauth_error.error_code.as_str() {
                    "EGW00103" => "유효하지 않은 AppKey입니다.".to_string(),
                    "EGW00102" => "AppKey가 만료되었습니다.".to_string(),
                    "EGW00101" => "AppSecret이 일치하지 않습니다.".to_string(),
                    "EGW00133" => "토큰 발급 한도(1분당 1회)를 초과했습니다.".to_string(),
                    _ => format!(
                        "{} ({})",
                        oauth_error.error_description, oauth_error.error_code
                    ),
                };
                return Err(ExchangeError::Unauthorized(message));
            }

            return Err(ExchangeError::Unauthorized(format!(
                "Token request failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        if token_resp.access_token.is_empty() {
            return Err(ExchangeError::Unauthorized(
                "Token response did not contain an access token".to_string(),
            ));
        }

        let expires_at = token_resp
            .access_token_token_expired
            .as_deref()
            .and_then(parse_kis_datetime)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(token_resp.expires_in));

        Ok(TokenState::new(
            token_resp.access_token,
            token_resp.token_type,
            expires_at,
        ))
    }
}

/// 진행 중인 토큰 갱신. 합류한 호출자 모두 같은 결과를 받습니다.
type RefreshFuture = Shared<BoxFuture<'static, Result<TokenState, ExchangeError>>>;

/// KIS OAuth 인증 관리자.
///
/// 토큰 슬롯 하나를 모든 호출자가 공유합니다. 갱신이 필요하면 공유 future 하나를
/// `inflight` 슬롯에 두고, 그동안 도착한 호출자는 새 요청 없이 같은 future를
/// 기다립니다. 갱신이 끝나면 성공 여부와 관계없이 슬롯을 비웁니다.
pub struct KisOAuth {
    config: KisConfig,
    issuer: Arc<dyn TokenIssuer>,
    store: Option<Arc<dyn TokenStore>>,
    clock: Arc<dyn Clock>,
    token: Arc<RwLock<Option<TokenState>>>,
    inflight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl KisOAuth {
    /// 새로운 OAuth 관리자 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: KisConfig) -> Result<Self, ExchangeError> {
        let client = build_http_client(&config)?;
        let issuer = KisTokenIssuer::new(config.clone(), client);
        Ok(Self::with_issuer(config, Arc::new(issuer)))
    }

    /// 발급자를 지정하여 생성.
    ///
    /// 설정에 `token_cache_path`가 있으면 파일 저장소를 사용합니다.
    pub fn with_issuer(config: KisConfig, issuer: Arc<dyn TokenIssuer>) -> Self {
        let store = config
            .token_cache_path
            .clone()
            .map(|path| Arc::new(FileTokenStore::new(path)) as Arc<dyn TokenStore>);

        Self {
            config,
            issuer,
            store,
            clock: Arc::new(SystemClock),
            token: Arc::new(RwLock::new(None)),
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    /// 토큰 저장소 설정.
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 시계 설정.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn refresh_margin(&self) -> Duration {
        Duration::seconds(self.config.token_refresh_margin_secs)
    }

    async fn cached_fresh_token(&self) -> Option<TokenState> {
        let token_guard = self.token.read().await;
        token_guard
            .as_ref()
            .filter(|t| t.is_fresh(self.clock.now(), self.refresh_margin()))
            .cloned()
    }

    /// 유효한 접근 토큰 반환, 필요시 갱신.
    ///
    /// 갱신 중에 들어온 호출은 진행 중인 갱신에 합류하므로, 동시 호출 수와 관계없이
    /// 업스트림 발급 요청은 한 번입니다. 갱신이 실패하면 합류한 호출 모두 같은 에러를
    /// 받습니다.
    pub async fn get_token(&self) -> Result<TokenState, ExchangeError> {
        if let Some(token) = self.cached_fresh_token().await {
            return Ok(token);
        }

        let refresh = {
            let mut slot = self.inflight.lock().await;

            // 직전에 끝난 갱신이 캐시를 채웠을 수 있음
            if let Some(token) = self.cached_fresh_token().await {
                debug!(expires_at = %token.expires_at, "Using KIS token refreshed by concurrent caller");
                return Ok(token);
            }

            match slot.as_ref() {
                Some(refresh) => {
                    debug!("Joining in-flight KIS token refresh");
                    refresh.clone()
                }
                None => {
                    let refresh = self.start_refresh();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn start_refresh(&self) -> RefreshFuture {
        let issuer = Arc::clone(&self.issuer);
        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let margin = self.refresh_margin();
        let token = Arc::clone(&self.token);
        let inflight = Arc::downgrade(&self.inflight);

        async move {
            let result =
                obtain_token(issuer.as_ref(), store.as_deref(), clock.as_ref(), margin).await;

            // 캐시를 먼저 채운 뒤 슬롯을 비움
            if let Ok(fresh) = &result {
                *token.write().await = Some(fresh.clone());
            }
            if let Some(slot) = inflight.upgrade() {
                slot.lock().await.take();
            }

            result
        }
        .boxed()
        .shared()
    }

    /// 캐시된 토큰 폐기. 업스트림이 401을 반환했을 때 호출합니다.
    pub async fn invalidate(&self) {
        let mut token_guard = self.token.write().await;
        if token_guard.take().is_some() {
            warn!("KIS access token invalidated");
        }
    }

    /// 유효한 토큰이 있는지 확인.
    pub async fn has_valid_token(&self) -> bool {
        let token_guard = self.token.read().await;
        token_guard
            .as_ref()
            .map(|t| t.is_valid_at(self.clock.now()))
            .unwrap_or(false)
    }

    /// 현재 토큰 만료 시각 반환.
    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let token_guard = self.token.read().await;
        token_guard.as_ref().map(|t| t.expires_at)
    }

    /// 인증된 요청을 위한 공통 헤더 생성.
    ///
    /// # Errors
    /// 토큰 획득에 실패하거나 헤더 값에 유효하지 않은 문자가 있으면 에러를 반환합니다.
    pub async fn build_headers(&self, tr_id: &str) -> Result<HeaderMap, ExchangeError> {
        let token = self.get_token().await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(
            "authorization",
            header_value(&token.auth_header(), "authorization")?,
        );
        headers.insert("appkey", header_value(&self.config.app_key, "appkey")?);
        headers.insert(
            "appsecret",
            header_value(&self.config.app_secret, "appsecret")?,
        );
        headers.insert("tr_id", header_value(tr_id, "tr_id")?);

        if self.config.personalized {
            headers.insert("custtype", HeaderValue::from_static("P"));
        }

        Ok(headers)
    }

    /// 설정 반환.
    pub fn config(&self) -> &KisConfig {
        &self.config
    }
}

/// 저장소를 먼저 확인하고, 쓸 수 있는 토큰이 없으면 새로 발급합니다.
async fn obtain_token(
    issuer: &dyn TokenIssuer,
    store: Option<&dyn TokenStore>,
    clock: &dyn Clock,
    margin: Duration,
) -> Result<TokenState, ExchangeError> {
    if let Some(store) = store {
        match store.load().await {
            Ok(Some(token)) if token.is_fresh(clock.now(), margin) => {
                info!(expires_at = %token.expires_at, "Reusing stored KIS token");
                return Ok(token);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to load stored KIS token"),
        }
    }

    let token = match issuer.issue().await {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "KIS token refresh failed");
            return Err(e);
        }
    };
    if token.access_token.is_empty() {
        return Err(ExchangeError::Unauthorized(
            "Token issuer returned an empty token".to_string(),
        ));
    }
    info!(expires_at = %token.expires_at, "KIS access token obtained");

    if let Some(store) = store {
        if let Err(e) = store.save(&token).await {
            warn!(error = %e, "Failed to persist KIS token");
        }
    }

    Ok(token)
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue, ExchangeError> {
    HeaderValue::from_str(value)
        .map_err(|_| ExchangeError::ParseError(format!("{}에 유효하지 않은 문자 포함", name)))
}

/// 설정의 타임아웃을 적용한 HTTP 클라이언트 생성.
pub fn build_http_client(config: &KisConfig) -> Result<Client, ExchangeError> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))
}

/// KIS 날짜시간 형식 파싱 ("YYYY-MM-DD HH:MM:SS").
fn parse_kis_datetime(s: &str) -> Option<DateTime<Utc>> {
    // KIS는 KST (한국 표준시, UTC+9) 사용
    use chrono::{NaiveDateTime, TimeZone};
    use chrono_tz::Asia::Seoul;

    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()?;
    let kst = Seoul.from_local_datetime(&naive).single()?;
    Some(kst.with_timezone(&Utc))
}
