//! KIS REST 호출 공통 경로.
//!
//! 모든 시세 조회는 이 모듈을 거쳐 인증 헤더를 붙이고 호출 제한기 안에서 실행됩니다.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::auth::KisOAuth;
use crate::rate_limiter::RateLimiter;
use crate::ExchangeError;

/// 초당 거래건수 초과 메시지 코드.
const MSG_CD_RATE_LIMITED: &str = "EGW00201";

/// KIS 공통 응답 봉투.
#[derive(Debug, Clone, Deserialize)]
pub struct KisResponse<T> {
    /// 응답 코드 ("0" = 성공)
    pub rt_cd: String,
    /// 메시지 코드
    #[serde(default)]
    pub msg_cd: String,
    /// 메시지 내용
    #[serde(default)]
    pub msg1: String,
    /// 결과 데이터. 차트 API는 스냅샷을 `output1`에 담습니다.
    #[serde(alias = "output1")]
    pub output: Option<T>,
}

impl<T> KisResponse<T> {
    /// 업무 성공 여부.
    pub fn is_success(&self) -> bool {
        self.rt_cd == "0"
    }

    /// 업무 에러를 `ExchangeError`로 변환.
    pub fn into_result(self) -> Result<Option<T>, ExchangeError> {
        if self.is_success() {
            return Ok(self.output);
        }
        if self.msg_cd == MSG_CD_RATE_LIMITED {
            return Err(ExchangeError::RateLimited);
        }
        Err(ExchangeError::ApiError {
            code: self.msg_cd,
            message: self.msg1,
        })
    }
}

/// 인증과 호출 제한이 적용된 KIS HTTP 호출기.
///
/// 국내/해외 클라이언트가 같은 토큰 캐시와 호출 제한기를 공유하도록 `Clone`으로 나눠 씁니다.
#[derive(Clone)]
pub struct KisTransport {
    oauth: Arc<KisOAuth>,
    limiter: Arc<RateLimiter>,
    client: Client,
}

impl KisTransport {
    /// 새 호출기 생성.
    pub fn new(oauth: Arc<KisOAuth>, limiter: Arc<RateLimiter>, client: Client) -> Self {
        Self {
            oauth,
            limiter,
            client,
        }
    }

    /// OAuth 관리자 참조.
    pub fn oauth(&self) -> &Arc<KisOAuth> {
        &self.oauth
    }

    /// 호출 제한기 참조.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// 인증된 GET 요청을 보내고 KIS 응답 봉투를 파싱합니다.
    ///
    /// 토큰 획득은 제한기 밖에서 수행하고 실제 HTTP 호출만 제한기 슬롯을 차지합니다.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tr_id: &str,
        query: &[(&str, &str)],
    ) -> Result<KisResponse<T>, ExchangeError> {
        let url = format!("{}{}", self.oauth.config().rest_base_url(), path);
        let headers = self.oauth.build_headers(tr_id).await?;
        let client = &self.client;
        let url = url.as_str();

        let (status, body) = self
            .limiter
            .add(move || async move {
                let response = client
                    .get(url)
                    .headers(headers)
                    .query(query)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.text().await?;
                Ok::<_, ExchangeError>((status, body))
            })
            .await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(tr_id, "KIS rejected access token, invalidating cache");
            self.oauth.invalidate().await;
            return Err(ExchangeError::Unauthorized(body));
        }

        if !status.is_success() {
            error!(tr_id, status = %status, "KIS request failed: {}", body);
            return Err(ExchangeError::UpstreamHttp {
                status: status.as_u16(),
                body,
            });
        }

        debug!(tr_id, "KIS response: {}", body);

        serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse {} response: {}", tr_id, e))
        })
    }
}
