//! 조회 클라이언트의 HTTP 전송 계층.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// HTTP 응답의 상태 코드와 본문.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// 상태 코드
    pub status: u16,
    /// 응답 본문
    pub body: String,
}

impl HttpResponse {
    /// 새 응답 생성.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx 여부.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// GET 요청 전송기.
///
/// 시도별 타임아웃과 취소는 호출 측에서 future를 drop하는 방식으로 처리합니다.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `url`로 GET 요청.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// reqwest 기반 전송기.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 기본 설정의 전송기 생성.
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .build()
            .map_err(|e| FetchError::Network(format!("HTTP client 생성 실패: {}", e)))?;
        Ok(Self { client })
    }

    /// 주어진 클라이언트로 생성.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
