//! 업스트림 시세 API 에러 타입.

use thiserror::Error;

/// KIS 업스트림 호출 관련 에러.
///
/// 공유 갱신 future의 결과로 여러 호출자에게 전달되므로 `Clone`입니다.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증 실패 (토큰 발급 실패 또는 빈 토큰)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 업스트림 HTTP 상태 코드 에러 (2xx 이외)
    #[error("Upstream HTTP {status}: {body}")]
    UpstreamHttp { status: u16, body: String },

    /// KIS 업무 에러 (`rt_cd != "0"`)
    #[error("API error {code}: {message}")]
    ApiError { code: String, message: String },

    /// 요청 한도 초과 (EGW00201)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 정상 응답이지만 비어 있는 데이터
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::NetworkError(_)
            | ExchangeError::RateLimited
            | ExchangeError::Timeout(_)
            | ExchangeError::EmptyResult(_) => true,
            ExchangeError::UpstreamHttp { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }

    /// API 응답에 노출할 에러 코드.
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::NetworkError(_) => "NETWORK_ERROR",
            ExchangeError::Unauthorized(_) => "AUTH_FAILURE",
            ExchangeError::UpstreamHttp { .. } => "UPSTREAM_HTTP_ERROR",
            ExchangeError::ApiError { .. } => "UPSTREAM_API_ERROR",
            ExchangeError::RateLimited => "RATE_LIMITED",
            ExchangeError::Timeout(_) => "TIMEOUT",
            ExchangeError::EmptyResult(_) => "EMPTY_RESULT",
            ExchangeError::ParseError(_) => "PARSE_ERROR",
            ExchangeError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExchangeError::NetworkError("reset".into()).is_retryable());
        assert!(ExchangeError::Timeout("10s".into()).is_retryable());
        assert!(ExchangeError::EmptyResult("AAPL".into()).is_retryable());
        assert!(ExchangeError::UpstreamHttp { status: 503, body: String::new() }.is_retryable());
        assert!(!ExchangeError::UpstreamHttp { status: 404, body: String::new() }.is_retryable());
        assert!(!ExchangeError::Unauthorized("bad key".into()).is_retryable());
    }

    #[test]
    fn test_auth_error() {
        let err = ExchangeError::Unauthorized("empty token".into());
        assert!(err.is_auth_error());
        assert_eq!(err.code(), "AUTH_FAILURE");
    }
}
