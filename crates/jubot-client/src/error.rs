//! 조회 실패 사유.

use thiserror::Error;

/// 한 번의 조회 시도가 실패한 이유.
///
/// 마지막 실패 사유가 [`FetchState::error`](crate::FetchState)에 보관되므로 `Clone`입니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 2xx 이외의 HTTP 상태
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// 시도별 타임아웃 초과
    #[error("Request timed out")]
    Timeout,

    /// 정상 응답이지만 파싱 결과가 비어 있음
    #[error("Response contained no data")]
    EmptyResult,

    /// 연결 수준 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 본문 파싱 에러
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// 타임아웃 여부.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(FetchError::Http { status: 503 }.to_string(), "HTTP 503");
        assert!(FetchError::Timeout.is_timeout());
        assert!(!FetchError::EmptyResult.is_timeout());
    }
}
