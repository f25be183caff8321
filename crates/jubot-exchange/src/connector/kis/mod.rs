//! 한국투자증권 (KIS) 시세 API 연동 모듈.
//!
//! # 기능
//!
//! - OAuth 2.0 인증, 만료 전 갱신, 동시 갱신 요청 병합
//! - 토큰 파일 캐시
//! - 국내 주식 현재가 조회
//! - 국내 업종/지수 현재가 조회 (해외 지수는 해외 현재가 API 사용)
//! - 해외 주식 현재가 조회 (거래소 코드 자동 판별 및 대체 거래소 재시도)
//!
//! # API 문서
//!
//! 공식 API 문서: <https://apiportal.koreainvestment.com/>
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use jubot_exchange::connector::kis::{KisConfig, KisOAuth, KisKrClient, KisTransport};
//!
//! let config = KisConfig::from_env().expect("KIS_APP_KEY / KIS_APP_SECRET");
//! let oauth = Arc::new(KisOAuth::new(config.clone())?);
//! let limiter = Arc::new(RateLimiter::default());
//! let transport = KisTransport::new(oauth, limiter, build_http_client(&config)?);
//!
//! let price = KisKrClient::new(transport).get_price("005930").await?;
//! println!("삼성전자: {}", price.current_price);
//! ```

pub mod auth;
pub mod client_kr;
pub mod client_us;
pub mod config;
pub mod exchange;
pub mod quote_source;
pub mod token_store;
pub mod transport;

pub use auth::{build_http_client, KisOAuth, KisTokenIssuer, TokenIssuer, TokenState};
pub use client_kr::{KisKrClient, KrIndexPrice, KrStockPrice};
pub use client_us::{KisUsClient, UsStockPrice};
pub use config::{KisConfig, KisEnvironment};
pub use exchange::{alternate_exchange, resolve_exchange_code};
pub use quote_source::KisQuoteSource;
pub use token_store::{FileTokenStore, TokenStore};
pub use transport::{KisResponse, KisTransport};

use rust_decimal::Decimal;
use serde::Deserialize;

/// KIS 거래 ID (tr_id) 상수 모음.
///
/// 시세 조회 tr_id는 실전/모의 환경에서 동일합니다.
pub mod tr_id {
    /// 국내 주식 현재가 조회
    pub const KR_PRICE: &str = "FHKST01010100";
    /// 국내 업종 일별 지수 차트
    pub const KR_INDEX_CHART: &str = "FHKUP03500100";
    /// 해외 주식 현재가
    pub const US_PRICE: &str = "HHDFS00000300";
}

/// KIS 해외 거래소 코드.
pub mod exchange_code {
    /// 미국 NYSE
    pub const NYSE: &str = "NYS";
    /// 미국 NASDAQ
    pub const NASDAQ: &str = "NAS";
    /// 미국 AMEX
    pub const AMEX: &str = "AMS";
}

/// 문자열 숫자를 Decimal로 역직렬화.
///
/// KIS는 모든 숫자를 문자열로 반환하며 값이 없을 때 `""`, `"-"` 또는 `null`을 보냅니다.
/// 이 경우 0으로 처리합니다. 천 단위 구분자 `,`는 제거합니다.
pub(crate) fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    let s = match s {
        Some(s) => s.trim().replace(',', ""),
        None => return Ok(Decimal::ZERO),
    };
    if s.is_empty() || s == "-" {
        return Ok(Decimal::ZERO);
    }
    s.parse::<Decimal>()
        .map_err(|_| serde::de::Error::custom(format!("Invalid decimal: {}", s)))
}

/// 클라이언트 테스트용 구성 요소.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
    use crate::ExchangeError;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    pub const KEY: &str = "PSabcdefghijklmnopqrstuv";
    pub const SECRET: &str = "secretsecretsecretsecretsecret";

    /// 항상 같은 토큰을 돌려주는 발급자.
    pub struct StaticIssuer;

    #[async_trait]
    impl TokenIssuer for StaticIssuer {
        async fn issue(&self) -> Result<TokenState, ExchangeError> {
            Ok(TokenState::new(
                "test-token".to_string(),
                "Bearer".to_string(),
                Utc::now() + Duration::hours(24),
            ))
        }
    }

    /// mockito 서버를 바라보는 호출기 생성.
    pub fn transport_for(base_url: &str) -> KisTransport {
        let config = KisConfig::new(KEY, SECRET).with_base_url(base_url);
        let client = build_http_client(&config).unwrap();
        let oauth = Arc::new(KisOAuth::with_issuer(config, Arc::new(StaticIssuer)));
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(
            2,
            std::time::Duration::ZERO,
        )));
        KisTransport::new(oauth, limiter, client)
    }
}
