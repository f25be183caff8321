//! KIS 시세 조회 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - KIS OAuth 토큰 캐시 (동시 갱신 요청 병합, 파일 캐시)
//! - FIFO 호출 제한기: 동시 실행 수 상한과 요청 간 최소 간격
//! - 국내/해외 주식 현재가 클라이언트
//! - 국내/해외 시장 지수 조회
//! - 청크 단위 일괄 시세 조회기

pub mod batch;
pub mod clock;
pub mod connector;
pub mod error;
pub mod quote;
pub mod rate_limiter;

pub use batch::{BatchConfig, BatchFetcher};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connector::kis::{
    KisConfig, KisEnvironment, KisKrClient, KisOAuth, KisQuoteSource, KisTransport, KisUsClient,
    KrIndexPrice, KrStockPrice, UsStockPrice,
};
pub use error::*;
pub use quote::{IndexQuote, IndexSource, Quote, QuoteSource, SymbolResultMap};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
