//! 시세 집계 엔드포인트 클라이언트.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 재시도/타임아웃/취소를 갖춘 조회 상태 머신 ([`ResilientFetch`])
//! - 교체 가능한 HTTP 전송 계층 ([`HttpTransport`])
//! - `/prices` 응답 파서

pub mod error;
pub mod fetch;
pub mod quotes;
pub mod transport;

pub use error::FetchError;
pub use fetch::{FetchOptions, FetchState, ResilientFetch, ResponseParser};
pub use quotes::{parse_batch_quotes, StockSnapshot};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
