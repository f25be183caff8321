//! # Jubot Core
//!
//! 시세 집계 계층의 공통 기반을 제공합니다:
//! - 시장 구분 타입 ([`Market`])
//! - 설정 관리 ([`AppConfig`])
//! - 로깅 초기화
//! - 부트스트랩 에러 타입

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
