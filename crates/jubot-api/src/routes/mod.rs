//! REST API 라우트.
//!
//! - `/health`: 헬스 체크
//! - `/prices`: 시세 조회
//! - `/indices`: 시장 지수 조회

pub mod health;
pub mod indices;
pub mod prices;

pub use health::{health_check, health_ready, health_router};
pub use indices::{get_domestic_index, get_overseas_index, indices_router};
pub use prices::{get_domestic_price, get_overseas_price, get_prices, prices_router};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/prices", prices_router())
        .nest("/indices", indices_router())
}
