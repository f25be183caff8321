//! 시장 지수 endpoint.
//!
//! # 엔드포인트
//!
//! - `GET /indices/domestic/{symbol}` - 국내 업종/지수 (예: 0001 코스피, 1001 코스닥)
//! - `GET /indices/overseas/{symbol}` - 해외 지수 (예: .DJI, .SPX, .IXIC)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use jubot_core::Market;
use jubot_exchange::IndexQuote;
use std::sync::Arc;
use tracing::warn;

use super::prices::not_configured;
use crate::error::{upstream_error, ApiResult};
use crate::state::AppState;

async fn get_index(state: &AppState, symbol: &str, market: Market) -> ApiResult<Json<IndexQuote>> {
    let source = state.indices.as_ref().ok_or_else(not_configured)?;

    source.fetch_index(symbol, market).await.map(Json).map_err(|e| {
        warn!(symbol = %symbol, market = %market, error = %e, "Index request failed");
        upstream_error(&e)
    })
}

/// 국내 지수.
///
/// GET /indices/domestic/{symbol}
pub async fn get_domestic_index(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<IndexQuote>> {
    get_index(&state, &symbol, Market::Domestic).await
}

/// 해외 지수.
///
/// GET /indices/overseas/{symbol}
pub async fn get_overseas_index(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<IndexQuote>> {
    get_index(&state, &symbol, Market::Overseas).await
}

/// 지수 라우터 생성.
pub fn indices_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/domestic/{symbol}", get(get_domestic_index))
        .route("/overseas/{symbol}", get(get_overseas_index))
}
