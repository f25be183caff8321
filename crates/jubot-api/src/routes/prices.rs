//! 시세 조회 endpoint.
//!
//! # 엔드포인트
//!
//! - `GET /prices?symbols=005930,000660&market=KR` - 여러 종목 일괄 조회
//! - `GET /prices/domestic/{symbol}` - 국내 종목 현재가
//! - `GET /prices/overseas/{symbol}` - 해외 종목 현재가
//!
//! 일괄 조회 응답은 종목 코드를 키로 하는 JSON 객체이며, 조회에 실패한 종목의 값은 `null`입니다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use jubot_core::Market;
use jubot_exchange::{Quote, SymbolResultMap};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{bad_request, upstream_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 일괄 조회 쿼리.
#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    /// 쉼표로 구분된 종목 목록
    pub symbols: Option<String>,
    /// 시장 (KR | US)
    pub market: Option<String>,
}

/// 쉼표 목록을 종목 목록으로 분리. 공백은 제거하고 빈 항목은 버립니다.
fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// KIS 미설정 응답 (503).
pub(crate) fn not_configured() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiErrorResponse::new(
            "KIS_NOT_CONFIGURED",
            "KIS API credentials are not configured",
        )),
    )
}

/// 여러 종목 일괄 조회.
///
/// GET /prices
pub async fn get_prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> ApiResult<Json<SymbolResultMap>> {
    let market = query
        .market
        .as_deref()
        .ok_or_else(|| bad_request("MISSING_PARAMETER", "market is required (KR | US)"))?
        .parse::<Market>()
        .map_err(|e| bad_request("INVALID_MARKET", e))?;

    let raw = query
        .symbols
        .as_deref()
        .ok_or_else(|| bad_request("MISSING_PARAMETER", "symbols is required"))?;
    let symbols = split_symbols(raw);

    if symbols.is_empty() {
        return Ok(Json(SymbolResultMap::new()));
    }

    let batch = state.batch.as_ref().ok_or_else(not_configured)?;

    debug!(count = symbols.len(), market = %market, "Batch price request");
    Ok(Json(batch.fetch_batch(&symbols, market).await))
}

async fn get_single(state: &AppState, symbol: &str, market: Market) -> ApiResult<Json<Quote>> {
    let source = state.quotes.as_ref().ok_or_else(not_configured)?;

    source.fetch_quote(symbol, market).await.map(Json).map_err(|e| {
        warn!(symbol = %symbol, market = %market, error = %e, "Single price request failed");
        upstream_error(&e)
    })
}

/// 국내 종목 현재가.
///
/// GET /prices/domestic/{symbol}
pub async fn get_domestic_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Quote>> {
    get_single(&state, &symbol, Market::Domestic).await
}

/// 해외 종목 현재가.
///
/// GET /prices/overseas/{symbol}
pub async fn get_overseas_price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Quote>> {
    get_single(&state, &symbol, Market::Overseas).await
}

/// 시세 라우터 생성.
pub fn prices_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_prices))
        .route("/domestic/{symbol}", get(get_domestic_price))
        .route("/overseas/{symbol}", get(get_overseas_price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use jubot_exchange::{BatchConfig, ExchangeError, KrStockPrice, QuoteSource, UsStockPrice};
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    /// "FAIL"로 시작하는 종목은 실패시키는 소스.
    struct FakeSource;

    #[async_trait]
    impl QuoteSource for FakeSource {
        async fn fetch_quote(&self, symbol: &str, market: Market) -> Result<Quote, ExchangeError> {
            if symbol.starts_with("FAIL") {
                return Err(ExchangeError::UpstreamHttp {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(match market {
                Market::Domestic => Quote::Domestic(KrStockPrice {
                    stock_code: symbol.to_string(),
                    current_price: Decimal::new(71500, 0),
                    ..Default::default()
                }),
                Market::Overseas => Quote::Overseas(UsStockPrice {
                    current_price: Decimal::new(23010, 2),
                    ..Default::default()
                }),
            })
        }
    }

    fn app(with_source: bool) -> Router {
        let mut state = create_test_state();
        if with_source {
            state = state.with_quote_source(
                Arc::new(FakeSource),
                BatchConfig {
                    chunk_size: 5,
                    chunk_delay: Duration::ZERO,
                },
            );
        }
        Router::new()
            .nest("/prices", prices_router())
            .with_state(Arc::new(state))
    }

    async fn send(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_market_is_bad_request() {
        let (status, body) = send(app(true), "/prices?symbols=005930").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_PARAMETER");
    }

    #[tokio::test]
    async fn test_unknown_market_is_bad_request() {
        let (status, body) = send(app(true), "/prices?symbols=7203&market=JP").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_MARKET");
    }

    #[tokio::test]
    async fn test_missing_symbols_is_bad_request() {
        let (status, _) = send(app(true), "/prices?market=KR").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_symbol_list_returns_empty_object() {
        // 시세 소스가 없어도 빈 목록은 바로 응답
        let (status, body) = send(app(false), "/prices?symbols=&market=KR").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_batch_keys_match_input_with_nulls() {
        let (status, body) =
            send(app(true), "/prices?symbols=005930,FAIL1,%20000660&market=KR").await;

        assert_eq!(status, StatusCode::OK);
        let map = body.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["005930"]["stck_prpr"], "71500");
        assert_eq!(map["000660"]["stck_shrn_iscd"], "000660");
        assert!(map["FAIL1"].is_null());
    }

    #[tokio::test]
    async fn test_unconfigured_batch_is_unavailable() {
        let (status, body) = send(app(false), "/prices?symbols=AAPL&market=US").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "KIS_NOT_CONFIGURED");
    }

    #[tokio::test]
    async fn test_single_symbol_routes() {
        let (status, body) = send(app(true), "/prices/overseas/AAPL").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["last"], "230.10");

        let (status, body) = send(app(true), "/prices/domestic/FAIL2").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "UPSTREAM_HTTP_ERROR");
        assert_eq!(body["details"]["upstream_status"], 500);
    }
}
