//! Jubot API 서버 진입점.
//!
//! # 환경변수
//!
//! - `KIS_APP_KEY`, `KIS_APP_SECRET`: KIS 자격증명 (없으면 시세 엔드포인트는 503)
//! - `KIS_ENVIRONMENT`, `KIS_BASE_URL`, `KIS_TOKEN_CACHE_PATH`: 선택
//! - `JUBOT__SERVER__PORT` 등: 설정 파일 값 재정의
//! - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use jubot_api::routes::create_api_router;
use jubot_api::state::AppState;
use jubot_core::{init_logging, AppConfig, LogConfig};
use jubot_exchange::KisConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// CORS 레이어 생성.
///
/// `CORS_ORIGINS`가 없으면 모든 origin을 허용합니다 (개발 모드).
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
}

fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    match KisConfig::from_env() {
        Some(kis) => {
            if let Err(e) = kis.validate() {
                error!(error = %e, "KIS credentials are invalid; price endpoints disabled");
                return Ok(AppState::new(config));
            }
            info!(
                app_key = %kis.masked_app_key(),
                environment = ?kis.environment,
                "KIS quote source configured"
            );
            Ok(AppState::with_kis(config, kis)?)
        }
        None => {
            warn!("KIS_APP_KEY / KIS_APP_SECRET not set; price endpoints will return 503");
            Ok(AppState::new(config))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default()?;
    init_logging(LogConfig::from(&config.logging))?;

    info!("Starting Jubot API server...");

    let state = Arc::new(create_app_state(&config)?);
    info!(
        version = %state.version,
        has_kis = state.has_quote_source(),
        max_concurrency = state.limiter.config().max_concurrency,
        min_interval_ms = state.limiter.config().min_interval.as_millis() as u64,
        chunk_size = config.batch.chunk_size,
        chunk_delay_ms = config.batch.chunk_delay_ms,
        "Application state initialized"
    );

    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
