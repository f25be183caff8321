//! 여러 종목 시세의 청크 단위 일괄 조회.
//!
//! 종목 목록을 `chunk_size`개씩 나누어 청크 안에서는 동시에 조회하고,
//! 청크 사이에는 `chunk_delay`만큼 쉬어 순간 요청량을 낮춥니다.
//! 개별 종목의 실패는 해당 키의 `None`으로만 기록되며 배치 전체를 실패시키지 않습니다.

use futures::future::join_all;
use jubot_core::{BatchSettings, Market};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::quote::{QuoteSource, SymbolResultMap};

/// 일괄 조회 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// 청크 당 종목 수
    pub chunk_size: usize,
    /// 청크 사이 대기 시간
    pub chunk_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            chunk_delay: Duration::from_millis(200),
        }
    }
}

impl From<&BatchSettings> for BatchConfig {
    fn from(settings: &BatchSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size.max(1),
            chunk_delay: settings.chunk_delay(),
        }
    }
}

/// 종목 시세 일괄 조회기.
pub struct BatchFetcher {
    source: Arc<dyn QuoteSource>,
    config: BatchConfig,
}

impl BatchFetcher {
    /// 새 조회기 생성.
    pub fn new(source: Arc<dyn QuoteSource>, config: BatchConfig) -> Self {
        let config = BatchConfig {
            chunk_size: config.chunk_size.max(1),
            ..config
        };
        Self { source, config }
    }

    /// 설정 반환.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 종목 목록의 시세를 조회합니다.
    ///
    /// 반환 맵의 키 집합은 입력 종목 집합(빈 문자열 제외)과 정확히 같습니다.
    /// 중복 종목은 한 번만 조회합니다.
    pub async fn fetch_batch<S: AsRef<str>>(&self, symbols: &[S], market: Market) -> SymbolResultMap {
        let symbols = dedup_symbols(symbols);
        let mut results = SymbolResultMap::with_capacity(symbols.len());

        if symbols.is_empty() {
            return results;
        }

        let chunk_count = symbols.len().div_ceil(self.config.chunk_size);
        info!(
            count = symbols.len(),
            chunks = chunk_count,
            market = %market,
            "Fetching batch quotes"
        );

        for (index, chunk) in symbols.chunks(self.config.chunk_size).enumerate() {
            if index > 0 && !self.config.chunk_delay.is_zero() {
                tokio::time::sleep(self.config.chunk_delay).await;
            }

            debug!(chunk = index + 1, size = chunk.len(), "Dispatching chunk");

            let fetches = chunk.iter().map(|symbol| async move {
                match self.source.fetch_quote(symbol, market).await {
                    Ok(quote) => (symbol.clone(), Some(quote)),
                    Err(e) => {
                        warn!(symbol = %symbol, market = %market, error = %e, "Quote fetch failed");
                        (symbol.clone(), None)
                    }
                }
            });

            results.extend(join_all(fetches).await);
        }

        let failed = results.values().filter(|v| v.is_none()).count();
        info!(total = results.len(), failed, market = %market, "Batch quotes completed");

        results
    }
}

/// 입력 순서를 유지하며 빈 문자열과 중복을 제거.
fn dedup_symbols<S: AsRef<str>>(symbols: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}
