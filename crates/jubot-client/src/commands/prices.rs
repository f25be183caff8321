//! `prices` 명령: 집계 엔드포인트를 재시도 조회기로 호출하고 결과를 표로 출력.

use anyhow::Context;
use jubot_client::{
    parse_batch_quotes, FetchOptions, FetchState, ResilientFetch, ReqwestTransport, StockSnapshot,
};
use jubot_core::Market;
use reqwest::Url;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type Quotes = HashMap<String, StockSnapshot>;

/// `prices` 명령 설정.
#[derive(Debug, Clone)]
pub struct PricesConfig {
    pub server: String,
    pub market: Market,
    pub symbols: Vec<String>,
    /// `Some`이면 해당 주기로 반복 조회
    pub watch: Option<Duration>,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// `/prices` 요청 URL 생성.
pub fn prices_url(server: &str, market: Market, symbols: &[String]) -> anyhow::Result<Url> {
    let base = format!("{}/prices", server.trim_end_matches('/'));
    let url = Url::parse_with_params(
        &base,
        &[("market", market.code()), ("symbols", &symbols.join(","))],
    )
    .with_context(|| format!("잘못된 서버 주소: {}", server))?;
    Ok(url)
}

pub async fn run_prices(config: PricesConfig) -> anyhow::Result<()> {
    let url = prices_url(&config.server, config.market, &config.symbols)?;
    info!(url = %url, "Fetching prices");

    let transport = Arc::new(ReqwestTransport::new()?);
    let options = FetchOptions::new(parse_batch_quotes(config.market))
        .with_max_retries(config.max_retries)
        .with_timeout(config.timeout);
    let fetch = ResilientFetch::new(transport, Some(url.to_string()), options);

    loop {
        let state = wait_with_progress(&fetch, config.max_retries).await;
        println!("{}", render_state(&state, &config.symbols, config.market));

        let Some(interval) = config.watch else {
            break;
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n중단되었습니다.");
                break;
            }
            _ = tokio::time::sleep(interval) => fetch.refetch(),
        }
    }

    Ok(())
}

/// 사이클이 끝날 때까지 재시도 진행 상황을 출력하며 대기.
async fn wait_with_progress(fetch: &ResilientFetch<Quotes>, max_retries: u32) -> FetchState<Quotes> {
    let mut rx = fetch.subscribe();
    let mut reported = 0;

    loop {
        let state = rx.borrow_and_update().clone();
        if !state.loading {
            return state;
        }
        if state.retry_count > reported {
            reported = state.retry_count;
            eprintln!("⏳ 재시도 중... ({}/{})", reported, max_retries);
        }
        if rx.changed().await.is_err() {
            return fetch.state();
        }
    }
}

/// 조회 결과를 입력 순서의 표로 렌더링.
///
/// 재시도를 모두 소진한 경우 에러와 함께 직전 결과를 보여줍니다.
pub fn render_state(state: &FetchState<Quotes>, symbols: &[String], market: Market) -> String {
    let mut out = String::new();

    if let Some(error) = &state.error {
        let _ = writeln!(out, "❌ 조회 실패: {} ({}회 재시도 후)", error, state.retry_count);
        if state.data.is_none() {
            let _ = write!(out, "다시 시도하려면 명령을 다시 실행하세요.");
            return out;
        }
        let _ = writeln!(out, "마지막으로 받은 시세:");
    }

    let Some(quotes) = &state.data else {
        let _ = write!(out, "데이터 없음");
        return out;
    };

    let _ = writeln!(out, "{:<10} {:>14} {:>12} {:>9}", "종목", "현재가", "대비", "등락률");
    let _ = writeln!(out, "{}", "-".repeat(50));

    for symbol in symbols {
        match quotes.get(symbol) {
            Some(q) => {
                let arrow = match q.change.cmp(&Decimal::ZERO) {
                    Ordering::Less => "▼",
                    Ordering::Equal => " ",
                    Ordering::Greater => "▲",
                };
                let _ = writeln!(
                    out,
                    "{:<10} {:>14} {}{:>11} {:>8}%",
                    symbol,
                    format_price(q, market),
                    arrow,
                    q.change.abs(),
                    q.change_percent
                );
            }
            None => {
                let _ = writeln!(out, "{:<10} {:>14}", symbol, "-");
            }
        }
    }

    out.trim_end().to_string()
}

fn format_price(quote: &StockSnapshot, market: Market) -> String {
    match market {
        Market::Domestic => format!("₩{}", quote.price.normalize()),
        Market::Overseas => format!("${}", quote.price.round_dp(2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jubot_client::FetchError;
    use rust_decimal_macros::dec;

    fn symbols() -> Vec<String> {
        vec!["005930".to_string(), "000660".to_string()]
    }

    #[test]
    fn test_prices_url_encodes_params() {
        let tickers = vec!["AAPL".to_string(), "BRK.B".to_string()];
        let url = prices_url("http://localhost:3000/", Market::Overseas, &tickers).unwrap();
        assert_eq!(url.path(), "/prices");
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["market"], "US");
        assert_eq!(pairs["symbols"], "AAPL,BRK.B");

        assert!(prices_url("not a url", Market::Domestic, &symbols()).is_err());
    }

    #[tokio::test]
    async fn test_render_resolved_marks_missing_symbols() {
        let fetch_state = resolved_state().await;
        let text = render_state(&fetch_state, &symbols(), Market::Domestic);

        assert!(text.contains("005930"));
        assert!(text.contains("₩71500"));
        assert!(text.contains("▼"));
        let missing = text.lines().find(|l| l.starts_with("000660")).unwrap();
        assert!(missing.trim_end().ends_with('-'));
    }

    #[tokio::test]
    async fn test_render_failed_without_data() {
        let mut fetch_state = resolved_state().await;
        fetch_state.data = None;
        fetch_state.error = Some(FetchError::Timeout);
        fetch_state.retry_count = 3;

        let text = render_state(&fetch_state, &symbols(), Market::Domestic);
        assert!(text.contains("조회 실패"));
        assert!(text.contains("3회"));
        assert!(!text.contains("현재가"));
    }

    /// 서버 응답을 실제 조회기로 받아 만든 상태.
    async fn resolved_state() -> FetchState<Quotes> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/prices")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"005930":{"stck_prpr":"71500","prdy_vrss":"-500","prdy_ctrt":"-0.69"},"000660":null}"#,
            )
            .create_async()
            .await;

        let url = prices_url(&server.url(), Market::Domestic, &symbols()).unwrap();
        let fetch = ResilientFetch::new(
            Arc::new(ReqwestTransport::new().unwrap()),
            Some(url.to_string()),
            FetchOptions::new(parse_batch_quotes(Market::Domestic)).with_max_retries(0),
        );
        let state = fetch.settled().await;

        assert_eq!(state.data.as_ref().unwrap()["005930"].price, dec!(71500));
        state
    }
}
