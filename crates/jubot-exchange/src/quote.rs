//! 종목 단위 시세 조회 인터페이스.

use async_trait::async_trait;
use jubot_core::Market;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::connector::kis::{KrIndexPrice, KrStockPrice, UsStockPrice};
use crate::ExchangeError;

/// 시장별 업스트림 시세 페이로드.
///
/// 태그 없이 직렬화되어 응답에는 KIS 필드가 그대로 노출됩니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Quote {
    /// 국내 주식 시세
    Domestic(KrStockPrice),
    /// 해외 주식 시세
    Overseas(UsStockPrice),
}

impl Quote {
    /// 현재가.
    pub fn current_price(&self) -> Decimal {
        match self {
            Quote::Domestic(p) => p.current_price,
            Quote::Overseas(p) => p.current_price,
        }
    }

    /// 시장 구분.
    pub fn market(&self) -> Market {
        match self {
            Quote::Domestic(_) => Market::Domestic,
            Quote::Overseas(_) => Market::Overseas,
        }
    }
}

/// 종목 → 시세 (실패 시 `None`) 맵.
pub type SymbolResultMap = HashMap<String, Option<Quote>>;

/// 한 종목의 시세를 조회하는 소스.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// 종목 시세 조회.
    async fn fetch_quote(&self, symbol: &str, market: Market) -> Result<Quote, ExchangeError>;
}

/// 시장 지수 페이로드.
///
/// 해외 지수는 해외 현재가 API로 조회하므로 주식 시세와 같은 형태입니다.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexQuote {
    /// 국내 업종/지수
    Domestic(KrIndexPrice),
    /// 해외 지수 (.DJI, .SPX, .IXIC 등)
    Overseas(UsStockPrice),
}

impl IndexQuote {
    /// 지수 현재값.
    pub fn current_value(&self) -> Decimal {
        match self {
            IndexQuote::Domestic(i) => i.current_value,
            IndexQuote::Overseas(i) => i.current_price,
        }
    }
}

/// 시장 지수를 조회하는 소스.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// 지수 조회.
    async fn fetch_index(&self, symbol: &str, market: Market) -> Result<IndexQuote, ExchangeError>;
}
