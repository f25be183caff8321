//! KIS 클라이언트를 [`QuoteSource`]와 [`IndexSource`]로 노출.

use async_trait::async_trait;
use jubot_core::Market;

use super::client_kr::KisKrClient;
use super::client_us::KisUsClient;
use super::transport::KisTransport;
use crate::quote::{IndexQuote, IndexSource, Quote, QuoteSource};
use crate::ExchangeError;

/// 시장에 따라 국내/해외 클라이언트로 라우팅하는 시세 소스.
#[derive(Clone)]
pub struct KisQuoteSource {
    kr: KisKrClient,
    us: KisUsClient,
}

impl KisQuoteSource {
    /// 클라이언트로부터 생성.
    pub fn new(kr: KisKrClient, us: KisUsClient) -> Self {
        Self { kr, us }
    }

    /// 하나의 호출기를 공유하는 두 클라이언트로 생성.
    pub fn from_transport(transport: KisTransport) -> Self {
        Self::new(
            KisKrClient::new(transport.clone()),
            KisUsClient::new(transport),
        )
    }

    /// 국내 클라이언트.
    pub fn kr(&self) -> &KisKrClient {
        &self.kr
    }

    /// 해외 클라이언트.
    pub fn us(&self) -> &KisUsClient {
        &self.us
    }
}

#[async_trait]
impl QuoteSource for KisQuoteSource {
    async fn fetch_quote(&self, symbol: &str, market: Market) -> Result<Quote, ExchangeError> {
        match market {
            Market::Domestic => self.kr.get_price(symbol).await.map(Quote::Domestic),
            Market::Overseas => self.us.get_price(symbol).await.map(Quote::Overseas),
        }
    }
}

#[async_trait]
impl IndexSource for KisQuoteSource {
    async fn fetch_index(&self, symbol: &str, market: Market) -> Result<IndexQuote, ExchangeError> {
        match market {
            Market::Domestic => self.kr.get_index(symbol).await.map(IndexQuote::Domestic),
            Market::Overseas => self.us.get_price(symbol).await.map(IndexQuote::Overseas),
        }
    }
}
