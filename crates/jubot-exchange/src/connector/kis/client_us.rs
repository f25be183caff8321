//! KIS 해외(미국) 주식 시세 클라이언트.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::deserialize_decimal;
use super::exchange::{alternate_exchange, resolve_exchange_code};
use super::tr_id;
use super::transport::KisTransport;
use crate::ExchangeError;

const PRICE_PATH: &str = "/uapi/overseas-price/v1/quotations/price";

/// KIS 해외 주식 REST API 클라이언트.
#[derive(Clone)]
pub struct KisUsClient {
    transport: KisTransport,
}

impl KisUsClient {
    /// 새로운 해외 주식 클라이언트 생성.
    pub fn new(transport: KisTransport) -> Self {
        Self { transport }
    }

    /// 해외주식 현재가 조회.
    ///
    /// 거래소 코드는 심볼로부터 판별합니다. KIS는 상장 거래소가 다르면 빈 시세를
    /// 돌려주므로, 빈 응답을 받으면 대체 거래소로 한 번 더 조회합니다.
    /// 대체 조회 자체가 실패하면 그 에러를 그대로 반환합니다.
    ///
    /// # 인자
    /// * `symbol` - 종목 심볼 (예: "AAPL")
    pub async fn get_price(&self, symbol: &str) -> Result<UsStockPrice, ExchangeError> {
        let excd = resolve_exchange_code(symbol);

        if let Some(price) = self.get_price_on(symbol, excd).await? {
            return Ok(price);
        }

        let alt = alternate_exchange(excd);
        warn!(symbol, exchange = excd, alternate = alt, "Empty US quote, retrying with alternate exchange");

        match self.get_price_on(symbol, alt).await {
            Ok(Some(price)) => Ok(price),
            Ok(None) => Err(ExchangeError::EmptyResult(symbol.to_string())),
            Err(e) => {
                warn!(symbol, exchange = alt, error = %e, "Alternate exchange lookup failed");
                Err(e)
            }
        }
    }

    /// 지정한 거래소에서 현재가 조회. 응답이 비어 있으면 `None`.
    pub async fn get_price_on(
        &self,
        symbol: &str,
        exchange_code: &str,
    ) -> Result<Option<UsStockPrice>, ExchangeError> {
        let resp = self
            .transport
            .get_json::<UsStockPrice>(
                PRICE_PATH,
                tr_id::US_PRICE,
                &[("AUTH", ""), ("EXCD", exchange_code), ("SYMB", symbol)],
            )
            .await?;

        let price = resp.into_result()?.filter(|p| !p.is_empty());
        if let Some(ref p) = price {
            debug!(symbol, exchange = exchange_code, price = %p.current_price, "US price fetched");
        }
        Ok(price)
    }
}

/// 미국 주식 시세 데이터.
///
/// 직렬화 시에도 KIS 필드명을 그대로 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UsStockPrice {
    /// 실시간 조회 종목코드 (예: "DNASAAPL")
    #[serde(rename = "rsym", default)]
    pub realtime_symbol: String,
    /// 현재가
    #[serde(rename = "last", default, deserialize_with = "deserialize_decimal")]
    pub current_price: Decimal,
    /// 전일 종가
    #[serde(rename = "base", default, deserialize_with = "deserialize_decimal")]
    pub prev_close: Decimal,
    /// 전일대비
    #[serde(rename = "diff", default, deserialize_with = "deserialize_decimal")]
    pub price_change: Decimal,
    /// 등락률 (%)
    #[serde(rename = "rate", default, deserialize_with = "deserialize_decimal")]
    pub change_rate: Decimal,
    /// 거래량
    #[serde(rename = "tvol", default, deserialize_with = "deserialize_decimal")]
    pub volume: Decimal,
    /// 거래대금
    #[serde(rename = "tamt", default, deserialize_with = "deserialize_decimal")]
    pub trading_value: Decimal,
    /// 매수가능여부
    #[serde(rename = "ordy", default)]
    pub orderable: String,
}

impl UsStockPrice {
    /// 현재가가 비어 있는 응답인지 확인.
    pub fn is_empty(&self) -> bool {
        self.current_price.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::kis::testing::transport_for;
    use mockito::Matcher;
    use rust_decimal_macros::dec;

    const EMPTY_BODY: &str = r#"{
        "rt_cd": "0", "msg_cd": "MCA00000", "msg1": "정상처리 되었습니다.",
        "output": {"rsym": "", "zdiv": "", "base": "", "pvol": "", "last": "", "sign": "",
                   "diff": "", "rate": "", "tvol": "", "tamt": "", "ordy": ""}
    }"#;

    fn quote_body(last: &str) -> String {
        format!(
            r#"{{"rt_cd":"0","msg_cd":"MCA00000","msg1":"ok",
                "output":{{"rsym":"DNYSWMT","base":"158.00","last":"{}","diff":"1.20",
                           "rate":"+0.76","tvol":"1000","tamt":"","ordy":"매수불가"}}}}"#,
            last
        )
    }

    fn price_mock(server: &mut mockito::Server, excd: &str, symbol: &str) -> mockito::Mock {
        server
            .mock("GET", "/uapi/overseas-price/v1/quotations/price")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("AUTH".into(), "".into()),
                Matcher::UrlEncoded("EXCD".into(), excd.into()),
                Matcher::UrlEncoded("SYMB".into(), symbol.into()),
            ]))
            .match_header("tr_id", "HHDFS00000300")
    }

    #[tokio::test]
    async fn test_get_price_uses_resolved_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = price_mock(&mut server, "NYS", "JPM")
            .with_status(200)
            .with_body(quote_body("195.40"))
            .expect(1)
            .create_async()
            .await;

        let client = KisUsClient::new(transport_for(&server.url()));
        let price = client.get_price("JPM").await.unwrap();

        assert_eq!(price.current_price, dec!(195.40));
        assert_eq!(price.change_rate, dec!(0.76));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back_to_alternate_exchange() {
        let mut server = mockito::Server::new_async().await;
        let primary = price_mock(&mut server, "NYS", "WMT")
            .with_status(200)
            .with_body(EMPTY_BODY)
            .expect(1)
            .create_async()
            .await;
        let alternate = price_mock(&mut server, "NAS", "WMT")
            .with_status(200)
            .with_body(quote_body("159.20"))
            .expect(1)
            .create_async()
            .await;

        let client = KisUsClient::new(transport_for(&server.url()));
        let price = client.get_price("WMT").await.unwrap();

        assert_eq!(price.current_price, dec!(159.20));
        primary.assert_async().await;
        alternate.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_on_both_exchanges_is_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _primary = price_mock(&mut server, "NAS", "ZZZZ")
            .with_status(200)
            .with_body(EMPTY_BODY)
            .create_async()
            .await;
        let _alternate = price_mock(&mut server, "NYS", "ZZZZ")
            .with_status(200)
            .with_body(EMPTY_BODY)
            .create_async()
            .await;

        let client = KisUsClient::new(transport_for(&server.url()));
        let err = client.get_price("ZZZZ").await.unwrap_err();

        assert!(matches!(err, ExchangeError::EmptyResult(ref s) if s == "ZZZZ"));
    }

    #[tokio::test]
    async fn test_failed_alternate_lookup_keeps_its_error() {
        let mut server = mockito::Server::new_async().await;
        let _primary = price_mock(&mut server, "NAS", "MSFT")
            .with_status(200)
            .with_body(EMPTY_BODY)
            .create_async()
            .await;
        let _alternate = price_mock(&mut server, "NYS", "MSFT")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client = KisUsClient::new(transport_for(&server.url()));
        let err = client.get_price("MSFT").await.unwrap_err();

        assert!(matches!(err, ExchangeError::UpstreamHttp { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_business_error_skips_fallback() {
        let mut server = mockito::Server::new_async().await;
        let _primary = price_mock(&mut server, "NAS", "AAPL")
            .with_status(200)
            .with_body(r#"{"rt_cd":"1","msg_cd":"EGW00201","msg1":"초당 거래건수를 초과하였습니다."}"#)
            .create_async()
            .await;
        let alternate = price_mock(&mut server, "NYS", "AAPL")
            .with_status(200)
            .with_body(quote_body("230.00"))
            .expect(0)
            .create_async()
            .await;

        let client = KisUsClient::new(transport_for(&server.url()));
        let err = client.get_price("AAPL").await.unwrap_err();

        assert!(matches!(err, ExchangeError::RateLimited));
        alternate.assert_async().await;
    }
}
