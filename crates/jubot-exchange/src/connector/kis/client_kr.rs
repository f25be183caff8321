//! KIS 국내 주식 시세 클라이언트.

use chrono::Utc;
use chrono_tz::Asia::Seoul;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::deserialize_decimal;
use super::tr_id;
use super::transport::KisTransport;
use crate::ExchangeError;

const PRICE_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-price";
const INDEX_CHART_PATH: &str = "/uapi/domestic-stock/v1/quotations/inquire-daily-indexchartprice";

/// 시장 분류 코드 (J = 주식/ETF/ETN).
const MARKET_DIV_STOCK: &str = "J";
/// 시장 분류 코드 (U = 업종/지수).
const MARKET_DIV_INDEX: &str = "U";

/// KIS 국내 주식 REST API 클라이언트.
///
/// 토큰 캐시와 호출 제한기는 [`KisTransport`]를 통해 해외 클라이언트와 공유합니다.
#[derive(Clone)]
pub struct KisKrClient {
    transport: KisTransport,
}

impl KisKrClient {
    /// 새로운 국내 주식 클라이언트 생성.
    pub fn new(transport: KisTransport) -> Self {
        Self { transport }
    }

    /// 주식현재가 시세 조회.
    ///
    /// # 인자
    /// * `stock_code` - 종목코드 (예: "005930" 삼성전자)
    pub async fn get_price(&self, stock_code: &str) -> Result<KrStockPrice, ExchangeError> {
        let resp = self
            .transport
            .get_json::<KrStockPrice>(
                PRICE_PATH,
                tr_id::KR_PRICE,
                &[
                    ("FID_COND_MRKT_DIV_CODE", MARKET_DIV_STOCK),
                    ("FID_INPUT_ISCD", stock_code),
                ],
            )
            .await?;

        let mut price = resp
            .into_result()?
            .ok_or_else(|| ExchangeError::EmptyResult(stock_code.to_string()))?;

        if price.stock_code.is_empty() {
            price.stock_code = stock_code.to_string();
        }

        debug!(symbol = stock_code, price = %price.current_price, "KR price fetched");
        Ok(price)
    }

    /// 국내 업종/지수 현재가 조회.
    ///
    /// 일별 지수 차트 API를 당일(KST) 하루 범위로 호출하고 스냅샷(`output1`)만 사용합니다.
    ///
    /// # 인자
    /// * `index_code` - 업종코드 (예: "0001" 코스피, "1001" 코스닥)
    pub async fn get_index(&self, index_code: &str) -> Result<KrIndexPrice, ExchangeError> {
        let today = Utc::now().with_timezone(&Seoul).format("%Y%m%d").to_string();

        let resp = self
            .transport
            .get_json::<KrIndexPrice>(
                INDEX_CHART_PATH,
                tr_id::KR_INDEX_CHART,
                &[
                    ("FID_COND_MRKT_DIV_CODE", MARKET_DIV_INDEX),
                    ("FID_INPUT_ISCD", index_code),
                    ("FID_INPUT_DATE_1", today.as_str()),
                    ("FID_INPUT_DATE_2", today.as_str()),
                    ("FID_PERIOD_DIV_CODE", "D"),
                ],
            )
            .await?;

        let index = resp
            .into_result()?
            .filter(|i| !i.current_value.is_zero())
            .ok_or_else(|| ExchangeError::EmptyResult(index_code.to_string()))?;

        debug!(index = index_code, value = %index.current_value, "KR index fetched");
        Ok(index)
    }
}

/// 국내 업종/지수 현재가.
///
/// 직렬화 시에도 KIS 필드명을 그대로 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct KrIndexPrice {
    /// 업종 지수 현재가
    #[serde(rename = "bstp_nmix_prpr", default, deserialize_with = "deserialize_decimal")]
    pub current_value: Decimal,
    /// 전일 대비
    #[serde(rename = "bstp_nmix_prdy_vrss", default, deserialize_with = "deserialize_decimal")]
    pub change: Decimal,
    /// 전일 대비율 (%)
    #[serde(rename = "bstp_nmix_prdy_ctrt", default, deserialize_with = "deserialize_decimal")]
    pub change_rate: Decimal,
    /// 업종명
    #[serde(rename = "hts_kor_isnm", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 국내 주식 시세 데이터.
///
/// 직렬화 시에도 KIS 필드명을 그대로 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct KrStockPrice {
    /// 종목코드
    #[serde(rename = "stck_shrn_iscd", default)]
    pub stock_code: String,
    /// 현재가
    #[serde(rename = "stck_prpr", default, deserialize_with = "deserialize_decimal")]
    pub current_price: Decimal,
    /// 전일대비
    #[serde(rename = "prdy_vrss", default, deserialize_with = "deserialize_decimal")]
    pub price_change: Decimal,
    /// 등락률 (%)
    #[serde(rename = "prdy_ctrt", default, deserialize_with = "deserialize_decimal")]
    pub change_rate: Decimal,
    /// 누적거래량
    #[serde(rename = "acml_vol", default, deserialize_with = "deserialize_decimal")]
    pub volume: Decimal,
    /// 누적거래대금
    #[serde(rename = "acml_tr_pbmn", default, deserialize_with = "deserialize_decimal")]
    pub trading_value: Decimal,
    /// 당일 고가
    #[serde(rename = "stck_hgpr", default, deserialize_with = "deserialize_decimal")]
    pub high: Decimal,
    /// 당일 저가
    #[serde(rename = "stck_lwpr", default, deserialize_with = "deserialize_decimal")]
    pub low: Decimal,
    /// 당일 시가
    #[serde(rename = "stck_oprc", default, deserialize_with = "deserialize_decimal")]
    pub open: Decimal,
    /// 기준가 (전일 종가)
    #[serde(rename = "stck_sdpr", default, deserialize_with = "deserialize_decimal")]
    pub prev_close: Decimal,
    /// 업종명
    #[serde(rename = "bstp_kor_isnm", default, skip_serializing_if = "Option::is_none")]
    pub sector_name: Option<String>,
}
