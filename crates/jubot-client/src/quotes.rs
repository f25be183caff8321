//! `/prices` 응답을 화면용 시세 요약으로 변환.
//!
//! 집계 엔드포인트는 KIS 원본 필드명 그대로 값을 돌려주므로 시장별로 읽는 필드가 다릅니다.
//!
//! | 시장 | 현재가 | 전일 대비 | 등락률 |
//! |------|--------|-----------|--------|
//! | KR   | `stck_prpr` | `prdy_vrss` | `prdy_ctrt` |
//! | US   | `last` | `diff` | `rate` |

use jubot_core::Market;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::FetchError;
use crate::fetch::ResponseParser;

/// 종목 하나의 시세 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    /// 현재가
    pub price: Decimal,
    /// 전일 대비 (부호는 등락률을 따름)
    pub change: Decimal,
    /// 전일 대비 등락률 (%)
    pub change_percent: Decimal,
}

/// 시장별 `/prices` 응답 파서 생성.
///
/// `null`이거나 현재가가 0 이하인 종목은 결과에서 빠집니다.
/// 본문이 JSON 객체가 아니면 [`FetchError::Parse`]입니다.
pub fn parse_batch_quotes(market: Market) -> ResponseParser<HashMap<String, StockSnapshot>> {
    Arc::new(move |value: Value| {
        let entries = match value {
            Value::Object(entries) => entries,
            other => {
                return Err(FetchError::Parse(format!(
                    "expected a symbol map, got {}",
                    value_kind(&other)
                )))
            }
        };

        let snapshots: HashMap<String, StockSnapshot> = entries
            .iter()
            .filter_map(|(symbol, item)| {
                snapshot_from(item, market).map(|snapshot| (symbol.clone(), snapshot))
            })
            .collect();

        Ok(Some(snapshots))
    })
}

fn snapshot_from(item: &Value, market: Market) -> Option<StockSnapshot> {
    if !item.is_object() {
        return None;
    }

    let (price_key, diff_key, rate_key) = match market {
        Market::Domestic => ("stck_prpr", "prdy_vrss", "prdy_ctrt"),
        Market::Overseas => ("last", "diff", "rate"),
    };

    let price = decimal_field(item, price_key);
    if price <= Decimal::ZERO {
        return None;
    }

    let diff = decimal_field(item, diff_key).abs();
    let rate = decimal_field(item, rate_key);
    let change = if rate < Decimal::ZERO { -diff } else { diff };

    Some(StockSnapshot {
        price,
        change,
        change_percent: rate,
    })
}

/// 문자열("1,234.5") 또는 숫자 필드를 Decimal로. 없거나 해석 불가면 0.
fn decimal_field(item: &Value, key: &str) -> Decimal {
    match item.get(key) {
        Some(Value::String(s)) => Decimal::from_str(s.replace(',', "").trim()).unwrap_or_default(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_domestic_fields() {
        let parser = parse_batch_quotes(Market::Domestic);
        let body = json!({
            "005930": {"stck_prpr": "71500", "prdy_vrss": "-500", "prdy_ctrt": "-0.69"},
            "000660": {"stck_prpr": "182,000", "prdy_vrss": "3000", "prdy_ctrt": "1.68"},
            "035720": null
        });

        let quotes = parser(body).unwrap().unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(
            quotes["005930"],
            StockSnapshot {
                price: dec!(71500),
                change: dec!(-500),
                change_percent: dec!(-0.69),
            }
        );
        assert_eq!(quotes["000660"].price, dec!(182000));
        assert!(!quotes.contains_key("035720"));
    }

    #[test]
    fn test_change_sign_follows_rate() {
        let parser = parse_batch_quotes(Market::Overseas);
        // 일부 응답은 diff를 절대값으로 내려줌
        let body = json!({
            "AAPL": {"last": "230.10", "diff": "2.35", "rate": "-1.01"},
            "MSFT": {"last": 415.5, "diff": -1.2, "rate": 0.29}
        });

        let quotes = parser(body).unwrap().unwrap();

        assert_eq!(quotes["AAPL"].change, dec!(-2.35));
        assert_eq!(quotes["MSFT"].change, dec!(1.2));
        assert_eq!(quotes["MSFT"].price, dec!(415.5));
    }

    #[test]
    fn test_zero_price_entries_dropped() {
        let parser = parse_batch_quotes(Market::Overseas);
        let body = json!({
            "HALT": {"last": "", "diff": "0", "rate": "0"},
            "ZERO": {"last": "0"},
            "NVDA": {"last": "120.00"}
        });

        let quotes = parser(body).unwrap().unwrap();

        assert_eq!(quotes.keys().collect::<Vec<_>>(), vec!["NVDA"]);
        assert_eq!(quotes["NVDA"].change, Decimal::ZERO);
    }

    #[test]
    fn test_empty_map_is_a_value() {
        let parser = parse_batch_quotes(Market::Domestic);
        let quotes = parser(json!({})).unwrap();
        assert_eq!(quotes, Some(HashMap::new()));
    }

    #[test]
    fn test_non_object_body_is_parse_error() {
        let parser = parse_batch_quotes(Market::Domestic);
        let err = parser(json!(["005930"])).unwrap_err();
        assert!(matches!(err, FetchError::Parse(ref m) if m.contains("array")));
    }
}
