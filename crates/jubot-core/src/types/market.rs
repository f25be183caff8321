//! 시세 조회 대상 시장 구분.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 시세를 조회할 시장.
///
/// 집계 엔드포인트의 `market` 쿼리 파라미터(`KR` | `US`)와 1:1로 대응합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// 국내 주식 (KOSPI/KOSDAQ)
    #[serde(rename = "KR")]
    Domestic,
    /// 해외 주식 (미국)
    #[serde(rename = "US")]
    Overseas,
}

impl Market {
    /// 쿼리 파라미터 표기 반환.
    pub fn code(&self) -> &'static str {
        match self {
            Market::Domestic => "KR",
            Market::Overseas => "US",
        }
    }

    /// 국내 시장 여부.
    pub fn is_domestic(&self) -> bool {
        matches!(self, Market::Domestic)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "KR" | "KRX" | "DOMESTIC" => Ok(Market::Domestic),
            "US" | "OVERSEAS" => Ok(Market::Overseas),
            _ => Err(format!("Unknown market: {}", s)),
        }
    }
}
