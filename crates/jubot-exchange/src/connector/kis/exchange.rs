//! 미국 종목의 KIS 거래소 코드 판별.
//!
//! KIS 해외 시세 API는 종목과 함께 거래소 코드(`EXCD`)를 요구합니다.
//! 정확한 상장 거래소를 모르는 종목은 NASDAQ으로 간주하고, 응답이 비어 있으면
//! 클라이언트가 [`alternate_exchange`]로 한 번 더 조회합니다.

use super::exchange_code::{AMEX, NASDAQ, NYSE};

/// NYSE 상장으로 알려진 종목.
const NYSE_SYMBOLS: &[&str] = &[
    "JPM", "BAC", "WMT", "TGT", "KO", "MCD", "DIS", "NKE", "TM", "TSM", "HD", "V", "MA", "PFE",
];

/// AMEX 상장으로 알려진 종목.
const AMEX_SYMBOLS: &[&str] = &["AMEX"];

/// 심볼에 맞는 KIS 거래소 코드 반환.
pub fn resolve_exchange_code(symbol: &str) -> &'static str {
    match symbol {
        ".DJI" | ".SPX" | "SPX" | ".INX" => return NYSE,
        ".IXIC" | "COMP" | ".COMP" => return NASDAQ,
        _ => {}
    }

    if NYSE_SYMBOLS.contains(&symbol) {
        NYSE
    } else if AMEX_SYMBOLS.contains(&symbol) {
        AMEX
    } else {
        NASDAQ
    }
}

/// 빈 응답 시 재시도할 대체 거래소 코드.
pub fn alternate_exchange(code: &str) -> &'static str {
    if code == NYSE {
        NASDAQ
    } else {
        NYSE
    }
}
