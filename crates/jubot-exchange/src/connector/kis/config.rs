//! 한국투자증권 (KIS) API 설정.
//!
//! KIS API는 app_key와 app_secret을 사용한 OAuth 2.0 인증이 필요합니다.
//! 시세 조회만 사용하므로 계좌 정보는 필요하지 않습니다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ExchangeError;

/// 앱키/앱시크릿 최소 길이.
const MIN_CREDENTIAL_LEN: usize = 20;

/// KIS API 환경 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KisEnvironment {
    /// 실전투자
    #[default]
    Real,
    /// 모의투자
    Paper,
}

impl KisEnvironment {
    /// 이 환경의 REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            KisEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }

    /// 문자열에서 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "real" | "prod" | "production" => Some(KisEnvironment::Real),
            "paper" | "mock" | "test" => Some(KisEnvironment::Paper),
            _ => None,
        }
    }
}

/// KIS API 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KisConfig {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: String,
    /// 환경 (실전/모의)
    pub environment: KisEnvironment,
    /// 기본 URL 재정의 (테스트, 프록시용)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 개인인증 활성화 (`custtype: P` 헤더)
    pub personalized: bool,
    /// 만료 몇 초 전부터 토큰을 갱신할지
    pub token_refresh_margin_secs: i64,
    /// 토큰 캐시 파일 경로
    pub token_cache_path: Option<PathBuf>,
}

impl KisConfig {
    /// 새로운 KIS 설정 생성.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            environment: KisEnvironment::Real,
            base_url: None,
            timeout_secs: 30,
            personalized: false,
            token_refresh_margin_secs: 60,
            token_cache_path: None,
        }
    }

    /// 환경 설정.
    pub fn with_environment(mut self, env: KisEnvironment) -> Self {
        self.environment = env;
        self
    }

    /// 기본 URL 재정의. 끝의 `/`는 제거됩니다.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// 개인인증 헤더 사용 여부.
    pub fn with_personalized(mut self, enabled: bool) -> Self {
        self.personalized = enabled;
        self
    }

    /// 토큰 갱신 여유 시간 (초).
    pub fn with_refresh_margin_secs(mut self, secs: i64) -> Self {
        self.token_refresh_margin_secs = secs.max(0);
        self
    }

    /// 토큰 캐시 파일 경로.
    pub fn with_token_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_cache_path = Some(path.into());
        self
    }

    /// 환경 변수에서 설정 생성.
    ///
    /// # 환경 변수
    /// - `KIS_APP_KEY`, `KIS_APP_SECRET` (필수)
    /// - `KIS_ENVIRONMENT`: "real" | "paper" (기본값: real)
    /// - `KIS_BASE_URL`: 기본 URL 재정의
    /// - `KIS_TOKEN_CACHE_PATH`: 토큰 캐시 파일 경로
    pub fn from_env() -> Option<Self> {
        let app_key = std::env::var("KIS_APP_KEY").ok()?;
        let app_secret = std::env::var("KIS_APP_SECRET").ok()?;

        let mut config = Self::new(app_key, app_secret);

        if let Some(env) = std::env::var("KIS_ENVIRONMENT")
            .ok()
            .and_then(|s| KisEnvironment::parse(&s))
        {
            config = config.with_environment(env);
        }
        if let Ok(url) = std::env::var("KIS_BASE_URL") {
            if !url.trim().is_empty() {
                config = config.with_base_url(url.trim());
            }
        }
        if let Ok(path) = std::env::var("KIS_TOKEN_CACHE_PATH") {
            config = config.with_token_cache_path(path);
        }

        Some(config)
    }

    /// 인증 정보 형식 검증.
    ///
    /// # Errors
    /// 앱키나 앱시크릿이 비어 있거나 너무 짧으면 `ExchangeError::Unauthorized`를 반환합니다.
    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.app_key.len() < MIN_CREDENTIAL_LEN {
            return Err(ExchangeError::Unauthorized(
                "KIS_APP_KEY 환경변수가 올바르게 설정되지 않았습니다.".to_string(),
            ));
        }
        if self.app_secret.len() < MIN_CREDENTIAL_LEN {
            return Err(ExchangeError::Unauthorized(
                "KIS_APP_SECRET 환경변수가 올바르게 설정되지 않았습니다.".to_string(),
            ));
        }
        Ok(())
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.rest_base_url())
    }

    /// 로그용으로 앞 8자리만 남긴 앱키.
    pub fn masked_app_key(&self) -> String {
        let prefix: String = self.app_key.chars().take(8).collect();
        format!("{}...", prefix)
    }
}
