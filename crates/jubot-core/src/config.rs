//! 설정 관리.
//!
//! 서버, 로깅, 업스트림 호출 제한, 배치 조회 설정을 정의합니다.
//! 값의 우선순위는 `환경 변수 > 설정 파일 > 기본값` 입니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 업스트림 호출 제한 설정
    pub rate_limit: RateLimitSettings,
    /// 배치 시세 조회 설정
    pub batch: BatchSettings,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 전체 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// `host:port` 문자열 반환.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 업스트림 API 호출 제한 설정.
///
/// KIS 표준 한도(초당 약 20회)에 맞춘 값이 기본값입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// 동시에 실행 가능한 최대 요청 수
    pub max_concurrency: usize,
    /// 요청 시작 사이의 최소 간격 (밀리초)
    pub min_interval_ms: u64,
    /// 토큰 발급 요청도 호출 제한기를 거칠지 여부
    pub throttle_token_issue: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            min_interval_ms: 50,
            throttle_token_issue: false,
        }
    }
}

impl RateLimitSettings {
    /// 최소 간격을 `Duration`으로 반환.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// 배치 시세 조회 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchSettings {
    /// 청크 당 종목 수
    pub chunk_size: usize,
    /// 청크 사이 대기 시간 (밀리초)
    pub chunk_delay_ms: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            chunk_delay_ms: 200,
        }
    }
}

impl BatchSettings {
    /// 청크 사이 대기 시간을 `Duration`으로 반환.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    /// 환경 변수는 `JUBOT__SERVER__PORT=8080` 형식입니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("JUBOT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load(DEFAULT_CONFIG_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.max_concurrency, 10);
        assert_eq!(config.rate_limit.min_interval(), Duration::from_millis(50));
        assert!(!config.rate_limit.throttle_token_issue);
        assert_eq!(config.batch.chunk_size, 5);
        assert_eq!(config.batch.chunk_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[rate_limit]
throttle_token_issue = true

[batch]
chunk_size = 3
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.batch.chunk_size, 3);
        assert!(config.rate_limit.throttle_token_issue);
        assert_eq!(config.rate_limit.max_concurrency, 10);
        assert_eq!(config.batch.chunk_delay_ms, 200);
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
    }
}
