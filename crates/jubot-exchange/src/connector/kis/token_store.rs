//! 접근 토큰 영속화.
//!
//! KIS는 토큰 발급을 분당 1회 수준으로 제한하므로 프로세스 재시작 후에도
//! 유효한 토큰을 재사용할 수 있도록 저장소에 보관합니다.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::auth::TokenState;
use crate::ExchangeError;

/// 토큰 저장소.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 저장된 토큰 로드. 없으면 `None`.
    async fn load(&self) -> Result<Option<TokenState>, ExchangeError>;

    /// 토큰 저장.
    async fn save(&self, token: &TokenState) -> Result<(), ExchangeError>;
}

/// JSON 파일 기반 토큰 저장소.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// 새 파일 저장소 생성.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 저장 경로.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenState>, ExchangeError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ExchangeError::Config(format!(
                    "토큰 캐시 읽기 실패 ({}): {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let token: TokenState = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), expires_at = %token.expires_at, "Loaded stored KIS token");
        Ok(Some(token))
    }

    async fn save(&self, token: &TokenState) -> Result<(), ExchangeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ExchangeError::Config(format!("토큰 캐시 디렉터리 생성 실패: {}", e))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(token)?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            ExchangeError::Config(format!(
                "토큰 캐시 쓰기 실패 ({}): {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token.json"));
        let token = TokenState::new(
            "abc123".to_string(),
            "Bearer".to_string(),
            Utc::now() + Duration::hours(24),
        );

        store.save(&token).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded, token);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileTokenStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, ExchangeError::ParseError(_)));
    }
}
