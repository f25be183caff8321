//! 업스트림 API 호출 제한기.
//!
//! 동시 실행 수 상한과 요청 시작 간 최소 간격을 함께 적용합니다.
//!
//! # 보장
//!
//! - 요청 시작 순서는 제출 순서(FIFO)와 같습니다. 완료 순서는 보장하지 않습니다.
//! - 동시에 실행 중인 작업 수는 `max_concurrency`를 넘지 않습니다.
//! - 작업이 실패하거나 호출 측 future가 drop되어도 슬롯은 반드시 반환됩니다.
//! - 제한기는 재시도하지 않습니다. 작업의 결과(에러 포함)는 그대로 호출자에게 전달됩니다.
//!
//! 제출 순서는 `add`가 반환한 future가 처음 poll된 시점에 확정됩니다.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jubot_core::RateLimitSettings;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::trace;

/// 호출 제한기 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// 동시에 실행 가능한 최대 작업 수
    pub max_concurrency: usize,
    /// 작업 시작 사이의 최소 간격
    pub min_interval: Duration,
}

impl Default for RateLimiterConfig {
    /// 10개 동시 실행, 50ms 간격 (초당 약 20회, KIS 표준 한도).
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            min_interval: Duration::from_millis(50),
        }
    }
}

impl RateLimiterConfig {
    /// 새 설정 생성. 동시 실행 수는 최소 1입니다.
    pub fn new(max_concurrency: usize, min_interval: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            min_interval,
        }
    }
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self::new(settings.max_concurrency, settings.min_interval())
    }
}

/// FIFO 호출 제한기.
///
/// 전역 인스턴스 없이 명시적으로 생성하여 `Arc`로 공유합니다.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    permits: Semaphore,
    /// 디스패치 게이트. 보유자만 다음 작업을 시작할 수 있으며 마지막 시작 시각을 기록합니다.
    gate: Mutex<Option<Instant>>,
    queued: AtomicUsize,
}

/// 대기열 카운터를 감소시키는 가드.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RateLimiter {
    /// 새 호출 제한기 생성.
    pub fn new(config: RateLimiterConfig) -> Self {
        let config = RateLimiterConfig::new(config.max_concurrency, config.min_interval);
        Self {
            permits: Semaphore::new(config.max_concurrency),
            gate: Mutex::new(None),
            queued: AtomicUsize::new(0),
            config,
        }
    }

    /// 작업을 대기열에 넣고 실행 결과를 반환합니다.
    ///
    /// 실행 슬롯과 최소 간격이 확보되면 `operation`을 호출합니다.
    pub async fn add<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.queued.fetch_add(1, Ordering::SeqCst);

        let _permit = {
            let _queued = QueuedGuard(&self.queued);
            let mut last_dispatch = self.gate.lock().await;

            let permit = self
                .permits
                .acquire()
                .await
                .expect("rate limiter semaphore is never closed");

            if let Some(last) = *last_dispatch {
                let next_allowed = last + self.config.min_interval;
                if Instant::now() < next_allowed {
                    tokio::time::sleep_until(next_allowed).await;
                }
            }
            *last_dispatch = Some(Instant::now());
            permit
        };

        trace!(in_flight = self.in_flight(), queued = self.queued(), "Dispatching rate-limited task");

        operation().await
    }

    /// 현재 실행 중인 작업 수.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrency - self.permits.available_permits()
    }

    /// 실행을 기다리는 작업 수.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// 설정 반환.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::{Arc, Mutex as StdMutex};

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_ceiling() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(3, Duration::ZERO)));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..10).map(|i| {
            let limiter = limiter.clone();
            let running = running.clone();
            let peak = peak.clone();
            async move {
                limiter
                    .add(|| async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100 + i * 7)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        i
                    })
                    .await
            }
        });

        let results = join_all(tasks).await;

        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_order_is_fifo_with_min_interval() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(5, Duration::from_millis(50))));
        let starts = Arc::new(StdMutex::new(Vec::new()));
        let origin = Instant::now();

        let tasks = (0..5).map(|i| {
            let limiter = limiter.clone();
            let starts = starts.clone();
            async move {
                limiter
                    .add(|| async move {
                        starts.lock().unwrap().push((i, origin.elapsed()));
                    })
                    .await
            }
        });
        join_all(tasks).await;

        let starts = starts.lock().unwrap().clone();
        let order: Vec<_> = starts.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);

        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_task_does_not_stall_queue() {
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, Duration::ZERO));

        let failed: Result<(), &str> = limiter.add(|| async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));

        let ok: Result<u32, &str> = limiter.add(|| async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_releases_slot() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(1, Duration::ZERO)));

        let blocked = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .add(|| tokio::time::sleep(Duration::from_secs(3600)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(limiter.in_flight(), 1);

        blocked.abort();
        let _ = blocked.await;
        assert_eq!(limiter.in_flight(), 0);

        let value = limiter.add(|| async { "next" }).await;
        assert_eq!(value, "next");
    }

    #[test]
    fn test_config_from_settings_clamps_concurrency() {
        let settings = RateLimitSettings {
            max_concurrency: 0,
            min_interval_ms: 20,
            ..Default::default()
        };
        let config = RateLimiterConfig::from(&settings);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.min_interval, Duration::from_millis(20));
    }
}
