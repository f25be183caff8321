//! 재시도와 취소를 갖춘 조회 상태 머신.
//!
//! 하나의 [`ResilientFetch`]는 URL 하나에 대한 조회 사이클을 관리합니다.
//!
//! # 사이클
//!
//! - 생성, URL 변경, `enabled` 변경, [`ResilientFetch::refetch`] 호출 시 새 사이클이 시작됩니다.
//!   진행 중이던 이전 사이클은 취소되며 이후 상태를 바꿀 수 없습니다.
//! - 시도 N(0부터)은 N>0일 때 `retry_delay_base * 2^(N-1)`만큼 기다린 뒤 요청합니다.
//! - 각 시도는 `timeout` 안에 끝나야 하며, 타임아웃은 다음 시도로 넘어가는 실패입니다.
//! - 2xx 응답이고 파서가 값을 돌려주면 성공입니다. 총 `max_retries + 1`번 시도 후에도
//!   실패하면 마지막 실패 사유를 `error`에 남깁니다.
//!
//! 모든 상태 변경은 `watch` 채널 안에서 사이클 ID를 비교한 뒤 수행되므로, 비교와 변경
//! 사이에 다른 사이클이 끼어들 수 없습니다.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::transport::{HttpResponse, HttpTransport};

/// 응답 JSON을 결과 값으로 변환하는 파서.
///
/// `Ok(None)`은 "비어 있는 응답"으로 취급되어 재시도 대상이 됩니다.
pub type ResponseParser<T> = Arc<dyn Fn(Value) -> Result<Option<T>, FetchError> + Send + Sync>;

/// 조회 옵션.
pub struct FetchOptions<T> {
    /// 첫 시도 이후 최대 재시도 횟수
    pub max_retries: u32,
    /// 지수 백오프 기준 지연
    pub retry_delay_base: Duration,
    /// 시도별 타임아웃
    pub timeout: Duration,
    /// 자동 조회 여부
    pub enabled: bool,
    /// 응답 파서
    pub parser: ResponseParser<T>,
}

impl<T: DeserializeOwned + 'static> Default for FetchOptions<T> {
    fn default() -> Self {
        Self::new(Arc::new(deserialize_parser::<T>))
    }
}

impl<T> FetchOptions<T> {
    /// 주어진 파서와 기본 재시도 설정으로 생성.
    pub fn new(parser: ResponseParser<T>) -> Self {
        Self {
            max_retries: 3,
            retry_delay_base: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            enabled: true,
            parser,
        }
    }

    /// 최대 재시도 횟수 설정.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 백오프 기준 지연 설정.
    pub fn with_retry_delay_base(mut self, base: Duration) -> Self {
        self.retry_delay_base = base;
        self
    }

    /// 시도별 타임아웃 설정.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 자동 조회 여부 설정.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 파서 설정.
    pub fn with_parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(Value) -> Result<Option<T>, FetchError> + Send + Sync + 'static,
    {
        self.parser = Arc::new(parser);
        self
    }
}

impl<T> Clone for FetchOptions<T> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            retry_delay_base: self.retry_delay_base,
            timeout: self.timeout,
            enabled: self.enabled,
            parser: Arc::clone(&self.parser),
        }
    }
}

/// 기본 파서: JSON을 `T`로 역직렬화. `null`은 빈 응답.
fn deserialize_parser<T: DeserializeOwned>(value: Value) -> Result<Option<T>, FetchError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some).map_err(FetchError::from)
}

/// 시도 N(N>0) 전에 기다릴 시간: `base * 2^(N-1)`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// 외부에서 관찰하는 조회 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    /// 마지막으로 성공한 결과
    pub data: Option<T>,
    /// 사이클 진행 중 여부
    pub loading: bool,
    /// 재시도 소진 후의 마지막 실패 사유
    pub error: Option<FetchError>,
    /// 현재 사이클에서 수행한 재시도 횟수
    pub retry_count: u32,
    cycle: u64,
}

impl<T> FetchState<T> {
    fn idle() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            retry_count: 0,
            cycle: 0,
        }
    }

    /// 재시도 중인지 (첫 시도 실패 후 아직 진행 중).
    pub fn is_retrying(&self) -> bool {
        self.loading && self.retry_count > 0
    }

    /// 재시도를 모두 소진하고 실패했는지.
    pub fn is_failed(&self) -> bool {
        !self.loading && self.error.is_some()
    }
}

struct Control {
    url: Option<String>,
    enabled: bool,
    cycle: u64,
    cancel: Option<CancellationToken>,
}

struct Shared<T> {
    transport: Arc<dyn HttpTransport>,
    max_retries: u32,
    retry_delay_base: Duration,
    timeout: Duration,
    parser: ResponseParser<T>,
    state: watch::Sender<FetchState<T>>,
    control: Mutex<Control>,
}

impl<T> Shared<T> {
    /// `cycle`이 현재 사이클일 때만 상태를 변경. 변경했으면 `true`.
    fn update_if_current(&self, cycle: u64, f: impl FnOnce(&mut FetchState<T>)) -> bool {
        self.state.send_if_modified(|state| {
            if state.cycle != cycle {
                return false;
            }
            f(state);
            true
        })
    }

    fn interpret(&self, response: HttpResponse) -> Result<T, FetchError> {
        if !response.is_success() {
            return Err(FetchError::Http {
                status: response.status,
            });
        }
        let value: Value = serde_json::from_str(&response.body)?;
        (self.parser)(value)?.ok_or(FetchError::EmptyResult)
    }
}

/// 재시도/타임아웃/취소를 갖춘 조회기.
///
/// tokio 런타임 안에서 생성해야 합니다. drop되면 진행 중인 사이클이 취소됩니다.
pub struct ResilientFetch<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ResilientFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 새 조회기 생성. `enabled`이고 URL이 있으면 즉시 첫 사이클을 시작합니다.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        url: Option<String>,
        options: FetchOptions<T>,
    ) -> Self {
        let (state, _) = watch::channel(FetchState::idle());
        let shared = Arc::new(Shared {
            transport,
            max_retries: options.max_retries,
            retry_delay_base: options.retry_delay_base,
            timeout: options.timeout,
            parser: options.parser,
            state,
            control: Mutex::new(Control {
                url,
                enabled: options.enabled,
                cycle: 0,
                cancel: None,
            }),
        });

        let fetch = Self { shared };
        fetch.restart();
        fetch
    }

    /// 현재 상태 스냅샷.
    pub fn state(&self) -> FetchState<T> {
        self.shared.state.borrow().clone()
    }

    /// 상태 변경 구독.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    /// 진행 중인 사이클이 끝날 때까지 기다린 뒤 상태 반환.
    pub async fn settled(&self) -> FetchState<T> {
        let mut rx = self.subscribe();
        // 송신자는 self가 보유하므로 채널이 닫히지 않음
        let settled = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// 새 사이클을 시작합니다. 진행 중인 사이클은 취소됩니다.
    pub fn refetch(&self) {
        debug!("Manual refetch requested");
        self.restart();
    }

    /// 조회 URL 변경. 바뀐 경우에만 새 사이클을 시작합니다.
    pub fn set_url(&self, url: Option<String>) {
        {
            let mut control = self.lock_control();
            if control.url == url {
                return;
            }
            control.url = url;
        }
        self.restart();
    }

    /// 자동 조회 활성화 여부 변경.
    ///
    /// 비활성화하면 진행 중인 사이클이 취소되고 `loading`이 `false`가 됩니다.
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut control = self.lock_control();
            if control.enabled == enabled {
                return;
            }
            control.enabled = enabled;
        }
        self.restart();
    }

    fn lock_control(&self) -> std::sync::MutexGuard<'_, Control> {
        self.shared
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// 이전 사이클을 무효화하고, 조건이 맞으면 새 사이클을 시작.
    fn restart(&self) {
        let mut control = self.lock_control();

        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
        }
        control.cycle += 1;
        let cycle = control.cycle;

        let url = match (&control.url, control.enabled) {
            (Some(url), true) => url.clone(),
            _ => {
                // 유휴: 데이터는 유지하고 진행 표시만 해제
                self.shared.state.send_if_modified(|state| {
                    let was_loading = state.loading;
                    state.cycle = cycle;
                    state.loading = false;
                    was_loading
                });
                return;
            }
        };

        self.shared.state.send_modify(|state| {
            state.cycle = cycle;
            state.loading = true;
            state.error = None;
            state.retry_count = 0;
        });

        let cancel = CancellationToken::new();
        control.cancel = Some(cancel.clone());
        drop(control);

        tokio::spawn(run_cycle(Arc::clone(&self.shared), url, cycle, cancel));
    }
}

impl<T> Drop for ResilientFetch<T> {
    fn drop(&mut self) {
        let mut control = self
            .shared
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(cancel) = control.cancel.take() {
            cancel.cancel();
        }
        control.cycle += 1;
        let cycle = control.cycle;
        self.shared.state.send_if_modified(|state| {
            state.cycle = cycle;
            false
        });
    }
}

async fn run_cycle<T>(shared: Arc<Shared<T>>, url: String, cycle: u64, cancel: CancellationToken)
where
    T: Send + Sync + 'static,
{
    let mut last_error = FetchError::EmptyResult;

    for attempt in 0..=shared.max_retries {
        if attempt > 0 {
            let delay = backoff_delay(shared.retry_delay_base, attempt);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !shared.update_if_current(cycle, |state| state.retry_count = attempt) {
                return;
            }
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return,
            outcome = tokio::time::timeout(shared.timeout, shared.transport.get(&url)) => outcome,
        };

        let result = match outcome {
            Err(_) => Err(FetchError::Timeout),
            Ok(Err(e)) => Err(e),
            Ok(Ok(response)) => shared.interpret(response),
        };

        match result {
            Ok(data) => {
                if shared.update_if_current(cycle, |state| {
                    state.data = Some(data);
                    state.loading = false;
                    state.error = None;
                }) {
                    debug!(url = %url, attempt, "Fetch succeeded");
                }
                return;
            }
            Err(e) => {
                warn!(url = %url, attempt, max_retries = shared.max_retries, error = %e, "Fetch attempt failed");
                last_error = e;
            }
        }
    }

    info!(url = %url, error = %last_error, "Fetch retries exhausted");
    shared.update_if_current(cycle, |state| {
        state.loading = false;
        state.error = Some(last_error);
    });
}
