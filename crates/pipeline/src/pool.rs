//! 워커 풀 -- 메시지 단위 핸들러의 바운디드 병렬 실행
//!
//! 하나의 바운디드 큐를 여러 워커 태스크가 소비합니다. 큐가 가득 차면
//! [`WorkerPool::submit`]은 메시지를 드롭하고 `false`를 반환합니다
//! (backpressure). 핸들러 에러는 워커를 죽이지 않고 실패 결과로
//! 변환됩니다.
//!
//! # 종료 의미론
//!
//! [`WorkerPool::stop`]은 (i) 새 작업 수용을 중단하고, (ii) 워커가
//! 메시지 사이에서 취소를 관측해 종료하게 하며, (iii) 모든 워커를
//! 기다린 뒤 반환합니다. 취소는 에러가 아닙니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logloom_core::config::PoolSettings;
use logloom_core::error::LogloomError;
use logloom_core::metrics::{
    PIPELINE_LOGS_DROPPED_TOTAL, PIPELINE_PROCESS_DURATION_SECONDS, PIPELINE_QUEUE_DEPTH,
};
use logloom_core::types::LogMessage;

/// 배치 수집 데드라인
const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// 큐 포화 판정 비율 -- 이 이상이면 unhealthy
const SATURATION_RATIO: f64 = 0.9;

/// 메시지 핸들러 trait
///
/// 워커 풀이 메시지마다 호출하는 처리 로직입니다.
/// 새로운 처리 단계를 추가하려면 이 trait을 구현합니다.
pub trait MessageHandler: Send + Sync + 'static {
    /// 성공 시 결과 타입
    type Output: Send + 'static;

    /// 메시지 하나를 처리합니다.
    fn handle(
        &self,
        msg: LogMessage,
    ) -> impl Future<Output = Result<Self::Output, LogloomError>> + Send;
}

/// 메시지 하나의 처리 결과
#[derive(Debug)]
pub struct ProcessResult<T> {
    /// 처리한 메시지의 ID
    pub message_id: String,
    /// 핸들러 성공 여부
    pub success: bool,
    /// 성공 시 핸들러 출력
    pub data: Option<T>,
    /// 실패 시 에러 메시지
    pub error: Option<String>,
}

/// 워커 풀 메트릭 스냅샷
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolMetrics {
    /// 성공적으로 처리된 메시지 수
    pub processed: u64,
    /// 핸들러 에러 수
    pub errors: u64,
    /// 큐 포화로 드롭된 메시지 수
    pub dropped: u64,
    /// 성공 처리의 누적 평균 소요 시간
    pub avg_process_time: Duration,
}

/// 공유 카운터
#[derive(Debug, Default)]
struct PoolCounters {
    processed: AtomicU64,
    errors: AtomicU64,
    dropped: AtomicU64,
    total_nanos: AtomicU64,
}

/// 바운디드 워커 풀
pub struct WorkerPool<H: MessageHandler> {
    settings: PoolSettings,
    handler: Arc<H>,
    task_tx: mpsc::Sender<LogMessage>,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<LogMessage>>>,
    result_tx: mpsc::Sender<ProcessResult<H::Output>>,
    result_rx: tokio::sync::Mutex<mpsc::Receiver<ProcessResult<H::Output>>>,
    cancel: CancellationToken,
    counters: Arc<PoolCounters>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<H: MessageHandler> WorkerPool<H> {
    /// 새 워커 풀을 생성합니다. [`WorkerPool::start`] 전에는 워커가 없습니다.
    pub fn new(settings: PoolSettings, handler: H, cancel: CancellationToken) -> Self {
        let (task_tx, task_rx) = mpsc::channel(settings.buffer_size);
        let (result_tx, result_rx) = mpsc::channel(settings.buffer_size);
        Self {
            settings,
            handler: Arc::new(handler),
            task_tx,
            task_rx: Arc::new(tokio::sync::Mutex::new(task_rx)),
            result_tx,
            result_rx: tokio::sync::Mutex::new(result_rx),
            cancel,
            counters: Arc::new(PoolCounters::default()),
            workers: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// 워커 태스크를 스폰합니다.
    pub async fn start(&self) {
        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.settings.workers {
            let task_rx = Arc::clone(&self.task_rx);
            let result_tx = self.result_tx.clone();
            let handler = Arc::clone(&self.handler);
            let counters = Arc::clone(&self.counters);
            let cancel = self.cancel.clone();

            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, task_rx, result_tx, handler, counters, cancel).await;
            }));
        }
        tracing::info!(workers = self.settings.workers, "worker pool started");
    }

    /// 워커 메인 루프 -- 메시지 사이에서만 취소를 관측합니다.
    async fn worker_loop(
        worker_id: usize,
        task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<LogMessage>>>,
        result_tx: mpsc::Sender<ProcessResult<H::Output>>,
        handler: Arc<H>,
        counters: Arc<PoolCounters>,
        cancel: CancellationToken,
    ) {
        loop {
            let msg = {
                let mut rx = task_rx.lock().await;
                tokio::select! {
                    // 취소가 우선: 취소 이후에는 큐에 남은 메시지를 집지 않음
                    biased;
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Some(msg) => msg,
                        None => break,
                    },
                }
            };

            let message_id = msg.id.clone();
            let start = tokio::time::Instant::now();
            let result = match handler.handle(msg).await {
                Ok(data) => {
                    let elapsed = start.elapsed();
                    counters.processed.fetch_add(1, Ordering::Relaxed);
                    counters
                        .total_nanos
                        .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    metrics::histogram!(PIPELINE_PROCESS_DURATION_SECONDS)
                        .record(elapsed.as_secs_f64());
                    ProcessResult {
                        message_id,
                        success: true,
                        data: Some(data),
                        error: None,
                    }
                }
                Err(e) => {
                    counters.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(worker_id, error = %e, "handler error");
                    ProcessResult {
                        message_id,
                        success: false,
                        data: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            // 결과 버퍼가 가득 차면 결과만 드롭 (핸들러의 부수효과는 이미 발생)
            if result_tx.try_send(result).is_err() {
                tracing::debug!(worker_id, "result buffer full, dropping result");
            }
        }
    }

    /// 메시지를 논블로킹으로 제출합니다.
    ///
    /// 큐가 가득 찼거나 풀이 취소된 경우 `false`를 반환하며,
    /// 가득 참으로 인한 거부는 `dropped` 카운터에 집계됩니다.
    pub fn submit(&self, msg: LogMessage) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.task_tx.try_send(msg) {
            Ok(()) => {
                metrics::gauge!(PIPELINE_QUEUE_DEPTH).set(self.queue_size() as f64);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(PIPELINE_LOGS_DROPPED_TOTAL).increment(1);
                tracing::warn!(
                    capacity = self.settings.buffer_size,
                    "message dropped, queue full"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// 큐에 자리가 날 때까지 블로킹하며 제출합니다.
    ///
    /// 풀이 취소되면 `false`를 반환합니다.
    pub async fn submit_blocking(&self, msg: LogMessage) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.task_tx.send(msg) => sent.is_ok(),
        }
    }

    /// 다음 처리 결과를 기다립니다.
    pub async fn next_result(&self) -> Option<ProcessResult<H::Output>> {
        self.result_rx.lock().await.recv().await
    }

    /// 쌓여 있는 결과를 논블로킹으로 모두 꺼냅니다.
    pub async fn drain_results(&self) -> Vec<ProcessResult<H::Output>> {
        let mut rx = self.result_rx.lock().await;
        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }
        results
    }

    /// 메시지 배치를 제출하고 결과를 모아 반환합니다.
    ///
    /// 전체 수집에 30초 데드라인이 적용되며, 초과 시 그때까지 모은
    /// 결과를 반환합니다.
    pub async fn collect_batch(
        &self,
        messages: Vec<LogMessage>,
    ) -> Vec<ProcessResult<H::Output>> {
        let expected = messages.len();
        for msg in messages {
            if !self.submit_blocking(msg).await {
                break;
            }
        }

        let deadline = tokio::time::Instant::now() + BATCH_TIMEOUT;
        let mut results = Vec::with_capacity(expected);
        let mut rx = self.result_rx.lock().await;
        while results.len() < expected {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        collected = results.len(),
                        expected,
                        "batch collection timed out"
                    );
                    break;
                }
            }
        }
        results
    }

    /// 취소를 알리고 모든 워커가 진행 중인 작업을 마칠 때까지 기다립니다.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
        let metrics = self.metrics();
        tracing::info!(
            processed = metrics.processed,
            errors = metrics.errors,
            dropped = metrics.dropped,
            "worker pool stopped"
        );
    }

    /// 현재 메트릭 스냅샷을 반환합니다.
    pub fn metrics(&self) -> PoolMetrics {
        let processed = self.counters.processed.load(Ordering::Relaxed);
        let total_nanos = self.counters.total_nanos.load(Ordering::Relaxed);
        let avg_process_time = if processed > 0 {
            Duration::from_nanos(total_nanos / processed)
        } else {
            Duration::ZERO
        };
        PoolMetrics {
            processed,
            errors: self.counters.errors.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            avg_process_time,
        }
    }

    /// 큐에 대기 중인 메시지 수를 반환합니다.
    pub fn queue_size(&self) -> usize {
        self.settings.buffer_size - self.task_tx.capacity()
    }

    /// 풀 상태가 정상인지 확인합니다.
    ///
    /// 취소되었거나 큐 포화가 90%를 넘으면 `false`입니다.
    pub fn is_healthy(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        (self.queue_size() as f64) < self.settings.buffer_size as f64 * SATURATION_RATIO
    }

    /// 취소 여부를 반환합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 메시지 내용을 대문자로 바꾸는 테스트 핸들러
    struct UppercaseHandler;

    impl MessageHandler for UppercaseHandler {
        type Output = String;

        async fn handle(&self, msg: LogMessage) -> Result<String, LogloomError> {
            Ok(msg.content.to_uppercase())
        }
    }

    /// "boom"이 들어오면 실패하는 핸들러
    struct FailOnBoomHandler;

    impl MessageHandler for FailOnBoomHandler {
        type Output = String;

        async fn handle(&self, msg: LogMessage) -> Result<String, LogloomError> {
            if msg.content == "boom" {
                Err(logloom_core::error::ParseError::Internal("boom".to_owned()).into())
            } else {
                Ok(msg.content)
            }
        }
    }

    /// 게이트 퍼밋을 받을 때까지 블로킹하는 핸들러
    struct GatedHandler {
        gate: Arc<tokio::sync::Semaphore>,
    }

    impl MessageHandler for GatedHandler {
        type Output = ();

        async fn handle(&self, _msg: LogMessage) -> Result<(), LogloomError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| logloom_core::error::PipelineError::Cancelled)?;
            Ok(())
        }
    }

    fn small_pool_settings(workers: usize, buffer_size: usize) -> PoolSettings {
        PoolSettings {
            workers,
            buffer_size,
        }
    }

    #[tokio::test]
    async fn processes_submitted_messages() {
        let pool = WorkerPool::new(
            small_pool_settings(2, 16),
            UppercaseHandler,
            CancellationToken::new(),
        );
        pool.start().await;

        assert!(pool.submit(LogMessage::new("hello", "test")));
        let result = pool.next_result().await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap(), "HELLO");

        pool.stop().await;
        assert_eq!(pool.metrics().processed, 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_failed_result() {
        let pool = WorkerPool::new(
            small_pool_settings(1, 16),
            FailOnBoomHandler,
            CancellationToken::new(),
        );
        pool.start().await;

        assert!(pool.submit(LogMessage::new("boom", "test")));
        let result = pool.next_result().await.unwrap();
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("boom"));

        // 워커는 살아있고 다음 메시지를 계속 처리함
        assert!(pool.submit(LogMessage::new("ok", "test")));
        let result = pool.next_result().await.unwrap();
        assert!(result.success);

        pool.stop().await;
        let metrics = pool.metrics();
        assert_eq!(metrics.processed, 1);
        assert_eq!(metrics.errors, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_and_reports() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let pool = WorkerPool::new(
            small_pool_settings(1, 2),
            GatedHandler {
                gate: Arc::clone(&gate),
            },
            CancellationToken::new(),
        );
        // 워커 시작 전에 제출해 소비 경합을 제거
        let mut accepted = 0;
        for i in 0..5 {
            if pool.submit(LogMessage::new(format!("msg{i}"), "test")) {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 2);
        assert_eq!(pool.metrics().dropped, 3);
        assert_eq!(pool.queue_size(), 2);
        // 큐 포화 90% 초과
        assert!(!pool.is_healthy());

        pool.start().await;
        gate.add_permits(5);
        pool.stop().await;
    }

    #[tokio::test]
    async fn submit_returns_false_after_stop() {
        let pool = WorkerPool::new(
            small_pool_settings(1, 4),
            UppercaseHandler,
            CancellationToken::new(),
        );
        pool.start().await;
        pool.stop().await;

        assert!(!pool.submit(LogMessage::new("late", "test")));
        assert!(!pool.submit_blocking(LogMessage::new("late", "test")).await);
        assert!(!pool.is_healthy());
    }

    #[tokio::test]
    async fn accounting_is_conservative() {
        let pool = WorkerPool::new(
            small_pool_settings(4, 64),
            UppercaseHandler,
            CancellationToken::new(),
        );
        pool.start().await;

        let mut accepted = 0u64;
        for i in 0..50 {
            if pool.submit_blocking(LogMessage::new(format!("m{i}"), "test")).await {
                accepted += 1;
            }
        }

        // 결과를 모두 수신해 드레인 완료를 보장
        for _ in 0..accepted {
            assert!(pool.next_result().await.is_some());
        }
        pool.stop().await;

        let metrics = pool.metrics();
        assert!(metrics.processed + metrics.errors + metrics.dropped <= 50);
        assert_eq!(metrics.processed, accepted);
        assert!(metrics.avg_process_time >= Duration::ZERO);
    }

    #[tokio::test]
    async fn collect_batch_returns_all_results() {
        let pool = WorkerPool::new(
            small_pool_settings(4, 64),
            UppercaseHandler,
            CancellationToken::new(),
        );
        pool.start().await;

        let messages: Vec<_> = (0..10)
            .map(|i| LogMessage::new(format!("batch{i}"), "test"))
            .collect();
        let results = pool.collect_batch(messages).await;
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.success));

        pool.stop().await;
    }

    #[tokio::test]
    async fn drain_results_empties_buffer() {
        let pool = WorkerPool::new(
            small_pool_settings(1, 16),
            UppercaseHandler,
            CancellationToken::new(),
        );
        pool.start().await;

        for i in 0..3 {
            assert!(pool.submit_blocking(LogMessage::new(format!("d{i}"), "test")).await);
        }
        // 처리 완료를 기다림
        let mut collected = Vec::new();
        while collected.len() < 3 {
            collected.push(pool.next_result().await.unwrap());
        }
        assert!(pool.drain_results().await.is_empty());

        pool.stop().await;
    }

    #[tokio::test]
    async fn queue_size_tracks_backlog() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let pool = WorkerPool::new(
            small_pool_settings(1, 8),
            GatedHandler {
                gate: Arc::clone(&gate),
            },
            CancellationToken::new(),
        );
        assert_eq!(pool.queue_size(), 0);
        assert!(pool.is_healthy());

        pool.submit(LogMessage::new("a", "test"));
        pool.submit(LogMessage::new("b", "test"));
        assert_eq!(pool.queue_size(), 2);

        pool.start().await;
        gate.add_permits(8);
        pool.stop().await;
    }
}
