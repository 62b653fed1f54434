//! 파이프라인 오케스트레이션 -- 파싱/마스킹/압축/탐지의 전체 흐름을 관리합니다.
//!
//! [`IngestPipeline`]은 core의 [`Pipeline`] trait을 구현하여 다른 모듈과
//! 동일한 생명주기(start/stop/health_check)로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! submit -> bounded queue -> WorkerPool -+-> DrainTree (parse)
//!                                        +-> Redactor (variables)
//!                                        +-> AnomalyDetector (errors/volume)
//!                                        +-> CompressedRecord -> mpsc -> downstream
//! ```
//!
//! 워커 핸들러는 메시지마다 Drain 파싱, 에러 관측 기록, 소스별 볼륨
//! 카운트 증가, 변수 마스킹, 레코드 생성을 수행합니다. 별도의 interval
//! 태스크가 볼륨 카운트를 주기적으로 탐지기에 플러시합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use logloom_anomaly::AnomalyDetector;
use logloom_core::error::{LogloomError, PipelineError};
use logloom_core::metrics::{
    DRAIN_CLUSTERS, DRAIN_TEMPLATES_CREATED_TOTAL, PIPELINE_LOGS_PROCESSED_TOTAL,
    PIPELINE_PARSE_ERRORS_TOTAL, PIPELINE_RECORDS_DROPPED_TOTAL, PIPELINE_RECORDS_EMITTED_TOTAL,
};
use logloom_core::pipeline::{HealthStatus, Pipeline};
use logloom_core::types::{Alert, CompressedRecord, LogMessage, ParseResult, now_nanos};
use logloom_drain::{ClusterSnapshot, DrainStats, DrainTree};

use crate::compress::build_record;
use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::pool::{MessageHandler, PoolMetrics, WorkerPool};
use crate::redact::Redactor;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (재시작 불가)
    Stopped,
}

/// 소스별 볼륨 카운터
type VolumeCounters = Arc<StdMutex<HashMap<String, u64>>>;

/// 라인이 에러 관측 대상인지 판정합니다.
fn is_error_line(content: &str, markers: &[String]) -> bool {
    let lower = content.to_lowercase();
    markers.iter().any(|marker| lower.contains(marker.as_str()))
}

/// 워커 핸들러 -- 메시지 하나를 압축 레코드로 변환합니다.
struct CompressHandler {
    tree: Arc<DrainTree>,
    redactor: Arc<Redactor>,
    detector: Arc<AnomalyDetector>,
    volume: VolumeCounters,
    error_markers: Arc<Vec<String>>,
}

impl MessageHandler for CompressHandler {
    type Output = CompressedRecord;

    async fn handle(&self, msg: LogMessage) -> Result<CompressedRecord, LogloomError> {
        let parsed = match self.tree.parse(&msg.content, msg.timestamp) {
            Ok(parsed) => parsed,
            Err(e) => {
                metrics::counter!(PIPELINE_PARSE_ERRORS_TOTAL).increment(1);
                return Err(e.into());
            }
        };
        metrics::counter!(PIPELINE_LOGS_PROCESSED_TOTAL).increment(1);
        if parsed.is_new {
            metrics::counter!(DRAIN_TEMPLATES_CREATED_TOTAL).increment(1);
            metrics::gauge!(DRAIN_CLUSTERS).set(self.tree.cluster_count() as f64);
        }

        if is_error_line(&msg.content, &self.error_markers) {
            self.detector.record_error(&parsed.template_id, msg.timestamp);
        }

        {
            let mut volume = self.volume.lock().unwrap_or_else(|e| e.into_inner());
            *volume.entry(msg.source.clone()).or_insert(0) += 1;
        }

        let variables = self.redactor.redact_map(&parsed.variables);
        Ok(build_record(&msg, &parsed, variables))
    }
}

/// 로그 인제스천 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logloom_core::pipeline::Pipeline;
/// use logloom_pipeline::{IngestPipelineBuilder, PipelineConfig};
///
/// let (mut pipeline, mut record_rx, mut alert_rx) = IngestPipelineBuilder::new()
///     .config(PipelineConfig::default())
///     .build()?;
///
/// pipeline.start().await?;
/// pipeline.submit_blocking(msg).await;
/// let record = record_rx.recv().await;
/// pipeline.stop().await?;
/// ```
pub struct IngestPipeline {
    config: PipelineConfig,
    state: PipelineState,
    tree: Arc<DrainTree>,
    redactor: Arc<Redactor>,
    detector: Arc<AnomalyDetector>,
    pool: Arc<WorkerPool<CompressHandler>>,
    record_tx: mpsc::Sender<CompressedRecord>,
    volume: VolumeCounters,
    /// 풀과 백그라운드 태스크가 공유하는 단일 취소 토큰
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl IngestPipeline {
    /// 현재 상태 이름을 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 풀을 거치지 않고 라인 하나를 직접 파싱합니다.
    pub fn parse(&self, line: &str, timestamp: i64) -> Result<ParseResult, LogloomError> {
        self.tree.parse(line, timestamp).map_err(LogloomError::from)
    }

    /// 메시지를 논블로킹으로 제출합니다. 큐가 가득 차면 `false`.
    pub fn submit(&self, msg: LogMessage) -> bool {
        self.pool.submit(msg)
    }

    /// 큐에 자리가 날 때까지 기다리며 제출합니다. 취소 시 `false`.
    pub async fn submit_blocking(&self, msg: LogMessage) -> bool {
        self.pool.submit_blocking(msg).await
    }

    /// Drain 트리 통계를 반환합니다.
    pub fn stats(&self) -> DrainStats {
        self.tree.stats()
    }

    /// ID로 클러스터 스냅샷을 조회합니다.
    pub fn cluster(&self, id: &str) -> Option<ClusterSnapshot> {
        self.tree.cluster(id)
    }

    /// 모든 클러스터의 스냅샷을 반환합니다.
    pub fn clusters(&self) -> Vec<ClusterSnapshot> {
        self.tree.clusters()
    }

    /// 워커 풀 메트릭 스냅샷을 반환합니다.
    pub fn pool_metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }

    /// 입력 큐에 대기 중인 메시지 수를 반환합니다.
    pub fn queue_size(&self) -> usize {
        self.pool.queue_size()
    }

    /// 이상 탐지기 핸들을 반환합니다.
    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// PII 마스킹기 핸들을 반환합니다.
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// 소스별 볼륨 카운트를 비우고 탐지기에 기록합니다.
    fn flush_volume(volume: &VolumeCounters, detector: &AnomalyDetector) {
        let counts: Vec<(String, u64)> = {
            let mut volume = volume.lock().unwrap_or_else(|e| e.into_inner());
            volume.drain().collect()
        };
        if counts.is_empty() {
            return;
        }
        let now = now_nanos();
        for (source, count) in counts {
            detector.record_volume(&source, count as f64, now);
        }
    }
}

impl Pipeline for IngestPipeline {
    async fn start(&mut self) -> Result<(), LogloomError> {
        match self.state {
            PipelineState::Running => {
                return Err(PipelineError::AlreadyRunning.into());
            }
            PipelineState::Stopped => {
                // 정지된 파이프라인의 토큰은 이미 취소됨
                return Err(PipelineError::Cancelled.into());
            }
            PipelineState::Initialized => {}
        }

        tracing::info!(
            workers = self.config.pool.workers,
            buffer = self.config.pool.buffer_size,
            "starting ingest pipeline"
        );

        // 1. 워커 스폰
        self.pool.start().await;

        // 2. 결과 -> 레코드 채널 포워더
        let pool = Arc::clone(&self.pool);
        let record_tx = self.record_tx.clone();
        let cancel = self.cancel.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = pool.next_result() => result,
                };
                let Some(result) = result else { break };
                let Some(record) = result.data else { continue };

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = record_tx.send(record) => {
                        if sent.is_err() {
                            tracing::debug!("record receiver dropped, stopping forwarder");
                            break;
                        }
                        metrics::counter!(PIPELINE_RECORDS_EMITTED_TOTAL).increment(1);
                    }
                }
            }
        });
        self.tasks.push(forwarder);

        // 3. 소스별 볼륨 플러시 태스크
        let volume = Arc::clone(&self.volume);
        let detector = Arc::clone(&self.detector);
        let cancel = self.cancel.clone();
        let flush_secs = self.config.detector.volume_flush_secs;
        let volume_task = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(flush_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        IngestPipeline::flush_volume(&volume, &detector);
                    }
                }
            }
        });
        self.tasks.push(volume_task);

        self.state = PipelineState::Running;
        tracing::info!("ingest pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogloomError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping ingest pipeline");

        // 1. 풀 정지: 공유 토큰 취소 후 진행 중인 작업 드레인을 대기
        self.pool.stop().await;

        // 2. 포워더/플러시 태스크는 취소된 토큰을 보고 종료
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        // 3. 남은 결과를 레코드 채널로 넘김 (가득 차면 드롭)
        for result in self.pool.drain_results().await {
            let Some(record) = result.data else { continue };
            if self.record_tx.try_send(record).is_ok() {
                metrics::counter!(PIPELINE_RECORDS_EMITTED_TOTAL).increment(1);
            } else {
                metrics::counter!(PIPELINE_RECORDS_DROPPED_TOTAL).increment(1);
            }
        }

        // 4. 마지막 볼륨 플러시
        Self::flush_volume(&self.volume, &self.detector);

        self.state = PipelineState::Stopped;
        tracing::info!("ingest pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let utilization =
                    self.pool.queue_size() as f64 / self.config.pool.buffer_size as f64;
                if utilization >= 0.9 {
                    HealthStatus::Degraded(format!(
                        "queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 인제스천 파이프라인 빌더
///
/// 파이프라인을 구성하고 레코드/알림 채널을 생성합니다.
pub struct IngestPipelineBuilder {
    config: PipelineConfig,
}

impl IngestPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `IngestPipeline`: 파이프라인 인스턴스
    /// - `mpsc::Receiver<CompressedRecord>`: 압축 레코드 수신 채널
    /// - `mpsc::Receiver<Alert>`: 이상 알림 수신 채널
    pub fn build(
        self,
    ) -> Result<
        (
            IngestPipeline,
            mpsc::Receiver<CompressedRecord>,
            mpsc::Receiver<Alert>,
        ),
        IngestError,
    > {
        self.config.validate()?;

        let tree = Arc::new(DrainTree::new(self.config.drain.clone())?);
        let redactor = Arc::new(Redactor::new(&self.config.redactor)?);
        let (detector, alert_rx) = AnomalyDetector::new(self.config.detector.clone());
        let detector = Arc::new(detector);
        let (record_tx, record_rx) = mpsc::channel(self.config.record_capacity);
        let volume: VolumeCounters = Arc::new(StdMutex::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let handler = CompressHandler {
            tree: Arc::clone(&tree),
            redactor: Arc::clone(&redactor),
            detector: Arc::clone(&detector),
            volume: Arc::clone(&volume),
            error_markers: Arc::new(self.config.error_markers.clone()),
        };
        let pool = Arc::new(WorkerPool::new(
            self.config.pool.clone(),
            handler,
            cancel.clone(),
        ));

        let pipeline = IngestPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            tree,
            redactor,
            detector,
            pool,
            record_tx,
            volume,
            cancel,
            tasks: Vec::new(),
        };

        Ok((pipeline, record_rx, alert_rx))
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
