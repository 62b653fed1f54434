//! 이상 탐지기 -- 베이스라인 대비 z-score 검사와 알림 발행
//!
//! [`AnomalyDetector`]는 템플릿별 에러 시계열과 소스별 볼륨 시계열을
//! 유지합니다. 관측값이 추가될 때마다 최근 윈도우 집계를 고정
//! 베이스라인과 비교하여, z-score가 임계값을 넘으면 바운디드 채널로
//! 알림을 내보냅니다.
//!
//! 윈도우의 기준 시각은 벽시계가 아니라 현재 기록 중인 관측값의
//! 타임스탬프입니다. 과거 로그를 재생해도 동일한 결과가 나옵니다.
//!
//! record 경로는 에러를 반환하지 않습니다. 알림 채널이 가득 차면
//! 초과분은 카운터만 남기고 드롭됩니다.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use logloom_core::config::DetectorSettings;
use logloom_core::metrics::{
    ANOMALY_ALERTS_DROPPED_TOTAL, ANOMALY_ALERTS_TOTAL, LABEL_KIND, LABEL_SEVERITY,
};
use logloom_core::types::{Alert, AlertKind, Baseline, Severity, TimePoint};

use crate::series::{SeriesSet, WindowAggregate};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// 시계열 저장소 -- 하나의 read-write lock 아래에서 관리됩니다.
#[derive(Debug, Default)]
struct MetricsStore {
    errors: SeriesSet,
    volumes: SeriesSet,
}

/// 온라인 이상 탐지기
///
/// # 사용 예시
/// ```
/// use logloom_anomaly::AnomalyDetector;
/// use logloom_core::config::DetectorSettings;
///
/// let (detector, mut alert_rx) = AnomalyDetector::new(DetectorSettings::default());
/// detector.record_error("tmpl_ab12", 0);
/// assert!(alert_rx.try_recv().is_err()); // 관측값이 부족하면 알림 없음
/// ```
pub struct AnomalyDetector {
    settings: DetectorSettings,
    store: RwLock<MetricsStore>,
    alert_tx: mpsc::Sender<Alert>,
    alerts_dropped: AtomicU64,
}

impl AnomalyDetector {
    /// 새 탐지기를 생성하고 알림 수신 채널을 함께 반환합니다.
    pub fn new(settings: DetectorSettings) -> (Self, mpsc::Receiver<Alert>) {
        let (alert_tx, alert_rx) = mpsc::channel(settings.alert_capacity);
        (
            Self {
                settings,
                store: RwLock::new(MetricsStore::default()),
                alert_tx,
                alerts_dropped: AtomicU64::new(0),
            },
            alert_rx,
        )
    }

    fn window_nanos(&self) -> i64 {
        i64::try_from(self.settings.window_secs)
            .unwrap_or(i64::MAX / NANOS_PER_SEC)
            .saturating_mul(NANOS_PER_SEC)
    }

    /// 에러 발생을 기록하고 스파이크 여부를 검사합니다.
    pub fn record_error(&self, template_id: &str, timestamp: i64) {
        let alert = {
            let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
            let count = store.errors.append(
                template_id,
                TimePoint {
                    timestamp,
                    value: 1.0,
                },
            );
            if count < self.settings.min_points {
                None
            } else {
                let cutoff = timestamp.saturating_sub(self.window_nanos());
                let aggregate =
                    store
                        .errors
                        .window_aggregate(template_id, cutoff, WindowAggregate::Sum);
                let baseline = store.errors.baseline(template_id);

                let z = (aggregate - baseline.mean) / baseline.std_dev;
                (z > self.settings.error_threshold).then(|| Alert {
                    id: uuid::Uuid::new_v4().to_string(),
                    kind: AlertKind::ErrorSpike,
                    severity: severity_for(z),
                    title: "Error rate spike detected".to_owned(),
                    description: "Error rate for template significantly above baseline".to_owned(),
                    template_id: Some(template_id.to_owned()),
                    source: None,
                    value: aggregate,
                    threshold: baseline.mean
                        + baseline.std_dev * self.settings.error_threshold,
                    detected_at: timestamp,
                })
            }
        };

        if let Some(alert) = alert {
            tracing::warn!(
                template_id = %template_id,
                value = alert.value,
                severity = %alert.severity,
                "error anomaly detected"
            );
            self.push_alert(alert);
        }
    }

    /// 보고 윈도우의 로그 볼륨을 기록하고 이상 여부를 검사합니다.
    pub fn record_volume(&self, source: &str, count: f64, timestamp: i64) {
        let alert = {
            let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
            let points = store.volumes.append(
                source,
                TimePoint {
                    timestamp,
                    value: count,
                },
            );
            if points < self.settings.min_points {
                None
            } else {
                let cutoff = timestamp.saturating_sub(self.window_nanos());
                let aggregate =
                    store
                        .volumes
                        .window_aggregate(source, cutoff, WindowAggregate::Mean);
                let baseline = store.volumes.baseline(source);

                // 볼륨은 양방향 이상 (급증/급감 모두)
                let z = ((aggregate - baseline.mean) / baseline.std_dev).abs();
                (z > self.settings.volume_threshold).then(|| {
                    let kind = if aggregate >= baseline.mean {
                        AlertKind::VolumeSpike
                    } else {
                        AlertKind::VolumeDrop
                    };
                    Alert {
                        id: uuid::Uuid::new_v4().to_string(),
                        kind,
                        severity: severity_for(z),
                        title: "Log volume anomaly detected".to_owned(),
                        description: "Log volume significantly different from baseline".to_owned(),
                        template_id: None,
                        source: Some(source.to_owned()),
                        value: aggregate,
                        threshold: baseline.mean,
                        detected_at: timestamp,
                    }
                })
            }
        };

        if let Some(alert) = alert {
            tracing::warn!(
                source = %source,
                kind = %alert.kind,
                value = alert.value,
                "volume anomaly detected"
            );
            self.push_alert(alert);
        }
    }

    /// 알림을 채널로 내보냅니다. 채널이 가득 차면 드롭합니다.
    fn push_alert(&self, alert: Alert) {
        let kind = alert.kind.to_string();
        let severity = alert.severity.to_string();
        match self.alert_tx.try_send(alert) {
            Ok(()) => {
                metrics::counter!(
                    ANOMALY_ALERTS_TOTAL,
                    LABEL_KIND => kind,
                    LABEL_SEVERITY => severity
                )
                .increment(1);
            }
            Err(TrySendError::Full(_)) => {
                self.alerts_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(ANOMALY_ALERTS_DROPPED_TOTAL).increment(1);
                tracing::debug!("alert channel full, dropping alert");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("alert channel closed, dropping alert");
            }
        }
    }

    /// 에러 시계열의 캐싱된 베이스라인을 조회합니다.
    pub fn error_baseline(&self, template_id: &str) -> Option<Baseline> {
        self.store
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .errors
            .cached_baseline(template_id)
    }

    /// 볼륨 시계열의 캐싱된 베이스라인을 조회합니다.
    pub fn volume_baseline(&self, source: &str) -> Option<Baseline> {
        self.store
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .volumes
            .cached_baseline(source)
    }

    /// 추적 중인 (에러 키, 볼륨 키) 수를 반환합니다.
    pub fn key_counts(&self) -> (usize, usize) {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        (store.errors.key_count(), store.volumes.key_count())
    }

    /// 채널 포화로 드롭된 알림 수를 반환합니다.
    pub fn alerts_dropped(&self) -> u64 {
        self.alerts_dropped.load(Ordering::Relaxed)
    }
}

/// z-score를 심각도로 변환합니다.
fn severity_for(z: f64) -> Severity {
    if z > 5.0 {
        Severity::Critical
    } else if z > 4.0 {
        Severity::High
    } else if z > 3.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
