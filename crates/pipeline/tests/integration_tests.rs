//! 통합 테스트 -- 제출부터 압축 레코드/알림까지 전체 흐름 검증

use logloom_core::pipeline::Pipeline;
use logloom_core::types::{AlertKind, LogMessage, Severity, now_nanos};
use logloom_pipeline::{IngestPipelineBuilder, PipelineConfig};

const MINUTE: i64 = 60 * 1_000_000_000;

fn config_with(workers: usize, buffer_size: usize) -> PipelineConfig {
    PipelineConfig {
        pool: logloom_core::config::PoolSettings {
            workers,
            buffer_size,
        },
        ..PipelineConfig::default()
    }
}

/// 유사한 라인들이 하나의 템플릿으로 묶이는지 검증
#[tokio::test]
async fn grouping_similar_lines_share_template() {
    let (mut pipeline, mut record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(2, 64))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let lines = [
        "Connected to database at 192.168.1.1:5432",
        "Connected to database at 192.168.1.2:5432",
        "Connected to database at 10.0.0.1:5432",
    ];
    for line in lines {
        assert!(pipeline.submit_blocking(LogMessage::new(line, "db")).await);
    }

    let mut template_ids = Vec::new();
    for _ in 0..3 {
        let record = record_rx.recv().await.unwrap();
        template_ids.push(record.template_id.clone());
    }

    assert!(template_ids.iter().all(|id| id == &template_ids[0]));
    let snapshot = pipeline.cluster(&template_ids[0]).unwrap();
    assert_eq!(snapshot.size, 3);
    assert_eq!(pipeline.stats().total_clusters, 1);

    pipeline.stop().await.unwrap();
}

/// 반복 라인의 통계 집계 검증
#[tokio::test]
async fn stats_count_repeated_line() {
    let (mut pipeline, mut record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(2, 64))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    for _ in 0..10 {
        let msg = LogMessage::new("Request processed in 100ms", "api");
        assert!(pipeline.submit_blocking(msg).await);
    }
    for _ in 0..10 {
        record_rx.recv().await.unwrap();
    }

    let stats = pipeline.stats();
    assert_eq!(stats.total_clusters, 1);
    assert_eq!(stats.total_logs, 10);
    assert!((stats.average_size - 10.0).abs() < f64::EPSILON);

    pipeline.stop().await.unwrap();
}

/// 변수 추출과 PII 마스킹이 레코드에 함께 적용되는지 검증
#[tokio::test]
async fn records_carry_redacted_variables() {
    let (mut pipeline, mut record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(1, 64))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    // 첫 라인으로 템플릿 생성, 두 번째에서 변수 추출
    let first = LogMessage::new("login attempt by alice@example.com succeeded", "auth");
    let second = LogMessage::new("login attempt by bob@corp.example succeeded", "auth");
    assert!(pipeline.submit_blocking(first).await);
    assert!(pipeline.submit_blocking(second).await);

    let _ = record_rx.recv().await.unwrap();
    let record = record_rx.recv().await.unwrap();

    // 이메일 토큰은 마스킹되어 와일드카드 위치에 플레이스홀더가 들어감
    assert!(!record.variables.is_empty());
    assert!(
        record
            .variables
            .values()
            .any(|v| v == "[EMAIL_REDACTED]"),
        "expected redacted email variable, got {:?}",
        record.variables
    );
    // compressed_size 추정치 일관성
    let expected: usize = record.template_id.len()
        + record
            .variables
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>();
    assert_eq!(record.compressed_size, expected);

    pipeline.stop().await.unwrap();
}

/// 에러 스파이크가 알림 채널로 전달되는지 검증
#[tokio::test]
async fn error_burst_produces_alert() {
    // 순서 보존을 위해 워커 1개 사용
    let (mut pipeline, mut record_rx, mut alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(1, 256))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    // 1분 간격의 베이스라인 에러 10개
    for i in 0..10i64 {
        let msg = LogMessage::new("Error connecting upstream timeout", "gw")
            .with_timestamp(i * MINUTE);
        assert!(pipeline.submit_blocking(msg).await);
    }
    // 마지막 1분 내 50개 폭증
    for j in 0..50i64 {
        let msg = LogMessage::new("Error connecting upstream timeout", "gw")
            .with_timestamp(10 * MINUTE + j * (MINUTE / 60));
        assert!(pipeline.submit_blocking(msg).await);
    }

    for _ in 0..60 {
        record_rx.recv().await.unwrap();
    }
    pipeline.stop().await.unwrap();

    let mut spike = None;
    while let Ok(alert) = alert_rx.try_recv() {
        if alert.kind == AlertKind::ErrorSpike
            && matches!(alert.severity, Severity::High | Severity::Critical)
        {
            spike = Some(alert);
        }
    }
    let spike = spike.expect("expected a high-severity error spike alert");
    assert!(spike.template_id.is_some());
    assert!(spike.value >= 45.0);
}

/// 시작 전 큐 backpressure 검증: 2개 수용, 3개 드롭
#[tokio::test]
async fn backpressure_drops_when_queue_full() {
    let (pipeline, _record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(1, 2))
        .build()
        .unwrap();

    let mut accepted = 0;
    for i in 0..5 {
        if pipeline.submit(LogMessage::new(format!("overflow {i}"), "test")) {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 2);
    assert_eq!(pipeline.pool_metrics().dropped, 3);
    assert_eq!(pipeline.queue_size(), 2);
}

/// redact/detect 라이브러리 표면 검증
#[tokio::test]
async fn redactor_surface_available_on_pipeline() {
    let (pipeline, _record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(1, 16))
        .build()
        .unwrap();

    let redactor = pipeline.redactor();
    assert_eq!(
        redactor.redact("contact alice@example.com"),
        "contact [EMAIL_REDACTED]"
    );
    assert!(redactor.detect("contact alice@example.com").contains(&"email".to_owned()));
}

/// 정지 후 제출이 거부되고 집계가 보수적인지 검증
#[tokio::test]
async fn totals_are_conservative_after_stop() {
    let (mut pipeline, mut record_rx, _alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(2, 32))
        .build()
        .unwrap();
    pipeline.start().await.unwrap();

    let submitted = 20u64;
    for i in 0..submitted {
        assert!(
            pipeline
                .submit_blocking(LogMessage::new(format!("work unit {i}"), "test"))
                .await
        );
    }
    for _ in 0..submitted {
        record_rx.recv().await.unwrap();
    }

    pipeline.stop().await.unwrap();
    assert!(!pipeline.submit(LogMessage::new("late", "test")));

    let metrics = pipeline.pool_metrics();
    assert_eq!(metrics.processed, submitted);
    assert!(metrics.processed + metrics.errors + metrics.dropped <= submitted + 1);

    // Σ cluster.size == 성공 파싱 수
    assert_eq!(pipeline.stats().total_logs, submitted);
}

/// 볼륨 관측이 탐지기로 흘러가는지 검증 (수동 기록 경로 포함)
#[tokio::test]
async fn detector_handle_accepts_manual_records() {
    let (pipeline, _record_rx, mut alert_rx) = IngestPipelineBuilder::new()
        .config(config_with(1, 16))
        .build()
        .unwrap();

    let detector = pipeline.detector();
    let base = now_nanos();
    for i in 0..10i64 {
        detector.record_volume("edge", 10.0, base + i * MINUTE);
    }
    detector.record_volume("edge", 400.0, base + 10 * MINUTE);

    let alert = alert_rx.try_recv().expect("expected a volume alert");
    assert_eq!(alert.kind, AlertKind::VolumeSpike);
    assert_eq!(alert.source.as_deref(), Some("edge"));
}
