//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 모든 크레이트가 공유하는 데이터 구조를 정의합니다.
//! 와이어 타입은 snake_case 키로 직렬화되며, 모든 타임스탬프는
//! Unix epoch 기준 나노초(`i64`)입니다.

use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// 현재 시각을 epoch 나노초로 반환합니다.
pub fn now_nanos() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

/// 템플릿 ID 형식(`tmpl_` + 1~16자리 소문자 16진수)인지 확인합니다.
pub fn is_valid_template_id(id: &str) -> bool {
    let Some(hex) = id.strip_prefix("tmpl_") else {
        return false;
    };
    !hex.is_empty()
        && hex.len() <= 16
        && hex
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// 심각도 레벨
///
/// 알림의 심각도를 나타냅니다. `Ord` 구현으로 심각도 비교가 가능합니다
/// (`Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 낮은 심각도
    #[default]
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// 이상 징후 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// 에러 발생률이 베이스라인을 초과
    ErrorSpike,
    /// 로그 볼륨이 베이스라인을 크게 상회
    VolumeSpike,
    /// 로그 볼륨이 베이스라인을 크게 하회
    VolumeDrop,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorSpike => write!(f, "error_spike"),
            Self::VolumeSpike => write!(f, "volume_spike"),
            Self::VolumeDrop => write!(f, "volume_drop"),
        }
    }
}

/// 한 줄의 로그 파싱 결과
///
/// Drain 트리가 로그 한 줄을 흡수한 뒤 반환하는 템플릿 매칭 결과입니다.
/// `variables`의 키는 템플릿 내 와일드카드 위치 순서대로
/// `var_0`, `var_1`, … 형식입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    /// 매칭된 템플릿 ID (`tmpl_` + fnv1a64 hex)
    pub template_id: String,
    /// 현재 템플릿 문자열 (와일드카드는 `<*>`)
    pub template: String,
    /// 와일드카드 위치에서 추출한 변수 값
    pub variables: HashMap<String, String>,
    /// 이 줄이 새 템플릿을 생성했는지 여부
    pub is_new: bool,
}

/// 압축된 로그 레코드
///
/// 파이프라인의 최종 출력 단위입니다. `compressed_size`는
/// `|template_id| + Σ(|key| + |value|)`로 계산되는 추정치입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedRecord {
    /// 레코드 고유 ID (UUID v4)
    pub log_id: String,
    /// 템플릿 ID
    pub template_id: String,
    /// 템플릿 문자열
    pub template: String,
    /// PII 마스킹이 적용된 변수 맵
    pub variables: HashMap<String, String>,
    /// 로그 소스 식별자
    pub source: String,
    /// 원본 로그의 타임스탬프 (epoch 나노초)
    pub timestamp: i64,
    /// 원본 로그 길이 (바이트)
    pub original_size: usize,
    /// 압축 후 추정 크기 (바이트)
    pub compressed_size: usize,
}

impl fmt::Display for CompressedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompressedRecord[{}] template={} source={} {}B -> {}B",
            &self.log_id[..8.min(self.log_id.len())],
            self.template_id,
            self.source,
            self.original_size,
            self.compressed_size,
        )
    }
}

/// 키별 시계열의 단일 관측값
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    /// 관측 시각 (epoch 나노초)
    pub timestamp: i64,
    /// 관측값
    pub value: f64,
}

/// 키별 시계열의 고정 베이스라인
///
/// 최초 검사 시점에 존재하던 모든 관측값으로 한 번 계산되어 캐싱됩니다.
/// 장기 실행 프로세스에서는 베이스라인 드리프트가 발생할 수 있습니다.
/// `std_dev`는 0으로 나누기를 피하기 위해 최소 1.0으로 클램핑됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// 평균
    pub mean: f64,
    /// 표준편차 (>= 1.0)
    pub std_dev: f64,
    /// 계산에 사용된 관측값 수
    pub count: u64,
}

/// 탐지된 이상 징후 알림
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 알림 고유 ID (UUID v4)
    pub id: String,
    /// 알림 종류
    pub kind: AlertKind,
    /// 심각도 (z-score에서 파생)
    pub severity: Severity,
    /// 알림 제목
    pub title: String,
    /// 상세 설명
    pub description: String,
    /// 관련 템플릿 ID (에러 스파이크의 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// 관련 소스 (볼륨 이상의 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 윈도우 집계값
    pub value: f64,
    /// 알림 발생 임계값
    pub threshold: f64,
    /// 탐지 시각 (epoch 나노초)
    pub detected_at: i64,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Alert[{}] kind={} severity={} value={:.1} threshold={:.1}",
            &self.id[..8.min(self.id.len())],
            self.kind,
            self.severity,
            self.value,
            self.threshold,
        )
    }
}

/// 파이프라인에 투입되는 원시 로그 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    /// 메시지 고유 ID (UUID v4)
    pub id: String,
    /// 원시 로그 한 줄
    pub content: String,
    /// 소스 식별자 (예: "stdin", "file:/var/log/app.log")
    pub source: String,
    /// 수신 시각 (epoch 나노초)
    pub timestamp: i64,
}

impl LogMessage {
    /// 현재 시각으로 새 메시지를 생성합니다.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            source: source.into(),
            timestamp: now_nanos(),
        }
    }

    /// 타임스탬프를 지정합니다.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LogMessage[{}] source={} len={}",
            &self.id[..8.min(self.id.len())],
            self.source,
            self.content.len(),
        )
    }
}
