//! 설정 관리 — logloom.toml 파싱 및 런타임 설정
//!
//! 모든 섹션과 필드는 생략 가능하며 생략 시 기본값이 적용됩니다.
//! 설정 값의 유효성은 [`LogloomConfig::validate`]에서 일괄 검증합니다.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Logloom 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogloomConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// Drain 트리 설정
    pub drain: DrainSettings,
    /// 워커 풀 설정
    pub pool: PoolSettings,
    /// 이상 탐지기 설정
    pub detector: DetectorSettings,
    /// PII 마스킹 설정
    pub redactor: RedactorSettings,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Drain 트리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainSettings {
    /// 파스 트리 최대 깊이
    pub max_depth: usize,
    /// 템플릿 매칭 유사도 임계값 (0.0 ~ 1.0)
    pub sim_threshold: f64,
    /// 노드당 최대 자식 수 (초과 시 와일드카드 경로로 우회)
    pub max_children: usize,
    /// 리프당 최대 클러스터 수
    pub max_clusters: usize,
    /// 템플릿당 보관할 샘플 로그 수
    pub max_sample_logs: usize,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            max_depth: 4,
            sim_threshold: 0.5,
            max_children: 100,
            max_clusters: 20,
            max_sample_logs: 5,
        }
    }
}

/// 워커 풀 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// 병렬 워커 수
    pub workers: usize,
    /// 입력 큐 용량
    pub buffer_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 100,
            buffer_size: 10_000,
        }
    }
}

/// 이상 탐지기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// 집계 윈도우 (초)
    pub window_secs: u64,
    /// 에러 스파이크 z-score 임계값
    pub error_threshold: f64,
    /// 볼륨 이상 z-score 임계값
    pub volume_threshold: f64,
    /// 검사에 필요한 최소 관측값 수
    pub min_points: usize,
    /// 알림 채널 용량 (초과분은 드롭)
    pub alert_capacity: usize,
    /// 소스별 볼륨 집계 플러시 간격 (초)
    pub volume_flush_secs: u64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            window_secs: 300,
            error_threshold: 3.0,
            volume_threshold: 3.0,
            min_points: 10,
            alert_capacity: 100,
            volume_flush_secs: 10,
        }
    }
}

/// PII 마스킹 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactorSettings {
    /// 이메일 주소 마스킹
    pub redact_emails: bool,
    /// 전화번호 마스킹
    pub redact_phones: bool,
    /// 주민번호(SSN) 마스킹
    pub redact_ssn: bool,
    /// 신용카드 번호 마스킹
    pub redact_credit_cards: bool,
    /// IPv4 주소 마스킹 (디버깅에 필요하므로 기본 비활성)
    pub redact_ipv4: bool,
    /// IPv6 주소 마스킹
    pub redact_ipv6: bool,
    /// 사용자 정의 패턴: 이름 -> 정규식
    pub custom_patterns: HashMap<String, String>,
}

impl Default for RedactorSettings {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_ssn: true,
            redact_credit_cards: true,
            redact_ipv4: false,
            redact_ipv6: false,
            custom_patterns: HashMap::new(),
        }
    }
}

impl LogloomConfig {
    /// TOML 파일에서 설정을 읽습니다.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 파일이 존재하면 읽고, 없으면 기본 설정을 반환합니다.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_WORKERS: usize = 10_000;
        const MAX_BUFFER_SIZE: usize = 10_000_000;

        fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_owned(),
                reason: reason.into(),
            }
        }

        if self.drain.max_depth < 2 {
            return Err(invalid("drain.max_depth", "must be at least 2"));
        }
        if !(self.drain.sim_threshold > 0.0 && self.drain.sim_threshold <= 1.0) {
            return Err(invalid("drain.sim_threshold", "must be in (0.0, 1.0]"));
        }
        if self.drain.max_children == 0 {
            return Err(invalid("drain.max_children", "must be greater than 0"));
        }
        if self.drain.max_clusters == 0 {
            return Err(invalid("drain.max_clusters", "must be greater than 0"));
        }

        if self.pool.workers == 0 || self.pool.workers > MAX_WORKERS {
            return Err(invalid("pool.workers", format!("must be 1-{MAX_WORKERS}")));
        }
        if self.pool.buffer_size == 0 || self.pool.buffer_size > MAX_BUFFER_SIZE {
            return Err(invalid(
                "pool.buffer_size",
                format!("must be 1-{MAX_BUFFER_SIZE}"),
            ));
        }

        if self.detector.window_secs == 0 {
            return Err(invalid("detector.window_secs", "must be greater than 0"));
        }
        if self.detector.error_threshold <= 0.0 {
            return Err(invalid("detector.error_threshold", "must be positive"));
        }
        if self.detector.volume_threshold <= 0.0 {
            return Err(invalid("detector.volume_threshold", "must be positive"));
        }
        if self.detector.min_points == 0 {
            return Err(invalid("detector.min_points", "must be greater than 0"));
        }
        if self.detector.alert_capacity == 0 {
            return Err(invalid("detector.alert_capacity", "must be greater than 0"));
        }
        if self.detector.volume_flush_secs == 0 {
            return Err(invalid(
                "detector.volume_flush_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}
