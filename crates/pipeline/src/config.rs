//! 인제스천 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogloomConfig`](logloom_core::config::LogloomConfig)에서
//! 파이프라인이 사용하는 섹션을 모아 확장 필드를 더한 것입니다.

use logloom_core::config::{DetectorSettings, DrainSettings, PoolSettings, RedactorSettings};

use crate::error::IngestError;

/// 에러 라인 판정에 사용하는 기본 마커
const DEFAULT_ERROR_MARKERS: [&str; 6] = ["error", "err", "fail", "fatal", "panic", "exception"];

/// 인제스천 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 워커 풀 설정
    pub pool: PoolSettings,
    /// Drain 트리 설정
    pub drain: DrainSettings,
    /// 이상 탐지기 설정
    pub detector: DetectorSettings,
    /// PII 마스킹 설정
    pub redactor: RedactorSettings,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 압축 레코드 출력 채널 용량
    pub record_capacity: usize,
    /// 에러 관측으로 기록할 토큰 마커 (소문자 비교)
    pub error_markers: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            drain: DrainSettings::default(),
            detector: DetectorSettings::default(),
            redactor: RedactorSettings::default(),
            record_capacity: 10_000,
            error_markers: DEFAULT_ERROR_MARKERS
                .iter()
                .map(|m| (*m).to_owned())
                .collect(),
        }
    }
}

impl PipelineConfig {
    /// core 통합 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// core에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &logloom_core::config::LogloomConfig) -> Self {
        Self {
            pool: core.pool.clone(),
            drain: core.drain.clone(),
            detector: core.detector.clone(),
            redactor: core.redactor.clone(),
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        fn invalid(field: &str, reason: impl Into<String>) -> IngestError {
            IngestError::Config {
                field: field.to_owned(),
                reason: reason.into(),
            }
        }

        if self.pool.workers == 0 {
            return Err(invalid("pool.workers", "must be greater than 0"));
        }
        if self.pool.buffer_size == 0 {
            return Err(invalid("pool.buffer_size", "must be greater than 0"));
        }
        if self.record_capacity == 0 {
            return Err(invalid("record_capacity", "must be greater than 0"));
        }
        if self.drain.max_depth < 2 {
            return Err(invalid("drain.max_depth", "must be at least 2"));
        }
        if !(self.drain.sim_threshold > 0.0 && self.drain.sim_threshold <= 1.0) {
            return Err(invalid("drain.sim_threshold", "must be in (0.0, 1.0]"));
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_sections() {
        let mut core = logloom_core::config::LogloomConfig::default();
        core.pool.workers = 7;
        core.drain.max_depth = 6;

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.pool.workers, 7);
        assert_eq!(config.drain.max_depth, 6);
        // 확장 필드는 기본값
        assert_eq!(config.record_capacity, 10_000);
        assert!(config.error_markers.contains(&"error".to_owned()));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = PipelineConfig {
            pool: PoolSettings {
                workers: 0,
                ..PoolSettings::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_record_capacity() {
        let config = PipelineConfig {
            record_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
