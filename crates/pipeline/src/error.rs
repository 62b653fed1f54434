//! 인제스천 파이프라인 에러 타입
//!
//! [`IngestError`]는 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<IngestError> for LogloomError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use logloom_core::error::{LogloomError, ParseError, PipelineError};
use logloom_drain::DrainError;

/// 인제스천 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// PII 패턴 컴파일 실패 (시작 시점에 치명적)
    #[error("invalid pii pattern '{name}': {reason}")]
    Pattern { name: String, reason: String },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// Drain 엔진 에러
    #[error("drain error: {0}")]
    Drain(#[from] DrainError),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

impl From<IngestError> for LogloomError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Pattern { name, reason } => LogloomError::Parse(ParseError::Pattern {
                pattern: name,
                reason,
            }),
            IngestError::Drain(drain) => drain.into(),
            IngestError::Channel(reason) => {
                LogloomError::Pipeline(PipelineError::ChannelClosed(reason))
            }
            IngestError::AlreadyRunning => LogloomError::Pipeline(PipelineError::AlreadyRunning),
            IngestError::NotRunning => LogloomError::Pipeline(PipelineError::NotRunning),
            IngestError::Config { field, reason } => {
                LogloomError::Config(logloom_core::error::ConfigError::InvalidValue {
                    field,
                    reason,
                })
            }
        }
    }
}
