//! 에러 타입 — 도메인별 에러 정의

/// Logloom 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogloomError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 이상 탐지 에러
    #[error("detect error: {0}")]
    Detect(#[from] DetectError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 로그 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 빈 입력 (토큰 0개)
    #[error("empty log line")]
    EmptyInput,

    /// ID로 클러스터를 찾을 수 없음
    #[error("cluster not found: {id}")]
    ClusterNotFound { id: String },

    /// 마스킹 패턴 컴파일 실패 (시작 시점에 치명적)
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// 불변식 위반 — 도달하면 버그
    #[error("internal parser error: {0}")]
    Internal(String),
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 큐가 가득 참
    #[error("queue full: capacity {capacity}")]
    QueueFull { capacity: usize },

    /// 취소됨 — 새 작업을 받지 않음
    #[error("pipeline cancelled")]
    Cancelled,

    /// 배치 수집 데드라인 초과
    #[error("batch collection timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 채널이 닫힘
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 이상 탐지 에러
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// 유효하지 않은 임계값
    #[error("invalid threshold: {value}")]
    InvalidThreshold { value: f64 },
}
