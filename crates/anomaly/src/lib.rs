#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`series`]: 베이스라인이 붙은 범용 키별 시계열 저장소
//! - [`detector`]: z-score 검사와 바운디드 알림 채널
//!
//! # 아키텍처
//!
//! ```text
//! record_error(template_id)  -+
//!                             +-> SeriesSet -> window aggregate vs baseline
//! record_volume(source)      -+                      |
//!                                         z > threshold -> mpsc -> Alert
//! ```

pub mod detector;
mod series;

// --- 주요 타입 re-export ---

pub use detector::AnomalyDetector;
