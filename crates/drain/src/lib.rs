#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tokenize`]: 공백 분리 토크나이저와 변수 마스킹 전처리기
//! - [`cluster`]: 템플릿 클러스터와 단조 일반화
//! - [`tree`]: prefix 트리 라우팅과 유사도 매칭
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! raw line -> tokenize -> mask -> treeSearch -+-> hit  -> absorb(generalize)
//!                                             |
//!                                             +-> miss -> create + attach
//!                                                    |
//!                                  extractVariables <+-> ParseResult
//! ```

pub mod cluster;
pub mod error;
pub mod tokenize;
pub mod tree;

// --- 주요 타입 re-export ---

// 트리
pub use tree::{DrainStats, DrainTree};

// 클러스터
pub use cluster::{ClusterSnapshot, LogCluster};

// 토크나이저
pub use tokenize::{TokenMasker, WILDCARD, tokenize};

// 에러
pub use error::DrainError;
