//! 템플릿 클러스터 -- 같은 템플릿을 공유하는 로그 그룹
//!
//! 클러스터의 토큰 길이는 생성 이후 불변입니다 (길이가 클러스터를
//! 분할함). 각 위치는 일관되게 관측된 리터럴이거나, 서로 다른 리터럴이
//! 관측된 순간부터 영구히 `<*>`입니다 (단조 일반화). ID는 생성 시점
//! 토큰의 해시에서 파생되며 일반화로 토큰이 바뀌어도 재계산되지
//! 않습니다.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::tokenize::WILDCARD;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64비트 해시
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// 생성 시점 토큰에서 템플릿 ID를 파생합니다.
pub(crate) fn template_id(tokens: &[String]) -> String {
    format!("tmpl_{:x}", fnv1a64(tokens.join(" ").as_bytes()))
}

/// 클러스터의 가변 상태
///
/// `LogCluster`의 mutex 아래에서만 변경됩니다. `size`, `last_seen`,
/// `tokens`는 하나의 그룹으로 원자적으로 갱신됩니다.
#[derive(Debug)]
struct ClusterState {
    tokens: Vec<String>,
    size: u64,
    last_seen: i64,
    sample_logs: VecDeque<String>,
}

/// 템플릿 클러스터
///
/// 트리가 소유하며, 보고를 위한 읽기는 [`LogCluster::snapshot`]으로
/// 공유됩니다.
#[derive(Debug)]
pub struct LogCluster {
    id: String,
    first_seen: i64,
    state: Mutex<ClusterState>,
}

/// 보고용 클러스터 스냅샷
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSnapshot {
    /// 템플릿 ID (불변)
    pub id: String,
    /// 현재 템플릿 토큰
    pub tokens: Vec<String>,
    /// 토큰을 공백으로 연결한 템플릿 문자열
    pub template: String,
    /// 흡수한 로그 수
    pub size: u64,
    /// 최초 관측 시각 (epoch 나노초)
    pub first_seen: i64,
    /// 마지막 관측 시각 (epoch 나노초)
    pub last_seen: i64,
    /// 원본 로그 샘플 링
    pub sample_logs: Vec<String>,
}

impl LogCluster {
    /// 전처리된 토큰으로 새 클러스터를 생성합니다.
    pub(crate) fn new(tokens: Vec<String>, timestamp: i64, raw: &str, max_samples: usize) -> Self {
        let id = template_id(&tokens);
        let mut sample_logs = VecDeque::with_capacity(max_samples.min(8));
        if max_samples > 0 {
            sample_logs.push_back(raw.to_owned());
        }
        Self {
            id,
            first_seen: timestamp,
            state: Mutex::new(ClusterState {
                tokens,
                size: 1,
                last_seen: timestamp,
                sample_logs,
            }),
        }
    }

    /// 템플릿 ID를 반환합니다.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        // poison은 내부 불변식이 깨진 경우가 아니므로 복구해서 진행
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 토큰 길이를 반환합니다 (클러스터 수명 동안 불변).
    pub fn token_len(&self) -> usize {
        self.state().tokens.len()
    }

    /// 후보 토큰과의 유사도를 계산합니다.
    ///
    /// 길이가 다르면 `None`, 같으면 와일드카드 또는 일치 위치의 비율을
    /// 반환합니다.
    pub(crate) fn similarity(&self, tokens: &[String]) -> Option<f64> {
        let state = self.state();
        if state.tokens.len() != tokens.len() || tokens.is_empty() {
            return None;
        }
        let matches = state
            .tokens
            .iter()
            .zip(tokens)
            .filter(|(own, other)| own == other || own.as_str() == WILDCARD)
            .count();
        Some(matches as f64 / tokens.len() as f64)
    }

    /// 새 로그를 흡수하고 템플릿을 일반화합니다.
    ///
    /// 위치별로 토큰이 다르면 `<*>`로 치환합니다. 한번 와일드카드가 된
    /// 위치는 되돌아가지 않습니다. 갱신된 템플릿 토큰을 반환합니다.
    pub(crate) fn absorb(
        &self,
        tokens: &[String],
        timestamp: i64,
        raw: &str,
        max_samples: usize,
    ) -> Vec<String> {
        let mut state = self.state();
        for (own, other) in state.tokens.iter_mut().zip(tokens) {
            if own != other {
                *own = WILDCARD.to_owned();
            }
        }
        state.size += 1;
        state.last_seen = timestamp;
        if max_samples > 0 {
            if state.sample_logs.len() >= max_samples {
                state.sample_logs.pop_front();
            }
            state.sample_logs.push_back(raw.to_owned());
        }
        state.tokens.clone()
    }

    /// 현재 템플릿 토큰의 복사본을 반환합니다.
    pub fn template_tokens(&self) -> Vec<String> {
        self.state().tokens.clone()
    }

    /// 흡수한 로그 수를 반환합니다.
    pub fn size(&self) -> u64 {
        self.state().size
    }

    /// 보고용 스냅샷을 만듭니다.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let state = self.state();
        ClusterSnapshot {
            id: self.id.clone(),
            tokens: state.tokens.clone(),
            template: state.tokens.join(" "),
            size: state.size,
            first_seen: self.first_seen,
            last_seen: state.last_seen,
            sample_logs: state.sample_logs.iter().cloned().collect(),
        }
    }
}
