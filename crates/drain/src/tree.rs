//! Drain 트리 -- prefix 라우팅과 유사도 기반 클러스터 매칭
//!
//! 루트에서 리프까지의 경로는 `(길이, tokens[0], tokens[1], …)`을
//! `max_depth`까지 인코딩합니다. depth 1은 토큰 길이로 라우팅하고
//! (길이가 가장 저렴한 판별자), 이후 깊이는 토큰 값으로 라우팅하되
//! 정확한 키가 없으면 `<*>` 간선을 따릅니다. 단말 노드에서는 유사도
//! 기반 최적 매칭을 수행합니다.
//!
//! # 동시성
//!
//! 트리 구조(노드/클러스터 생성)는 하나의 write lock으로 직렬화되어
//! 경합하는 두 미스가 같은 클러스터를 중복 생성하지 못합니다. 조회는
//! shared lock으로 진행하며, 개별 클러스터의 갱신은 클러스터 자체
//! mutex로 보호됩니다.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use logloom_core::config::DrainSettings;
use logloom_core::types::ParseResult;

use crate::cluster::{ClusterSnapshot, LogCluster};
use crate::error::DrainError;
use crate::tokenize::{TokenMasker, WILDCARD, tokenize};

/// 트리 내부 노드
#[derive(Debug)]
struct ClusterNode {
    /// 루트가 0, 리프는 `max_depth` 이하
    depth: usize,
    /// 라우팅 키 -> 자식 노드
    children: HashMap<String, ClusterNode>,
    /// 이 노드에 부착된 클러스터 (단말 노드에서만 비어있지 않음)
    clusters: Vec<Arc<LogCluster>>,
}

impl ClusterNode {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            children: HashMap::new(),
            clusters: Vec::new(),
        }
    }
}

/// 트리 구조 인덱스 -- 하나의 read-write lock 아래에서 관리됩니다.
#[derive(Debug)]
struct TreeIndex {
    root: ClusterNode,
    clusters: HashMap<String, Arc<LogCluster>>,
}

/// Drain 트리 통계
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrainStats {
    /// 전체 클러스터 수
    pub total_clusters: usize,
    /// 전체 흡수 로그 수
    pub total_logs: u64,
    /// 클러스터당 평균 로그 수
    pub average_size: f64,
}

/// 온라인 로그 템플릿 추출 트리
///
/// # 사용 예시
/// ```
/// use logloom_core::config::DrainSettings;
/// use logloom_drain::DrainTree;
///
/// let tree = DrainTree::new(DrainSettings::default()).unwrap();
/// let result = tree.parse("Error connecting to 192.168.1.1:5432", 0).unwrap();
/// assert!(result.is_new);
/// ```
pub struct DrainTree {
    settings: DrainSettings,
    masker: TokenMasker,
    index: RwLock<TreeIndex>,
}

impl DrainTree {
    /// 새 Drain 트리를 생성합니다.
    ///
    /// 마스킹 패턴 컴파일에 실패하면 에러를 반환합니다 (시작 시점 치명적).
    pub fn new(settings: DrainSettings) -> Result<Self, DrainError> {
        Ok(Self {
            settings,
            masker: TokenMasker::new()?,
            index: RwLock::new(TreeIndex {
                root: ClusterNode::new(0),
                clusters: HashMap::new(),
            }),
        })
    }

    fn read_index(&self) -> RwLockReadGuard<'_, TreeIndex> {
        self.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, TreeIndex> {
        self.index.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 로그 한 줄을 파싱하여 템플릿에 흡수합니다.
    ///
    /// 토큰이 0개인 입력은 `DrainError::EmptyInput`으로 실패합니다.
    /// 트리가 생성된 이후 정상 입력의 파싱은 실패하지 않습니다.
    pub fn parse(&self, line: &str, timestamp: i64) -> Result<ParseResult, DrainError> {
        let raw_tokens = tokenize(line);
        if raw_tokens.is_empty() {
            return Err(DrainError::EmptyInput);
        }
        let masked = self.masker.mask(&raw_tokens);

        let existing = {
            let index = self.read_index();
            Self::tree_search(
                &index.root,
                &masked,
                self.settings.max_depth,
                self.settings.sim_threshold,
            )
        };

        let (cluster, is_new) = match existing {
            Some(cluster) => (cluster, false),
            None => {
                let mut index = self.write_index();
                // 경합한 미스가 먼저 생성했을 수 있으므로 write lock 아래에서 재탐색
                match Self::tree_search(
                    &index.root,
                    &masked,
                    self.settings.max_depth,
                    self.settings.sim_threshold,
                ) {
                    Some(cluster) => (cluster, false),
                    None => {
                        let cluster =
                            self.attach_cluster(&mut index, masked.clone(), timestamp, line);
                        (cluster, true)
                    }
                }
            }
        };

        let template_tokens = if is_new {
            masked
        } else {
            cluster.absorb(&masked, timestamp, line, self.settings.max_sample_logs)
        };

        let variables = extract_variables(&template_tokens, &raw_tokens);

        Ok(ParseResult {
            template_id: cluster.id().to_owned(),
            template: template_tokens.join(" "),
            variables,
            is_new,
        })
    }

    /// 라우팅 키를 따라 단말 노드까지 내려가 최적 매칭 클러스터를 찾습니다.
    fn tree_search(
        root: &ClusterNode,
        tokens: &[String],
        max_depth: usize,
        sim_threshold: f64,
    ) -> Option<Arc<LogCluster>> {
        let mut node = root;
        let mut depth = 1usize;
        loop {
            if depth >= max_depth || depth > tokens.len() {
                return Self::find_best_match(&node.clusters, tokens, sim_threshold);
            }

            if depth == 1 {
                let length_key = format!("len_{}", tokens.len());
                match node.children.get(&length_key) {
                    Some(child) => node = child,
                    None => return None,
                }
            } else {
                let token = tokens[depth - 2].as_str();
                if let Some(child) = node.children.get(token) {
                    node = child;
                } else if let Some(child) = node.children.get(WILDCARD) {
                    node = child;
                } else {
                    return Self::find_best_match(&node.clusters, tokens, sim_threshold);
                }
            }
            depth += 1;
        }
    }

    /// 부착된 클러스터 중 유사도가 임계값 이상인 최적 매칭을 찾습니다.
    ///
    /// 동률이면 먼저 삽입된 클러스터가 우선합니다.
    fn find_best_match(
        clusters: &[Arc<LogCluster>],
        tokens: &[String],
        sim_threshold: f64,
    ) -> Option<Arc<LogCluster>> {
        let mut best: Option<(f64, &Arc<LogCluster>)> = None;
        for cluster in clusters {
            let Some(sim) = cluster.similarity(tokens) else {
                continue;
            };
            if sim < sim_threshold {
                continue;
            }
            if best.is_none_or(|(max_sim, _)| sim > max_sim) {
                best = Some((sim, cluster));
            }
        }
        best.map(|(_, cluster)| Arc::clone(cluster))
    }

    /// 새 클러스터를 생성하고 조회와 같은 라우팅 키를 따라 트리에
    /// 부착합니다. 호출자는 write lock을 보유해야 합니다.
    fn attach_cluster(
        &self,
        index: &mut TreeIndex,
        tokens: Vec<String>,
        timestamp: i64,
        raw: &str,
    ) -> Arc<LogCluster> {
        let cluster = Arc::new(LogCluster::new(
            tokens.clone(),
            timestamp,
            raw,
            self.settings.max_sample_logs,
        ));
        tracing::debug!(
            template_id = %cluster.id(),
            token_len = tokens.len(),
            "created new template cluster"
        );
        index
            .clusters
            .insert(cluster.id().to_owned(), Arc::clone(&cluster));

        let max_depth = self.settings.max_depth;
        let max_children = self.settings.max_children;
        let max_clusters = self.settings.max_clusters;

        let mut node = &mut index.root;
        let mut depth = 1usize;
        loop {
            if depth >= max_depth || depth > tokens.len() {
                if node.clusters.len() >= max_clusters {
                    tracing::warn!(
                        depth = node.depth,
                        clusters = node.clusters.len(),
                        "leaf cluster capacity exceeded, appending anyway"
                    );
                }
                node.clusters.push(Arc::clone(&cluster));
                return cluster;
            }

            let key = if depth == 1 {
                format!("len_{}", tokens.len())
            } else {
                let token = &tokens[depth - 2];
                if node.children.contains_key(token.as_str())
                    || node.children.len() < max_children
                {
                    token.clone()
                } else {
                    // 자식 수 상한 도달: 와일드카드 경로로 우회
                    WILDCARD.to_owned()
                }
            };

            let child_depth = depth;
            node = node
                .children
                .entry(key)
                .or_insert_with(|| ClusterNode::new(child_depth));
            depth += 1;
        }
    }

    /// ID로 클러스터 스냅샷을 조회합니다.
    pub fn cluster(&self, id: &str) -> Option<ClusterSnapshot> {
        self.read_index().clusters.get(id).map(|c| c.snapshot())
    }

    /// 모든 클러스터의 스냅샷을 반환합니다 (순서 미보장).
    pub fn clusters(&self) -> Vec<ClusterSnapshot> {
        self.read_index()
            .clusters
            .values()
            .map(|c| c.snapshot())
            .collect()
    }

    /// 현재 클러스터 수를 반환합니다.
    pub fn cluster_count(&self) -> usize {
        self.read_index().clusters.len()
    }

    /// 트리 전체 통계를 계산합니다.
    pub fn stats(&self) -> DrainStats {
        let index = self.read_index();
        let total_clusters = index.clusters.len();
        let total_logs: u64 = index.clusters.values().map(|c| c.size()).sum();
        let average_size = if total_clusters > 0 {
            total_logs as f64 / total_clusters as f64
        } else {
            0.0
        };
        DrainStats {
            total_clusters,
            total_logs,
            average_size,
        }
    }
}

/// 템플릿과 원본 토큰을 나란히 순회하며 와일드카드 위치의 값을
/// 추출합니다. 키는 템플릿 위치 순서대로 `var_0`, `var_1`, …입니다.
fn extract_variables(template: &[String], raw: &[&str]) -> HashMap<String, String> {
    let mut variables = HashMap::new();
    let mut counter = 0usize;
    for (i, token) in template.iter().enumerate() {
        if token == WILDCARD && i < raw.len() {
            variables.insert(format!("var_{counter}"), raw[i].to_owned());
            counter += 1;
        }
    }
    variables
}
