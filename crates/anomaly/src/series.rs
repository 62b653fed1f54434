//! 키별 시계열 저장소 -- 관측값 누적과 고정 베이스라인
//!
//! 에러 카운트 스트림과 볼륨 카운트 스트림은 별도 타입 계층 없이
//! 같은 [`SeriesSet`]의 두 인스턴스로 모델링됩니다. 집계 방식(합/평균)만
//! 호출 측에서 달라집니다.

use std::collections::HashMap;

use logloom_core::types::{Baseline, TimePoint};

/// 윈도우 집계 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowAggregate {
    /// 윈도우 내 관측값의 합 (에러 카운트)
    Sum,
    /// 윈도우 내 관측값의 평균 (볼륨)
    Mean,
}

/// 베이스라인이 붙은 키별 시계열 집합
#[derive(Debug, Default)]
pub(crate) struct SeriesSet {
    points: HashMap<String, Vec<TimePoint>>,
    baselines: HashMap<String, Baseline>,
}

impl SeriesSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 관측값을 추가하고 해당 키의 총 관측 수를 반환합니다.
    pub(crate) fn append(&mut self, key: &str, point: TimePoint) -> usize {
        let series = self.points.entry(key.to_owned()).or_default();
        series.push(point);
        series.len()
    }

    /// `timestamp > cutoff`인 관측값을 집계합니다.
    pub(crate) fn window_aggregate(
        &self,
        key: &str,
        cutoff: i64,
        mode: WindowAggregate,
    ) -> f64 {
        let Some(series) = self.points.get(key) else {
            return 0.0;
        };
        let mut sum = 0.0;
        let mut count = 0usize;
        for point in series {
            if point.timestamp > cutoff {
                sum += point.value;
                count += 1;
            }
        }
        match mode {
            WindowAggregate::Sum => sum,
            WindowAggregate::Mean => {
                if count > 0 {
                    sum / count as f64
                } else {
                    0.0
                }
            }
        }
    }

    /// 키의 베이스라인을 반환합니다.
    ///
    /// 최초 호출 시점에 존재하는 모든 관측값으로 한 번 계산하여 캐싱하며,
    /// 이후에는 관측값이 늘어나도 갱신하지 않습니다 (고정 베이스라인).
    pub(crate) fn baseline(&mut self, key: &str) -> Baseline {
        if let Some(baseline) = self.baselines.get(key) {
            return *baseline;
        }
        let baseline = compute_baseline(self.points.get(key).map_or(&[][..], Vec::as_slice));
        self.baselines.insert(key.to_owned(), baseline);
        baseline
    }

    /// 캐싱된 베이스라인을 조회합니다 (아직 계산 전이면 `None`).
    pub(crate) fn cached_baseline(&self, key: &str) -> Option<Baseline> {
        self.baselines.get(key).copied()
    }

    /// 추적 중인 키 수를 반환합니다.
    pub(crate) fn key_count(&self) -> usize {
        self.points.len()
    }
}

/// 관측값 전체에서 평균과 모표준편차를 계산합니다.
///
/// 표준편차는 0으로 나누기를 피하기 위해 최소 1.0으로 클램핑됩니다.
fn compute_baseline(points: &[TimePoint]) -> Baseline {
    if points.is_empty() {
        return Baseline {
            mean: 0.0,
            std_dev: 1.0,
            count: 0,
        };
    }

    let n = points.len() as f64;
    let mean = points.iter().map(|p| p.value).sum::<f64>() / n;
    let variance = points
        .iter()
        .map(|p| {
            let diff = p.value - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt().max(1.0);

    Baseline {
        mean,
        std_dev,
        count: points.len() as u64,
    }
}
