//! 토크나이저와 전처리기 -- 라인 분리 및 변수 마스킹
//!
//! 토큰화는 순수하게 어휘적입니다: 공백 연속으로 분리하고 빈 토큰은
//! 버립니다. 전처리기는 명백한 변수(숫자, IP, UUID, 16진수, 경로, URL,
//! 이메일)를 와일드카드로 치환하여 트리 라우팅 키의 변동을 줄입니다.
//! 출력 길이는 항상 입력 길이와 같으며, 이 길이가 depth 1 라우팅 키가
//! 됩니다.

use regex::Regex;

use crate::error::DrainError;

/// 와일드카드 토큰 센티널
pub const WILDCARD: &str = "<*>";

/// 변수 마스킹 패턴 (적용 순서 고정)
const MASK_PATTERNS: [&str; 7] = [
    // IPv4 주소
    r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
    // UUID
    r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b",
    // 16진수 문자열 (8자 이상)
    r"\b[0-9a-fA-F]{8,}\b",
    // 순수 숫자
    r"\b\d+\b",
    // 파일 경로
    r"/[^\s]+",
    // URL
    r"https?://[^\s]+",
    // 이메일 주소
    r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
];

/// 로그 라인을 토큰으로 분리합니다.
///
/// 공백 연속을 기준으로 분리하며 빈 토큰은 버립니다.
/// 따옴표나 이스케이프는 해석하지 않습니다.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// 변수 마스킹 전처리기
///
/// 생성 시점에 패턴을 한 번 컴파일합니다. 컴파일 실패는 치명적이며
/// 트리 생성 자체가 실패합니다.
pub struct TokenMasker {
    patterns: Vec<Regex>,
}

impl TokenMasker {
    /// 마스킹 패턴을 컴파일하여 전처리기를 생성합니다.
    pub fn new() -> Result<Self, DrainError> {
        let mut patterns = Vec::with_capacity(MASK_PATTERNS.len());
        for pattern in MASK_PATTERNS {
            let regex = Regex::new(pattern).map_err(|e| DrainError::Pattern {
                pattern: pattern.to_owned(),
                reason: e.to_string(),
            })?;
            patterns.push(regex);
        }
        Ok(Self { patterns })
    }

    /// 토큰이 변수로 보이는지 판정합니다.
    fn is_variable(&self, token: &str) -> bool {
        if token.parse::<f64>().is_ok() {
            return true;
        }
        self.patterns.iter().any(|p| p.is_match(token))
    }

    /// 토큰 시퀀스에서 변수를 와일드카드로 치환합니다.
    ///
    /// 출력 길이는 입력 길이와 같습니다.
    pub fn mask(&self, tokens: &[&str]) -> Vec<String> {
        tokens
            .iter()
            .map(|token| {
                if self.is_variable(token) {
                    WILDCARD.to_owned()
                } else {
                    (*token).to_owned()
                }
            })
            .collect()
    }
}
