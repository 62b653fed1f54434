//! PII 마스킹 -- 추출된 변수 값의 개인정보 치환
//!
//! 템플릿이 아니라 이미 추출된 변수 값에 패턴 기반 치환을 적용합니다.
//! 내장 패턴의 플레이스홀더는 어떤 패턴과도 매칭되지 않으므로
//! `redact(redact(x)) == redact(x)`가 성립합니다 (멱등성).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;

use logloom_core::config::RedactorSettings;

use crate::error::IngestError;

/// 알 수 없는 종류에 쓰는 기본 플레이스홀더
const GENERIC_PLACEHOLDER: &str = "[REDACTED]";

/// PII 종류별 플레이스홀더를 반환합니다.
pub fn placeholder_for(kind: &str) -> &'static str {
    match kind {
        "email" => "[EMAIL_REDACTED]",
        "phone" => "[PHONE_REDACTED]",
        "ssn" => "[SSN_REDACTED]",
        "credit_card" => "[CC_REDACTED]",
        "ipv4" => "[IPV4_REDACTED]",
        "ipv6" => "[IPV6_REDACTED]",
        _ => GENERIC_PLACEHOLDER,
    }
}

/// PII 마스킹기
///
/// 패턴은 생성 시점에 한 번 컴파일되어 이후 불변입니다.
/// 활성화 플래그만 원자적으로 토글할 수 있으며, 비활성화된 마스킹기는
/// 항등 함수입니다.
pub struct Redactor {
    /// (종류, 컴파일된 패턴) -- 적용 순서 고정
    patterns: Vec<(String, Regex)>,
    enabled: AtomicBool,
}

impl Redactor {
    /// 설정에 따라 패턴을 컴파일하여 마스킹기를 생성합니다.
    ///
    /// 사용자 정의 패턴의 컴파일 실패는 시작 시점 에러입니다.
    pub fn new(settings: &RedactorSettings) -> Result<Self, IngestError> {
        let mut specs: Vec<(&str, &str)> = Vec::new();
        if settings.redact_emails {
            specs.push(("email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"));
        }
        if settings.redact_phones {
            specs.push((
                "phone",
                r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            ));
        }
        if settings.redact_ssn {
            specs.push(("ssn", r"\b\d{3}-\d{2}-\d{4}\b"));
        }
        if settings.redact_credit_cards {
            specs.push(("credit_card", r"\b(?:\d{4}[-\s]?){3}\d{4}\b"));
        }
        if settings.redact_ipv4 {
            specs.push(("ipv4", r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b"));
        }
        if settings.redact_ipv6 {
            specs.push(("ipv6", r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b"));
        }

        let mut patterns = Vec::with_capacity(specs.len() + settings.custom_patterns.len());
        for (kind, pattern) in specs {
            let regex = Regex::new(pattern).map_err(|e| IngestError::Pattern {
                name: kind.to_owned(),
                reason: e.to_string(),
            })?;
            patterns.push((kind.to_owned(), regex));
        }

        // 사용자 정의 패턴은 이름순으로 정렬해 적용 순서를 결정적으로 유지
        let mut custom: Vec<_> = settings.custom_patterns.iter().collect();
        custom.sort_by(|a, b| a.0.cmp(b.0));
        for (name, pattern) in custom {
            let regex = Regex::new(pattern).map_err(|e| IngestError::Pattern {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            patterns.push((name.clone(), regex));
        }

        Ok(Self {
            patterns,
            enabled: AtomicBool::new(true),
        })
    }

    /// 텍스트의 PII를 플레이스홀더로 치환합니다.
    pub fn redact(&self, text: &str) -> String {
        if !self.is_enabled() {
            return text.to_owned();
        }
        let mut result = text.to_owned();
        for (kind, pattern) in &self.patterns {
            if pattern.is_match(&result) {
                result = pattern
                    .replace_all(&result, placeholder_for(kind))
                    .into_owned();
            }
        }
        result
    }

    /// 변수 맵의 모든 값에 마스킹을 적용합니다.
    pub fn redact_map(&self, variables: &HashMap<String, String>) -> HashMap<String, String> {
        if !self.is_enabled() {
            return variables.clone();
        }
        variables
            .iter()
            .map(|(key, value)| (key.clone(), self.redact(value)))
            .collect()
    }

    /// 텍스트에 포함된 PII 종류를 탐지합니다 (패턴 순서대로).
    pub fn detect(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(kind, _)| kind.clone())
            .collect()
    }

    /// 마스킹을 활성화합니다.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// 마스킹을 비활성화합니다.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// 마스킹 활성화 여부를 반환합니다.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// 앞 `visible`글자만 남기고 나머지를 `*`로 가립니다.
pub fn mask(text: &str, visible: usize) -> String {
    let total = text.chars().count();
    if total <= visible {
        return "*".repeat(total);
    }
    let kept: String = text.chars().take(visible).collect();
    let masked = "*".repeat(total - visible);
    kept + &masked
}

/// 이메일 주소를 첫 글자와 도메인만 남기고 가립니다.
///
/// 예: `john@example.com` -> `j***@example.com`
pub fn mask_email(email: &str) -> String {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return "[INVALID_EMAIL]".to_owned();
    };

    let local_len = local.chars().count();
    if local_len <= 1 {
        return format!("{local}@{domain}");
    }

    let first: String = local.chars().take(1).collect();
    format!("{}{}@{}", first, "*".repeat(local_len - 1), domain)
}
