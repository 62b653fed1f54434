//! 압축 레코드 생성 -- 파싱 결과를 CompressedRecord로 변환
//!
//! `compressed_size`는 실제 인코딩 크기가 아니라
//! `|template_id| + Σ(|key| + |value|)` 추정치입니다. 템플릿 본문은
//! 템플릿 저장소에 한 번만 존재한다고 가정합니다.

use std::collections::HashMap;

use logloom_core::types::{CompressedRecord, LogMessage, ParseResult};

/// 압축 후 추정 크기를 계산합니다.
fn estimate_size(template_id: &str, variables: &HashMap<String, String>) -> usize {
    template_id.len()
        + variables
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum::<usize>()
}

/// 파싱 결과와 마스킹된 변수로 압축 레코드를 만듭니다.
pub fn build_record(
    msg: &LogMessage,
    parsed: &ParseResult,
    variables: HashMap<String, String>,
) -> CompressedRecord {
    let compressed_size = estimate_size(&parsed.template_id, &variables);
    CompressedRecord {
        log_id: uuid::Uuid::new_v4().to_string(),
        template_id: parsed.template_id.clone(),
        template: parsed.template.clone(),
        variables,
        source: msg.source.clone(),
        timestamp: msg.timestamp,
        original_size: msg.content.len(),
        compressed_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_parsed() -> ParseResult {
        ParseResult {
            template_id: "tmpl_abcd".to_owned(), // 9 bytes
            template: "Error at <*>".to_owned(),
            variables: HashMap::new(),
            is_new: false,
        }
    }

    #[test]
    fn size_estimate_sums_id_and_variables() {
        let msg = LogMessage::new("Error at 192.168.1.1", "test");
        let mut variables = HashMap::new();
        variables.insert("var_0".to_owned(), "192.168.1.1".to_owned()); // 5 + 11

        let record = build_record(&msg, &sample_parsed(), variables);
        assert_eq!(record.compressed_size, 9 + 5 + 11);
        assert_eq!(record.original_size, "Error at 192.168.1.1".len());
    }

    #[test]
    fn empty_variables_size_is_id_length() {
        let msg = LogMessage::new("Error at nowhere", "test");
        let record = build_record(&msg, &sample_parsed(), HashMap::new());
        assert_eq!(record.compressed_size, 9);
    }

    #[test]
    fn record_carries_message_fields() {
        let msg = LogMessage::new("Error at 10.0.0.1", "syslog").with_timestamp(777);
        let record = build_record(&msg, &sample_parsed(), HashMap::new());
        assert_eq!(record.source, "syslog");
        assert_eq!(record.timestamp, 777);
        assert_eq!(record.template_id, "tmpl_abcd");
        assert!(!record.log_id.is_empty());
    }

    #[test]
    fn log_ids_are_unique() {
        let msg = LogMessage::new("x", "test");
        let a = build_record(&msg, &sample_parsed(), HashMap::new());
        let b = build_record(&msg, &sample_parsed(), HashMap::new());
        assert_ne!(a.log_id, b.log_id);
    }
}
