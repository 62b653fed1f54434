#![no_main]

use libfuzzer_sys::fuzz_target;
use logloom_core::config::RedactorSettings;
use logloom_pipeline::Redactor;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let redactor = Redactor::new(&RedactorSettings::default()).expect("builtin patterns compile");

    let once = redactor.redact(&text);
    // 내장 패턴에 대해 마스킹은 멱등이어야 한다
    let twice = redactor.redact(&once);
    assert_eq!(once, twice);

    let _ = redactor.detect(&text);
});
