#![no_main]

use libfuzzer_sys::fuzz_target;
use logloom_core::config::DrainSettings;
use logloom_drain::DrainTree;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let tree = DrainTree::new(DrainSettings::default()).expect("default settings must compile");

    // 크래시나 패닉 없이 Ok 또는 Err을 반환해야 한다
    let _ = tree.parse(&line, 0);
    // 같은 라인을 다시 넣어도 안전해야 한다 (히트 경로)
    let _ = tree.parse(&line, 1);
});
