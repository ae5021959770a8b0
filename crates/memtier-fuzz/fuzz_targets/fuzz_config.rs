#![no_main]
use libfuzzer_sys::fuzz_target;
use memtier_core::config::parse;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = parse(text) {
        assert!(!config.is_empty());
        assert!(config.tiers().iter().all(|t| t.ratio() > 0));
        let first = config.tiers()[0].kind();
        assert_eq!(config.tiers().iter().filter(|t| t.kind() == first).count(), 1);
    }
});
