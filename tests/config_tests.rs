// Config file loading tests

use asr_relay::Config;
use std::fs;

fn write_config(dir: &std::path::Path, contents: &str) -> String {
    let path = dir.join("relay.toml");
    fs::write(&path, contents).unwrap();
    dir.join("relay").to_string_lossy().into_owned()
}

#[test]
fn test_load_full_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [service]
        name = "asr-relay"

        [service.ws]
        bind = "0.0.0.0"
        port = 7000

        [engine]
        model = "paraformer-realtime-v2"
        endpoint = "wss://example.com/api-ws/v1/inference"
        vocabulary_endpoint = "https://example.com/api/v1/services/audio/asr/customization"
        api_key = "sk-test"
        sample_rate = 16000
        language_hints = ["zh", "en"]
        semantic_punctuation = true

        [session]
        max_pending_events = 128
        engine_flush_timeout_secs = 3
        drain_timeout_secs = 7

        [audio]
        capture_dir = "captures"
        "#,
    );

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.service.name, "asr-relay");
    assert_eq!(cfg.service.ws.bind, "0.0.0.0");
    assert_eq!(cfg.service.ws.port, 7000);
    assert_eq!(cfg.engine.model, "paraformer-realtime-v2");
    assert_eq!(cfg.engine.api_key.as_deref(), Some("sk-test"));
    assert_eq!(cfg.engine.sample_rate, 16000);
    assert_eq!(cfg.engine.language_hints, vec!["zh", "en"]);
    assert!(cfg.engine.semantic_punctuation);
    assert_eq!(cfg.session.max_pending_events, 128);
    assert_eq!(cfg.session.engine_flush_timeout_secs, 3);
    assert_eq!(cfg.session.drain_timeout_secs, 7);
    assert_eq!(cfg.audio.capture_dir.as_deref(), Some("captures"));
}

#[test]
fn test_session_and_audio_sections_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [service]
        name = "asr-relay"

        [service.ws]
        bind = "127.0.0.1"
        port = 6220

        [engine]
        model = "paraformer-realtime-v2"
        endpoint = "wss://example.com/api-ws/v1/inference"
        vocabulary_endpoint = "https://example.com/api/v1/services/audio/asr/customization"
        sample_rate = 16000
        language_hints = ["en"]
        "#,
    );

    let cfg = Config::load(&path).unwrap();
    assert_eq!(cfg.engine.api_key, None);
    assert!(!cfg.engine.semantic_punctuation);
    assert_eq!(cfg.session.max_pending_events, 4096);
    assert_eq!(cfg.session.engine_flush_timeout_secs, 5);
    assert_eq!(cfg.session.drain_timeout_secs, 10);
    assert_eq!(cfg.audio.capture_dir, None);
}

#[test]
fn test_missing_config_fails() {
    assert!(Config::load("does/not/exist").is_err());
}
