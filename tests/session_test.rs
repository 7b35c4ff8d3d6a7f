mod common;

use common::{Call, ScriptedEngine};
use ocr_session::{EngineMode, OcrError, OcrSession, PageSegMode, SessionConfig, VariablePolicy};

#[test]
fn test_open_then_dispose() {
    let engine = ScriptedEngine::new();
    let config = SessionConfig::new("eng").with_datapath("/opt/tessdata");

    let session = OcrSession::open(&engine, &config).expect("session should open");
    session.dispose();

    assert_eq!(
        engine.calls(),
        vec![
            Call::Create,
            Call::Init {
                datapath: Some("/opt/tessdata".to_string()),
                language: "eng".to_string(),
                mode: EngineMode::Default,
                profiles: vec![],
            },
            Call::Delete,
        ]
    );
}

#[test]
fn test_page_seg_mode_applied_right_after_init() {
    let engine = ScriptedEngine::new();
    let config = SessionConfig::new("deu")
        .with_engine_mode(EngineMode::LstmOnly)
        .with_config_profile("digits")
        .with_config_profile("hocr")
        .with_page_seg_mode(PageSegMode::SingleLine)
        .with_variable("user_defined_dpi", "300");

    drop(OcrSession::open(&engine, &config).unwrap());

    let calls = engine.calls();
    assert_eq!(
        calls[1],
        Call::Init {
            datapath: None,
            language: "deu".to_string(),
            mode: EngineMode::LstmOnly,
            profiles: vec!["digits".to_string(), "hocr".to_string()],
        }
    );
    assert_eq!(calls[2], Call::PageSegMode(PageSegMode::SingleLine));
    assert_eq!(
        calls[3],
        Call::Variable("user_defined_dpi".to_string(), "300".to_string())
    );
    assert_eq!(calls.last(), Some(&Call::Delete));
}

#[test]
fn test_no_page_seg_mode_by_default() {
    let engine = ScriptedEngine::new();
    let config = SessionConfig::default();

    drop(OcrSession::open(&engine, &config).unwrap());

    assert_eq!(engine.count(|c| matches!(c, Call::PageSegMode(_))), 0);
}

#[test]
fn test_rejected_variables_do_not_stop_propagation() {
    let mut engine = ScriptedEngine::new();
    engine.unknown_variables = vec!["bogus_knob".to_string()];
    let config = SessionConfig::default()
        .with_variable("bogus_knob", "1")
        .with_variable("tessedit_char_whitelist", "0123456789")
        .with_variable_policy(VariablePolicy::Warn);

    let session = OcrSession::open(&engine, &config).unwrap();
    assert_eq!(session.rejected_variables(), ["bogus_knob".to_string()]);
    drop(session);

    assert_eq!(engine.count(|c| matches!(c, Call::Variable(..))), 2);
}

#[test]
fn test_strict_policy_fails_and_still_releases_handle() {
    let mut engine = ScriptedEngine::new();
    engine.unknown_variables = vec!["bogus_knob".to_string()];
    let config = SessionConfig::default()
        .with_variable("bogus_knob", "1")
        .with_variable_policy(VariablePolicy::Strict);

    let err = OcrSession::open(&engine, &config).err().expect("strict policy should fail");
    assert!(matches!(err, OcrError::VariableRejected { ref key } if key == "bogus_knob"));
    assert_eq!(engine.created(), 1);
    assert_eq!(engine.deleted(), 1);
}

#[test]
fn test_failed_init_releases_handle() {
    let mut engine = ScriptedEngine::new();
    engine.missing_languages = vec!["xyz".to_string()];
    let config = SessionConfig::new("xyz");

    let err = OcrSession::open(&engine, &config).err().expect("init should fail");
    assert!(matches!(err, OcrError::InitializationError(_)));
    assert_eq!(engine.created(), 1);
    assert_eq!(engine.deleted(), 1);
    assert_eq!(engine.count(|c| matches!(c, Call::Variable(..))), 0);
}
