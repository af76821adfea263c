use std::fs;

use joint_decode_lib::{DecodeConfig, DecodeError, SearchMode, TokenList};

#[test]
fn env_overrides_are_applied() {
    std::env::set_var("DECODE_BEAM_SIZE", "7");
    std::env::set_var("DECODE_CTC_WEIGHT", "0.4");
    std::env::set_var("DECODE_MODE", "greedy");
    std::env::set_var("DECODE_NBEST", "0");

    let config = DecodeConfig::from_env();
    assert_eq!(config.beam_size, 7);
    assert!((config.ctc_weight - 0.4).abs() < f64::EPSILON);
    assert_eq!(config.mode, SearchMode::Greedy);
    assert_eq!(config.nbest, None);
    assert!(matches!(config.validate(), Err(DecodeError::Unsupported(_))));

    for key in ["DECODE_BEAM_SIZE", "DECODE_CTC_WEIGHT", "DECODE_MODE", "DECODE_NBEST"] {
        std::env::remove_var(key);
    }
}

#[test]
fn config_loads_from_json_file() {
    let path = std::env::temp_dir().join(format!("decode-config-{}.json", std::process::id()));
    fs::write(
        &path,
        r#"{"beam_size": 10, "ctc_weight": 0.3, "penalty": 0.5, "nbest": 3}"#,
    )
    .unwrap();

    let config = DecodeConfig::from_path(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(config.beam_size, 10);
    assert_eq!(config.nbest, Some(3));
    assert_eq!(config.mode, SearchMode::Beam);
    assert!(config.validate().is_ok());
}

#[test]
fn malformed_json_is_a_json_error() {
    let err = DecodeConfig::from_json_str("{beam_size: 3").unwrap_err();
    assert!(matches!(err, DecodeError::Json(_)));
    assert!(err.user_message().contains("settings"));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = DecodeConfig::from_path("/nonexistent/decode.json").unwrap_err();
    assert!(matches!(err, DecodeError::Io(_)));
}

#[test]
fn token_list_loads_from_file() {
    let path = std::env::temp_dir().join(format!("tokens-{}.txt", std::process::id()));
    fs::write(&path, "<blank> 0\nh 1\ni 2\n<space> 3\n<eos> 4\n").unwrap();

    let list = TokenList::from_path(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(list.len(), 5);
    assert_eq!(list.get(2), Some("i"));
}
