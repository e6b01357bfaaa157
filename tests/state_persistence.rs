mod common;

use std::fs;

use chatweave::chat::{ChatMessage, ModelConfig};
use chatweave::commands::sessions::session_rows;
use chatweave::store::{ChatState, StateFile, STATE_VERSION};
use serde_json::{json, Value};
use tempfile::TempDir;

#[test]
fn test_legacy_file_is_upgraded_and_saved_at_current_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        json!({
            "version": 1.0,
            "state": {
                "sessions": [
                    {"topic": "Old chat", "messages": [
                        {"role": "user", "content": "hello"},
                        {"role": "assistant", "content": "hi!"}
                    ]}
                ]
            }
        })
        .to_string(),
    )
    .unwrap();

    let file = StateFile::new(&path);
    let state = file.load(&ModelConfig::default()).unwrap();
    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.sessions[0].topic, "Old chat");
    assert_eq!(state.sessions[0].messages.len(), 2);
    assert!(!state.sessions[0].id.is_empty());

    file.save(&state).unwrap();
    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["version"].as_f64(), Some(STATE_VERSION));
    assert_eq!(
        raw["state"]["sessions"][0]["mask"]["modelConfig"]["sendMemory"],
        json!(true)
    );
}

#[test]
fn test_unversioned_file_treated_as_oldest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        json!({"state": {"sessions": [{"topic": "T", "messages": []}]}}).to_string(),
    )
    .unwrap();

    let state = StateFile::new(&path).load(&ModelConfig::default()).unwrap();
    assert_eq!(state.sessions[0].topic, "T");
}

#[test]
fn test_round_trip_keeps_listing() {
    let dir = TempDir::new().unwrap();
    let file = StateFile::new(dir.path().join("state.json"));
    let config = ModelConfig::default();
    let mut state = ChatState::new(&config);
    state.sessions[0].topic = "Saved".to_string();
    state.sessions[0].messages.push(ChatMessage::user("one"));
    state.sessions[0].clear_context_index = Some(1);
    file.save(&state).unwrap();

    let loaded = file.load(&config).unwrap();
    let rows = session_rows(&loaded);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].topic, "Saved");
    assert_eq!(rows[0].messages, 1);
    assert_eq!(loaded.sessions[0].clear_context_index, Some(1));
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{not json").unwrap();
    assert!(StateFile::new(&path).load(&ModelConfig::default()).is_err());
}
