use std::error::Error;
use std::fs;

use lorebook_core::{
    decode, encode, DeleteOutcome, DropCandidate, EditorSession, EntryUid, LoadError, Placement,
    Strategy,
};
use serde_json::{json, Value};
use tempfile::tempdir;

const AB: &str = r#"{"entries": {"0": {"comment": "A"}, "1": {"comment": "B"}}}"#;

fn exported(session: &mut EditorSession) -> Result<Value, Box<dyn Error>> {
    let document = session.export()?;
    Ok(serde_json::from_str(&document.text)?)
}

#[test]
fn duplicate_then_export_keys_by_position() -> Result<(), Box<dyn Error>> {
    let mut session = EditorSession::load(AB, Some("ab.json"))?;
    let uids: Vec<u64> = session.entries().iter().map(|e| e.uid().as_u64()).collect();
    assert_eq!(uids, vec![0, 1]);

    let copy = session.duplicate(EntryUid::new(0)).expect("entry 0 exists");
    assert_eq!(copy, EntryUid::new(2));
    let comments: Vec<_> = session.entries().iter().map(|e| e.comment.as_str()).collect();
    assert_eq!(comments, ["A", "A", "B"]);

    let document = session.export()?;
    assert_eq!(document.file_name, "edited_ab.json");
    let value: Value = serde_json::from_str(&document.text)?;
    let entries = value["entries"].as_object().expect("entries object");
    let keys: Vec<_> = entries.keys().cloned().collect();
    assert_eq!(keys, ["0", "1", "2"]);
    assert_eq!(entries["0"]["uid"], json!(0));
    assert_eq!(entries["1"]["uid"], json!(2));
    assert_eq!(entries["1"]["comment"], json!("A"));
    assert_eq!(entries["2"]["uid"], json!(1));
    for (key, entry) in entries {
        assert_eq!(entry["displayIndex"].to_string(), *key);
    }
    Ok(())
}

#[test]
fn round_trip_preserves_fields_and_order() -> Result<(), Box<dyn Error>> {
    let raw = r#"{"entries": {
        "z": {"uid": 8, "key": ["sword", "blade"], "keysecondary": ["steel"], "comment": "Sword",
              "content": "A blade.", "constant": true, "vectorized": false, "selective": false,
              "selectiveLogic": 1, "disable": true, "order": 12, "probability": 55, "group": "arms",
              "role": 2, "extension": {"note": "kept"}},
        "a": {"uid": 3, "comment": "Shield"}
    }}"#;
    let mut session = EditorSession::load(raw, None)?;
    let first = exported(&mut session)?;

    let mut reloaded = EditorSession::load(&first.to_string(), None)?;
    let second = exported(&mut reloaded)?;
    assert_eq!(first, second);

    let sword = &first["entries"]["0"];
    assert_eq!(sword["uid"], json!(8));
    assert_eq!(sword["key"], json!(["sword", "blade"]));
    assert_eq!(sword["constant"], json!(true));
    assert_eq!(sword["vectorized"], json!(false));
    assert_eq!(sword["selectiveLogic"], json!(1));
    assert_eq!(sword["disable"], json!(true));
    assert_eq!(sword["order"], json!(12));
    assert_eq!(sword["probability"], json!(55));
    assert_eq!(sword["extension"], json!({"note": "kept"}));
    assert_eq!(first["entries"]["1"]["comment"], json!("Shield"));
    Ok(())
}

#[test]
fn codec_round_trip_matches_entries() -> Result<(), Box<dyn Error>> {
    let entries = decode(AB)?;
    let again = lorebook_core::decode_value(&encode(&entries))?;
    assert_eq!(entries, again);
    Ok(())
}

#[test]
fn declined_delete_keeps_export_byte_identical() -> Result<(), Box<dyn Error>> {
    let mut session = EditorSession::load(AB, Some("ab.json"))?;
    let before = session.export()?;
    let outcome = session.delete(EntryUid::new(1), &mut |_: &str| false);
    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(session.export()?.text, before.text);
    Ok(())
}

#[test]
fn mixed_edits_keep_uids_unique() -> Result<(), Box<dyn Error>> {
    let mut session = EditorSession::load(AB, None)?;
    let mut approve = |_: &str| true;
    for round in 0..5 {
        let added = session.add(Placement::Below(EntryUid::new(0)));
        session.duplicate(added);
        if round % 2 == 0 {
            session.delete(added, &mut approve);
        }
        let uids = session.registry().uids();
        assert_eq!(uids.len(), session.entries().len());
    }
    for (index, entry) in session.entries().iter().enumerate() {
        assert_eq!(entry.display_index(), index);
    }
    Ok(())
}

#[test]
fn strategy_edit_exports_flags() -> Result<(), Box<dyn Error>> {
    let mut session = EditorSession::load(AB, None)?;
    session.set_strategy(EntryUid::new(0), Strategy::Vectorized);
    session.set_strategy(EntryUid::new(1), Strategy::Constant);
    let value = exported(&mut session)?;
    assert_eq!(value["entries"]["0"]["constant"], json!(true));
    assert_eq!(value["entries"]["0"]["vectorized"], json!(true));
    assert_eq!(value["entries"]["1"]["constant"], json!(true));
    assert_eq!(value["entries"]["1"]["vectorized"], json!(false));
    Ok(())
}

#[test]
fn drag_reorders_export() -> Result<(), Box<dyn Error>> {
    let raw = r#"{"entries": {"0": {"comment": "A"}, "1": {"comment": "B"}, "2": {"comment": "C"}}}"#;
    let mut session = EditorSession::load(raw, None)?;
    let candidates: Vec<_> = session
        .entries()
        .iter()
        .enumerate()
        .map(|(row, entry)| DropCandidate::new(entry.uid(), row as f64 * 30.0, 30.0))
        .collect();
    let mut drag = session.begin_drag(EntryUid::new(0)).expect("entry 0 exists");
    drag.hover(400.0, &candidates);
    assert_eq!(session.finish_drag(drag, 400.0, &candidates), Some(2));

    let value = exported(&mut session)?;
    assert_eq!(value["entries"]["0"]["comment"], json!("B"));
    assert_eq!(value["entries"]["2"]["comment"], json!("A"));
    assert_eq!(value["entries"]["2"]["uid"], json!(0));
    Ok(())
}

#[test]
fn load_file_checks_extension() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let wrong = dir.path().join("book.txt");
    fs::write(&wrong, AB)?;
    assert!(matches!(
        EditorSession::load_file(&wrong),
        Err(LoadError::InvalidFileType { .. })
    ));

    let right = dir.path().join("Book.JSON");
    fs::write(&right, AB)?;
    let mut session = EditorSession::load_file(&right)?;
    assert_eq!(session.file_name(), Some("Book.JSON"));
    assert_eq!(session.export()?.file_name, "edited_Book.json");

    assert!(matches!(
        EditorSession::load_file(dir.path().join("missing.json")),
        Err(LoadError::Read { .. })
    ));
    Ok(())
}
