mod common;
use crate::common::*;

use tagstore::*;

#[test]
fn load_records() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let report = store.load_records(example_records(), LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(report.extent_tags(), 4);
    assert_eq!(report.link_tags(), 2);
    assert!(!store.in_batch());

    assert_eq!(store.extent_tag("PL0").unwrap().text(), "Paris");
    assert_eq!(store.extent_tag("P1").unwrap().attribute("same_as"), Some("P0"));
    assert_eq!(store.link_tag("L0").unwrap().attribute("certainty"), Some("high"));
    assert_eq!(store.link_tag("L1").unwrap().attribute("certainty"), Some("low"));
    assert_eq!(store.links_referencing("PL1")?.ids(), vec!["L1"]);
    assert_eq!(store.tags_at(23)[0].as_str(), "P1");
    Ok(())
}

#[test]
fn load_links_before_extents() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let mut records = example_records();
    records.reverse();
    let report = store.load_records(records, LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(store.link_tags_len(), 2);
    assert_eq!(
        store
            .link_tag("L1")
            .unwrap()
            .argument("from")
            .map(|tag| tag.as_str()),
        Some("P1")
    );
    Ok(())
}

#[test]
fn load_skip_invalid() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let mut records = example_records();
    records.push(ExtentRecord::new("PERSON", "P9", "8~3").into());
    records.push(ExtentRecord::new("ORGANIZATION", "O0", "0~5").into());
    records.push(
        LinkRecord::new("LIVES_IN", "L9")
            .with_argument("from", "P9")
            .with_argument("to", "PL0")
            .into(),
    );
    let report = store.load_records(records, LoadMode::SkipInvalid)?;
    assert!(!report.is_complete());
    assert_eq!(report.extent_tags(), 4);
    assert_eq!(report.link_tags(), 2);
    let skipped: Vec<Option<&str>> = report
        .skipped()
        .iter()
        .map(|(id, _)| id.as_deref())
        .collect();
    assert_eq!(skipped, vec![Some("P9"), Some("O0"), Some("L9")]);
    assert!(matches!(
        report.skipped()[0].1,
        TagStoreError::MalformedSpan(..)
    ));
    assert!(matches!(
        report.skipped()[1].1,
        TagStoreError::UnknownTagType(..)
    ));
    assert!(matches!(
        report.skipped()[2].1,
        TagStoreError::DanglingArgumentReference(..)
    ));
    assert!(!store.id_exists("P9"));
    assert!(!store.id_exists("L9"));
    assert!(store.id_exists("L1"));
    Ok(())
}

#[test]
fn load_strict_is_atomic() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let mut records = example_records();
    records.insert(2, ExtentRecord::new("PLACE", "PL7", "30~45").into());
    let result = store.load_records(records, LoadMode::Strict);
    assert!(matches!(result, Err(TagStoreError::OffsetOutOfBounds(..))));
    assert!(!store.in_batch());
    assert_eq!(store.extent_tags_len(), 0);
    assert_eq!(store.link_tags_len(), 0);
    assert!(!store.id_exists("P0"));
    assert!(store.tags_at(2).is_empty());

    // no identifiers were consumed by the aborted load
    store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(0, 5)?))?;
    assert!(store.id_exists("P0"));
    Ok(())
}

#[test]
fn load_verbatim_ids() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P0", "0~5").into(),
            ExtentRecord::new("PERSON", "P5", "22~25").into(),
        ],
        LoadMode::Strict,
    )?;
    store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(6, 11)?))?;
    assert!(store.id_exists("P1"));
    for _ in 0..4 {
        store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(6, 11)?))?;
    }
    for id in ["P2", "P3", "P4", "P6"] {
        assert!(store.id_exists(id), "{} should exist", id);
    }
    Ok(())
}

#[test]
fn load_oversized_span_without_text() -> Result<(), TagStoreError> {
    let mut store = AnnotationStore::new(setup_registry()?, Config::default());
    let report = store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P0", "0~5").into(),
            ExtentRecord::new("PERSON", "P1", "0~4000000000").into(),
        ],
        LoadMode::SkipInvalid,
    )?;
    assert_eq!(report.extent_tags(), 1);
    assert!(matches!(
        report.skipped()[0].1,
        TagStoreError::OffsetOutOfBounds(..)
    ));
    assert!(!store.id_exists("P1"));
    assert_eq!(store.tags_at(100).len(), 0);
    Ok(())
}

#[test]
fn load_records_without_ids() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let mut record = ExtentRecord::new("PLACE", "", "15~20");
    record.id = None;
    let report = store.load_records(vec![record.into()], LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(store.extent_tag("PL0").unwrap().text(), "Paris");
    Ok(())
}

#[test]
fn load_duplicate_ids() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let report = store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P0", "0~5").into(),
            ExtentRecord::new("PERSON", "P0", "22~25").into(),
        ],
        LoadMode::SkipInvalid,
    )?;
    assert_eq!(report.extent_tags(), 1);
    assert!(matches!(
        report.skipped()[0].1,
        TagStoreError::DuplicateId(..)
    ));
    assert_eq!(store.extent_tag("P0").unwrap().text(), "Alice");
    Ok(())
}

#[test]
fn load_forward_idref() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P0", "0~5")
                .with_attribute("same_as", "P1")
                .into(),
            ExtentRecord::new("PERSON", "P1", "22~25").into(),
        ],
        LoadMode::Strict,
    )?;
    assert_eq!(store.extent_tag("P0").unwrap().attribute("same_as"), Some("P1"));
    Ok(())
}

#[test]
fn load_dangling_idref_cleared() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    let report = store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P0", "0~5")
                .with_attribute("same_as", "P8")
                .into(),
            ExtentRecord::new("NOTE", "N0", "-1~-1")
                .with_attribute("about", "P0")
                .into(),
        ],
        LoadMode::Strict,
    )?;
    assert!(report.is_complete());
    assert_eq!(store.extent_tag("P0").unwrap().attribute("same_as"), Some(""));
    assert_eq!(store.extent_tag("N0").unwrap().attribute("about"), Some("P0"));
    Ok(())
}

#[test]
fn load_in_open_batch() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    store.begin_batch()?;
    assert!(matches!(
        store.load_records(example_records(), LoadMode::Strict),
        Err(TagStoreError::BatchError(..))
    ));
    store.abort_batch()?;
    Ok(())
}

#[test]
fn records_of_store() -> Result<(), TagStoreError> {
    let store = setup_example_1()?;
    let records = store.to_records();
    assert_eq!(records.extent_tags.len(), 4);
    assert_eq!(records.link_tags.len(), 2);
    assert_eq!(records.extent_tags[1].tagtype, "PLACE");
    assert_eq!(records.extent_tags[1].id.as_deref(), Some("PL0"));
    assert_eq!(records.extent_tags[1].spans, "15~20");
    assert_eq!(records.extent_tags[1].text.as_deref(), Some("Paris"));
    assert_eq!(
        records.link_tags[0].arguments.get("to").map(|id| id.as_str()),
        Some("PL0")
    );
    Ok(())
}

#[test]
fn json_roundtrip() -> Result<(), TagStoreError> {
    let mut store = setup_example_1()?;
    store.create_extent_tag(ExtentTagBuilder::new("NOTE").with_attribute("about", "P1"))?;
    store.create_link_tag(LinkTagBuilder::new("TRIPLE").with_argument("b", "PL1"))?;
    let json = store.to_json_string(&Config::default())?;
    let restored = AnnotationStore::from_json_str(&json, setup_registry()?, Config::default())?;
    assert!(!restored.changed());
    assert_eq!(restored.to_records(), store.to_records());
    assert_eq!(restored.incomplete_tags(), vec!["T0"]);
    Ok(())
}

#[test]
fn json_input() -> Result<(), TagStoreError> {
    let json = r#"{
        "extent_tags": [
            { "type": "PERSON", "id": "P0", "spans": "0~5", "attributes": { "role": "agent" } },
            { "type": "PLACE", "id": "PL0", "spans": "15~20" }
        ],
        "link_tags": [
            { "type": "LIVES_IN", "id": "L0", "arguments": { "from": "P0", "to": "PL0" } }
        ]
    }"#;
    let mut store = setup_empty()?;
    let report = store.load_json_str(json, LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(store.extent_tag("P0").unwrap().attribute("role"), Some("agent"));
    assert_eq!(store.extent_tag("PL0").unwrap().text(), "Paris");
    assert_eq!(store.links_referencing("P0")?.ids(), vec!["L0"]);
    Ok(())
}

#[test]
fn json_input_invalid() -> Result<(), TagStoreError> {
    let json = r#"{ "extent_tags": [ { "type": "PERSON", "id": "P0" } ] }"#;
    let mut store = setup_empty()?;
    assert!(matches!(
        store.load_json_str(json, LoadMode::SkipInvalid),
        Err(TagStoreError::JsonError(..))
    ));
    assert!(!store.in_batch());
    Ok(())
}

#[cfg(feature = "csv")]
#[test]
fn csv_roundtrip() -> Result<(), TagStoreError> {
    let mut store = setup_example_1()?;
    store.set_attribute("P1", "same_as", "P0")?;
    store.create_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::parse("0~5,22~25")?))?;
    let csv = store.to_csv_string()?;
    assert!(csv.starts_with("Kind,Type,Id,Spans,Text,Arguments,Attributes"));
    let mut restored = setup_empty()?;
    let report = restored.load_csv_reader(csv.as_bytes(), LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(restored.to_records(), store.to_records());
    assert_eq!(restored.extent_tag("P2").unwrap().text(), "Alice ... Bob");
    Ok(())
}

#[cfg(feature = "csv")]
#[test]
fn csv_roundtrip_separators_in_values() -> Result<(), TagStoreError> {
    let mut store = setup_empty()?;
    store.load_records(
        vec![
            ExtentRecord::new("PERSON", "P;x=1", "0~5")
                .with_attribute("comment", "unsure; check later")
                .into(),
            ExtentRecord::new("PERSON", "P1", "22~25")
                .with_attribute("comment", "a=b, \"c\"")
                .into(),
            ExtentRecord::new("PLACE", "PL0", "15~20").into(),
            LinkRecord::new("LIVES_IN", "L0")
                .with_argument("from", "P;x=1")
                .with_argument("to", "PL0")
                .into(),
        ],
        LoadMode::Strict,
    )?;
    let csv = store.to_csv_string()?;
    let mut restored = setup_empty()?;
    let report = restored.load_csv_reader(csv.as_bytes(), LoadMode::Strict)?;
    assert!(report.is_complete());
    assert_eq!(
        restored.extent_tag("P;x=1").unwrap().attribute("comment"),
        Some("unsure; check later")
    );
    assert_eq!(
        restored.extent_tag("P1").unwrap().attribute("comment"),
        Some("a=b, \"c\"")
    );
    assert_eq!(
        restored
            .link_tag("L0")
            .unwrap()
            .argument("from")
            .map(|tag| tag.as_str()),
        Some("P;x=1")
    );
    assert_eq!(restored.to_records(), store.to_records());
    Ok(())
}

#[test]
fn json_file_roundtrip() -> Result<(), TagStoreError> {
    let store = setup_example_1()?;
    let filename = std::env::temp_dir().join("tagstore-json-file-roundtrip.json");
    let filename = filename.to_string_lossy();
    store.to_file(&filename)?;
    let restored = AnnotationStore::from_json_file(&filename, setup_registry()?, Config::default())?;
    assert_eq!(restored.to_records(), store.to_records());
    std::fs::remove_file(&*filename).ok();
    Ok(())
}
