#[cfg(test)]
use crate::*;

#[cfg(test)]
use crate::index::{CharacterIndex, DocumentText};

#[test]
fn span_parse_single() -> Result<(), TagStoreError> {
    let span = Span::parse("5~8")?;
    assert_eq!(span.ranges().len(), 1);
    assert_eq!(span.begin(), Some(5));
    assert_eq!(span.end(), Some(8));
    assert_eq!(span.len(), 3);
    Ok(())
}

#[test]
fn span_parse_discontinuous() -> Result<(), TagStoreError> {
    let span = Span::parse("5~8,10~12")?;
    assert_eq!(span.ranges().len(), 2);
    assert_eq!(span.format(), "5~8,10~12");
    assert!(span.contains(6));
    assert!(!span.contains(8));
    assert!(!span.contains(9));
    assert!(span.contains(11));
    assert_eq!(span.offsets().collect::<Vec<_>>(), vec![5, 6, 7, 10, 11]);
    Ok(())
}

#[test]
fn span_parse_normalizes() -> Result<(), TagStoreError> {
    let span = Span::parse(" 10~12 , 5~8, 6~9 ")?;
    assert_eq!(span.format(), "5~9,10~12");
    Ok(())
}

#[test]
fn span_parse_nonconsuming() -> Result<(), TagStoreError> {
    let span = Span::parse(NONCONSUMING_SPAN)?;
    assert!(span.is_nonconsuming());
    assert_eq!(span.begin(), None);
    assert_eq!(span.len(), 0);
    assert_eq!(span.offsets().count(), 0);
    assert_eq!(span.to_string(), "-1~-1");
    Ok(())
}

#[test]
fn span_parse_errors() {
    for text in [
        "", "5", "a~8", "5~b", "8~5", "5~5", "-2~3", "-1~-1,3~4", "5~8,", "5~8;10~12",
    ] {
        assert!(
            matches!(Span::parse(text), Err(TagStoreError::MalformedSpan(..))),
            "expected {:?} to be rejected",
            text
        );
    }
}

#[test]
fn span_format_parse_inverse() -> Result<(), TagStoreError> {
    let span = Span::merge([(10, 12), (5, 8), (20, 21)])?;
    assert_eq!(Span::parse(&span.format())?, span);
    let span = Span::nonconsuming();
    assert_eq!(Span::parse(&span.format())?, span);
    Ok(())
}

#[test]
fn span_merge_overlap() -> Result<(), TagStoreError> {
    let span = Span::merge([(0, 5), (3, 8)])?;
    assert_eq!(span.format(), "0~8");
    Ok(())
}

#[test]
fn span_merge_contained() -> Result<(), TagStoreError> {
    let span = Span::merge([(0, 10), (2, 4), (3, 5)])?;
    assert_eq!(span.format(), "0~10");
    Ok(())
}

#[test]
fn span_merge_touching() -> Result<(), TagStoreError> {
    // touching ranges coalesce
    let span = Span::merge([(3, 5), (0, 3)])?;
    assert_eq!(span.format(), "0~5");
    Ok(())
}

#[test]
fn span_merge_gap() -> Result<(), TagStoreError> {
    let span = Span::merge([(4, 5), (0, 3)])?;
    assert_eq!(span.format(), "0~3,4~5");
    Ok(())
}

#[test]
fn span_merge_idempotent() -> Result<(), TagStoreError> {
    let once = Span::merge([(7, 9), (0, 2), (1, 4), (9, 10)])?;
    let twice = Span::merge(once.raw_ranges())?;
    assert_eq!(once, twice);
    assert_eq!(once.format(), "0~4,7~10");
    Ok(())
}

#[test]
fn span_merge_errors() {
    assert!(matches!(
        Span::merge(Vec::<(usize, usize)>::new()),
        Err(TagStoreError::MalformedSpan(..))
    ));
    assert!(matches!(
        Span::merge([(0, 3), (5, 5)]),
        Err(TagStoreError::MalformedSpan(..))
    ));
    assert!(matches!(
        Span::merge([(6, 2)]),
        Err(TagStoreError::MalformedSpan(..))
    ));
}

#[test]
fn span_serde() -> Result<(), TagStoreError> {
    let span = Span::parse("5~8,10~12")?;
    let json = serde_json::to_string(&span).unwrap();
    assert_eq!(json, "\"5~8,10~12\"");
    let parsed: Span = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, span);
    assert!(serde_json::from_str::<Span>("\"8~5\"").is_err());
    Ok(())
}

#[cfg(test)]
fn test_registry() -> Result<TagTypeRegistry, TagStoreError> {
    TagTypeRegistry::new(Config::default())
        .with_tagtype(TagTypeBuilder::extent("PERSON", "P"))?
        .with_tagtype(TagTypeBuilder::extent("PLACE", "PL"))?
        .with_tagtype(
            TagTypeBuilder::link("LIVES_IN", "L")
                .with_argument("from")
                .with_argument("to"),
        )
}

#[test]
fn allocator_sequential() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let mut allocator = IdAllocator::new();
    assert_eq!(allocator.allocate(&person)?, "P0");
    assert_eq!(allocator.allocate(&person)?, "P1");
    assert_eq!(allocator.allocate(&person)?, "P2");
    Ok(())
}

#[test]
fn allocator_per_type() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let place = registry.tagtype("PLACE").unwrap();
    let mut allocator = IdAllocator::new();
    assert_eq!(allocator.allocate(&person)?, "P0");
    assert_eq!(allocator.allocate(&place)?, "PL0");
    assert_eq!(allocator.allocate(&person)?, "P1");
    Ok(())
}

#[test]
fn allocator_skips_reserved() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let mut allocator = IdAllocator::new();
    allocator.reserve(&person, "P0")?;
    allocator.reserve(&person, "P1")?;
    allocator.reserve(&person, "P3")?;
    assert_eq!(allocator.allocate(&person)?, "P2");
    assert_eq!(allocator.allocate(&person)?, "P4");
    Ok(())
}

#[test]
fn allocator_fills_lowest_gap() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let mut allocator = IdAllocator::new();
    for _ in 0..5 {
        allocator.allocate(&person)?;
    }
    allocator.release(&person, "P3");
    allocator.release(&person, "P1");
    assert_eq!(allocator.allocate(&person)?, "P1");
    assert_eq!(allocator.allocate(&person)?, "P3");
    assert_eq!(allocator.allocate(&person)?, "P5");
    Ok(())
}

#[test]
fn allocator_duplicate_reservation() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let mut allocator = IdAllocator::new();
    allocator.reserve(&person, "P7")?;
    assert!(matches!(
        allocator.reserve(&person, "P7"),
        Err(TagStoreError::DuplicateId(..))
    ));
    assert!(allocator.is_reserved(&person, "P7"));
    assert!(!allocator.is_reserved(&person, "P6"));
    Ok(())
}

#[test]
fn allocator_foreign_ids() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let person = registry.tagtype("PERSON").unwrap();
    let mut allocator = IdAllocator::new();
    // not prefix followed by a canonical number, tracked verbatim
    allocator.reserve(&person, "P01")?;
    allocator.reserve(&person, "alice")?;
    assert!(matches!(
        allocator.reserve(&person, "alice"),
        Err(TagStoreError::DuplicateId(..))
    ));
    assert_eq!(allocator.allocate(&person)?, "P0");
    assert_eq!(allocator.allocate(&person)?, "P1");
    Ok(())
}

#[test]
fn allocator_unbound_tagtype() -> Result<(), TagStoreError> {
    let tagtype = TagTypeBuilder::extent("PERSON", "P").build()?;
    let mut allocator = IdAllocator::new();
    assert!(matches!(
        allocator.allocate(&tagtype),
        Err(TagStoreError::UnknownTagType(..))
    ));
    Ok(())
}

#[test]
fn registry_case_insensitive() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    assert_eq!(registry.len(), 3);
    let tagtype = registry.tagtype("person").unwrap();
    assert_eq!(tagtype.name(), "PERSON");
    assert_eq!(tagtype.prefix(), "P");
    assert!(tagtype.is_extent());
    assert_eq!(registry.resolve("Lives_In")?, registry.resolve("LIVES_IN")?);
    assert!(matches!(
        registry.resolve("ORGANIZATION"),
        Err(TagStoreError::UnknownTagType(..))
    ));
    assert_eq!(registry.extent_types().count(), 2);
    assert_eq!(registry.link_types().count(), 1);
    assert_eq!(registry.tagtype_by_prefix("PL").map(|t| t.name().to_string()), Some("PLACE".to_string()));
    Ok(())
}

#[test]
fn registry_rejects_duplicates() -> Result<(), TagStoreError> {
    let mut registry = test_registry()?;
    assert!(matches!(
        registry.add_tagtype(TagTypeBuilder::extent("person", "X")),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert!(matches!(
        registry.add_tagtype(TagTypeBuilder::extent("ORGANIZATION", "PL")),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert_eq!(registry.len(), 3);
    Ok(())
}

#[test]
fn registry_capacity() -> Result<(), TagStoreError> {
    let mut registry = TagTypeRegistry::new(Config::default());
    for i in 0..MAX_TAGTYPES {
        registry.add_tagtype(TagTypeBuilder::extent(format!("TYPE{}", i), format!("T{}_", i)))?;
    }
    assert_eq!(registry.len(), MAX_TAGTYPES);
    assert!(matches!(
        registry.add_tagtype(TagTypeBuilder::extent("OVERFLOW", "O")),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert_eq!(registry.len(), MAX_TAGTYPES);
    assert!(registry.tagtype("OVERFLOW").is_none());
    Ok(())
}

#[test]
fn tagtype_build_errors() {
    assert!(matches!(
        TagTypeBuilder::link("LINK", "L")
            .with_argument("from")
            .with_argument("from")
            .build(),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert!(matches!(
        TagTypeBuilder::extent("SPAN", "S")
            .with_attribute(AttributeSpec::data("a"))
            .with_attribute(AttributeSpec::data("a"))
            .build(),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert!(matches!(
        TagTypeBuilder::extent("SPAN", "").build(),
        Err(TagStoreError::InvalidSchema(..))
    ));
    assert!(matches!(
        TagTypeBuilder::extent("SPAN", "S")
            .with_attribute(AttributeSpec::enumerated("mood", ["happy", "sad"]).with_default("angry"))
            .build(),
        Err(TagStoreError::InvalidSchema(..))
    ));
}

#[test]
fn tagtype_roles() -> Result<(), TagStoreError> {
    let registry = test_registry()?;
    let link = registry.tagtype("LIVES_IN").unwrap();
    assert!(link.is_link());
    assert_eq!(link.arguments(), &["from".to_string(), "to".to_string()]);
    assert_eq!(link.role_index("to"), Some(1));
    assert_eq!(link.role_index("via"), None);
    Ok(())
}

#[test]
fn registry_from_json() -> Result<(), TagStoreError> {
    let json = r#"{
        "tagtypes": [
            { "name": "EVENT", "prefix": "E", "kind": "extent",
              "attributes": [
                { "name": "polarity", "kind": { "Enumerated": ["POS", "NEG"] }, "default": "POS" },
                { "name": "comment" }
              ]
            },
            { "name": "NOTE", "prefix": "N", "kind": "extent", "nonconsuming": true },
            { "name": "BEFORE", "prefix": "B", "kind": "link", "arguments": ["first", "second"] }
        ]
    }"#;
    let registry = TagTypeRegistry::from_json_str(json, Config::default())?;
    assert_eq!(registry.len(), 3);
    let event = registry.tagtype("event").unwrap();
    assert_eq!(event.attributes().len(), 2);
    assert_eq!(event.attribute("polarity").and_then(|a| a.default_value()), Some("POS"));
    assert!(registry.tagtype("NOTE").unwrap().is_nonconsuming());
    assert_eq!(registry.tagtype("BEFORE").unwrap().arguments().len(), 2);
    Ok(())
}

#[test]
fn character_index_insert_remove() -> Result<(), TagStoreError> {
    let mut index = CharacterIndex::default();
    let a = ExtentTagHandle::new(0);
    let b = ExtentTagHandle::new(1);
    index.insert(a, &Span::single(0, 4)?);
    index.insert(b, &Span::parse("2~3,6~8")?);
    assert_eq!(index.at(2), &[a, b]);
    assert_eq!(index.at(3), &[a]);
    assert_eq!(index.at(6), &[b]);
    assert!(index.at(5).is_empty());
    assert_eq!(index.len(), 6);
    index.remove(a, &Span::single(0, 4)?);
    assert_eq!(index.at(2), &[b]);
    assert!(index.at(0).is_empty());
    assert_eq!(index.len(), 3);
    Ok(())
}

#[test]
fn character_index_extend_matches_insert() -> Result<(), TagStoreError> {
    let spans = [
        Span::parse("0~5")?,
        Span::parse("3~4,8~9")?,
        Span::parse("4~10")?,
    ];
    let mut one_by_one = CharacterIndex::default();
    let mut bulk = CharacterIndex::default();
    one_by_one.insert(ExtentTagHandle::new(0), &spans[0]);
    bulk.insert(ExtentTagHandle::new(0), &spans[0]);
    for (i, span) in spans.iter().enumerate().skip(1) {
        one_by_one.insert(ExtentTagHandle::new(i), span);
    }
    bulk.extend(
        spans
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, span)| (ExtentTagHandle::new(i), span)),
    );
    for offset in 0..12 {
        assert_eq!(one_by_one.at(offset), bulk.at(offset), "offset {}", offset);
    }
    Ok(())
}

#[test]
fn document_text_unicode() -> Result<(), TagStoreError> {
    let document = DocumentText::new("Hëllo wörld".to_string());
    assert_eq!(document.textlen(), 11);
    assert_eq!(document.text_of(&Span::single(0, 5)?, " ... ")?, "Hëllo");
    assert_eq!(document.text_of(&Span::parse("0~1,6~11")?, " ... ")?, "H ... wörld");
    assert!(document.validate(&Span::single(6, 11)?).is_ok());
    assert!(matches!(
        document.validate(&Span::single(6, 12)?),
        Err(TagStoreError::OffsetOutOfBounds(..))
    ));
    Ok(())
}

#[test]
fn config_from_json() -> Result<(), TagStoreError> {
    let config = Config::from_json_str(r#"{ "debug": true, "reuse_ids": false, "text_separator": " " }"#)?;
    assert!(config.debug());
    assert!(!config.reuse_ids());
    assert!(config.generate_ids());
    assert_eq!(config.text_separator(), " ");
    Ok(())
}
