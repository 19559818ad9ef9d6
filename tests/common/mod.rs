#![allow(dead_code)]
use std::sync::Arc;
use tagstore::*;

/// The document text used by most tests
pub const EXAMPLE_TEXT: &str = "Alice lives in Paris. Bob lives in Rome.";

pub fn setup_registry() -> Result<Arc<TagTypeRegistry>, TagStoreError> {
    let registry = TagTypeRegistry::new(Config::default())
        .with_tagtype(
            TagTypeBuilder::extent("PERSON", "P")
                .with_attribute(AttributeSpec::enumerated("role", ["agent", "patient"]))
                .with_attribute(AttributeSpec::data("comment"))
                .with_attribute(AttributeSpec::idref("same_as")),
        )?
        .with_tagtype(TagTypeBuilder::extent("PLACE", "PL"))?
        .with_tagtype(
            TagTypeBuilder::extent("NOTE", "N")
                .with_nonconsuming(true)
                .with_attribute(AttributeSpec::idref("about")),
        )?
        .with_tagtype(
            TagTypeBuilder::extent("EVENT", "E")
                .with_attribute(AttributeSpec::data("tense").with_required(true)),
        )?
        .with_tagtype(
            TagTypeBuilder::link("LIVES_IN", "L")
                .with_argument("from")
                .with_argument("to")
                .with_attribute(
                    AttributeSpec::enumerated("certainty", ["high", "low"]).with_default("high"),
                ),
        )?
        .with_tagtype(
            TagTypeBuilder::link("TRIPLE", "T")
                .with_argument("a")
                .with_argument("b")
                .with_argument("c"),
        )?;
    Ok(Arc::new(registry))
}

/// An empty store for the example text
pub fn setup_empty() -> Result<AnnotationStore, TagStoreError> {
    AnnotationStore::new(setup_registry()?, Config::default()).with_text(EXAMPLE_TEXT)
}

/// Two persons living in two places
pub fn setup_example_1() -> Result<AnnotationStore, TagStoreError> {
    let store = setup_empty()?
        .with_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(0, 5)?))?
        .with_extent_tag(ExtentTagBuilder::new("PLACE").with_span(Span::single(15, 20)?))?
        .with_extent_tag(ExtentTagBuilder::new("PERSON").with_span(Span::single(22, 25)?))?
        .with_extent_tag(ExtentTagBuilder::new("PLACE").with_span(Span::single(35, 39)?))?
        .with_link_tag(
            LinkTagBuilder::new("LIVES_IN")
                .with_argument("from", "P0")
                .with_argument("to", "PL0"),
        )?
        .with_link_tag(
            LinkTagBuilder::new("LIVES_IN")
                .with_argument("from", "P1")
                .with_argument("to", "PL1"),
        )?;
    Ok(store)
}

/// Records as a reader of annotation files would produce them for the example text
pub fn example_records() -> Vec<TagRecord> {
    vec![
        ExtentRecord::new("PERSON", "P0", "0~5").into(),
        ExtentRecord::new("PLACE", "PL0", "15~20").into(),
        ExtentRecord::new("PERSON", "P1", "22~25")
            .with_attribute("same_as", "P0")
            .into(),
        ExtentRecord::new("PLACE", "PL1", "35~39").into(),
        LinkRecord::new("LIVES_IN", "L0")
            .with_argument("from", "P0")
            .with_argument("to", "PL0")
            .into(),
        LinkRecord::new("LIVES_IN", "L1")
            .with_argument("from", "P1")
            .with_argument("to", "PL1")
            .with_attribute("certainty", "low")
            .into(),
    ]
}
