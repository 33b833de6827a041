mod common;
use common::{sample_document, CCLSTA_PAYLOAD};
use libnitf::{
    tre::{decode_tre, encode_tre, lookup_descriptor, Tre, TreEntry, TreSource, TreValue},
    Dialect, Document, Error,
};

#[test]
fn country_code_list_decodes_by_name() {
    let tre = decode_tre("CCLSTA", TreSource::ExtendedHeaderData, CCLSTA_PAYLOAD);
    assert!(!tre.is_opaque());
    assert_eq!(tre.tag(), "CCLSTA");
    assert_eq!(tre.entries().len(), 7);
    assert_eq!(tre.field_value("CC_STD"), Some("ISO3166-1:2013"));
    assert_eq!(
        tre.field_value("CC_ORG"),
        Some("ISO 3166 Maintenance Agency (ISO3166/MA)")
    );
    assert_eq!(
        tre.field_value("CC_UUID"),
        Some("A525D54C-1858-4BC0-A5F2-57BB92F947E7")
    );
    assert_eq!(tre.int_value("CC_STD_LEN").ok(), Some(14));
    assert!(tre
        .groups("SUPPLEMENTAL_IDENTIFIERS")
        .is_some_and(<[_]>::is_empty));
}

#[test]
fn country_code_list_built_from_scratch() -> anyhow::Result<()> {
    let mut tre = Tre::new("CCLSTA", TreSource::ExtendedHeaderData);
    tre.add_entry(TreEntry::field("CC_STD_LEN", "14"))?;
    tre.add_entry(TreEntry::field("CC_STD", "ISO3166-1:2013"))?;
    tre.add_entry(TreEntry::field("CC_ORG_LEN", "40"))?;
    tre.add_entry(TreEntry::field(
        "CC_ORG",
        "ISO 3166 Maintenance Agency (ISO3166/MA)",
    ))?;
    tre.add_entry(TreEntry::field(
        "CC_UUID",
        "A525D54C-1858-4BC0-A5F2-57BB92F947E7",
    ))?;
    tre.add_entry(TreEntry::field("NUM_SUPPLEMENTAL_IDENTIFIERS", "0"))?;
    tre.add_entry(TreEntry::groups_of("SUPPLEMENTAL_IDENTIFIERS", Vec::new()))?;

    let encoded = encode_tre(&tre)?;
    assert_eq!(&encoded[..6], b"CCLSTA");
    assert_eq!(&encoded[6..11], b"00099");
    assert_eq!(&encoded[11..], CCLSTA_PAYLOAD);
    Ok(())
}

#[test]
fn edited_fields_are_written_back() -> anyhow::Result<()> {
    let mut doc = sample_document(Dialect::Nitf21);
    let image = &mut doc.images_mut()[0];
    let cclsta = image
        .tres
        .iter_mut()
        .find(|tre| tre.tag() == "CCLSTA")
        .expect("sample image carries CCLSTA");
    if let Some(entry) = cclsta.entry_mut("CC_UUID") {
        *entry.value_mut() = TreValue::Field("00000000-0000-0000-0000-000000000000".to_owned());
    }

    let mut bytes = Vec::new();
    doc.write_to(&mut bytes)?;
    let parsed = Document::from_reader(bytes.as_slice())?;
    let cclsta = parsed.images()[0]
        .tres
        .with_tag("CCLSTA")
        .next()
        .expect("CCLSTA survives");
    assert_eq!(
        cclsta.field_value("CC_UUID"),
        Some("00000000-0000-0000-0000-000000000000")
    );
    assert_eq!(cclsta.source(), TreSource::ImageExtendedSubheaderData);
    Ok(())
}

#[test]
fn numeric_fields_are_padded_to_width() -> anyhow::Result<()> {
    let descriptor = lookup_descriptor("BLOCKA").expect("BLOCKA is registered");
    assert_eq!(descriptor.fixed_length(), Some(123));

    let payload = format!("{:<123}", "01");
    let mut tre = decode_tre("BLOCKA", TreSource::ImageExtendedSubheaderData, payload.as_bytes());
    assert!(!tre.is_opaque());
    if let Some(entry) = tre.entry_mut("BLOCK_INSTANCE") {
        *entry.value_mut() = TreValue::Field("7".to_owned());
    }
    let encoded = encode_tre(&tre)?;
    assert_eq!(&encoded[11..13], b"07");
    assert_eq!(encoded.len(), 11 + 123);
    Ok(())
}

#[test]
fn overlong_values_are_refused() {
    let mut tre = decode_tre("CCLSTA", TreSource::ExtendedHeaderData, CCLSTA_PAYLOAD);
    if let Some(entry) = tre.entry_mut("CC_UUID") {
        *entry.value_mut() = TreValue::Field("X".repeat(37));
    }
    assert!(matches!(
        encode_tre(&tre),
        Err(Error::FormatConstraint { .. })
    ));
}

#[test]
fn unknown_tags_stay_opaque() -> anyhow::Result<()> {
    let tre = decode_tre("NOTREG", TreSource::UserDefinedHeaderData, b"anything at all");
    assert!(tre.is_opaque());
    assert_eq!(encode_tre(&tre)?, b"NOTREG00015anything at all");
    Ok(())
}
