use std::borrow::Cow;

use nom::{bytes::complete::take, sequence::pair, IResult};
use thiserror::Error as ThisError;
use tracing::{debug, instrument, trace, warn};

use super::{
    descriptor::{FieldKind, FieldSpec, Width},
    field_value, registry, Tre, TreContent, TreEntry, TreGroup, TreSource, TreValue,
};
use crate::{
    serde::{
        error::Error as ParseError,
        utils::{latin1_to_string, parse_uint_field, string_to_latin1},
        FieldWriter,
    },
    Error,
};

const TAG_WIDTH: usize = 6;
const LENGTH_WIDTH: usize = 5;

/// Why a payload did not match its descriptor. Never surfaced: the TRE becomes opaque.
#[derive(ThisError, Debug)]
enum DecodeError {
    #[error("{field} needs {wanted} bytes, {remaining} left")]
    Truncated {
        field: &'static str,
        wanted: usize,
        remaining: usize,
    },
    #[error("{0} bytes left after the last field")]
    TrailingBytes(usize),
    #[error("no earlier field named {0}")]
    UnresolvedName(&'static str),
    #[error("{field} holds {value:?}, not a count")]
    BadCount { field: &'static str, value: String },
}

/// Names visible while walking a descriptor: the current group, then each enclosing one
#[derive(Clone, Copy)]
struct Scope<'a> {
    entries: &'a [TreEntry],
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<&'a str> {
        field_value(self.entries, name).or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

fn resolve<'a>(scope: &Scope<'a>, name: &'static str) -> Result<&'a str, DecodeError> {
    scope.lookup(name).ok_or(DecodeError::UnresolvedName(name))
}

fn resolve_count(scope: &Scope<'_>, name: &'static str) -> Result<usize, DecodeError> {
    let value = resolve(scope, name)?;
    parse_uint_field(value.as_bytes())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| DecodeError::BadCount {
            field: name,
            value: value.to_owned(),
        })
}

fn tre_header(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    pair(take(TAG_WIDTH), take(LENGTH_WIDTH))(input)
}

/// Splits an extension block into its TREs
///
/// A block that ends inside a TRE header or payload is malformed and fails the parse. With
/// `decode` unset every TRE is kept opaque.
pub(crate) fn read_tres(
    bytes: &[u8],
    source: TreSource,
    decode: bool,
    base_offset: u64,
) -> Result<Vec<Tre>, ParseError> {
    let mut tres = Vec::new();
    let mut input = bytes;
    while !input.is_empty() {
        let offset = base_offset + (bytes.len() - input.len()) as u64;
        let Ok((rest, (tag, length))) = tre_header(input) else {
            return Err(ParseError::UnexpectedEof {
                offset,
                field: "TRE header",
                wanted: TAG_WIDTH + LENGTH_WIDTH,
            });
        };
        let tag = latin1_to_string(tag);
        let length = parse_uint_field(length)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ParseError::InvalidNumber {
                offset: offset + TAG_WIDTH as u64,
                field: "TRE length",
                value: latin1_to_string(length),
            })?;
        let take_payload: IResult<&[u8], &[u8]> = take(length)(rest);
        let Ok((rest, payload)) = take_payload else {
            return Err(ParseError::UnexpectedEof {
                offset: offset + (TAG_WIDTH + LENGTH_WIDTH) as u64,
                field: "TRE payload",
                wanted: length,
            });
        };
        trace!("TRE {tag} at byte {offset}, {length} bytes");
        tres.push(if decode {
            decode_tre(&tag, source, payload)
        } else {
            Tre::opaque(tag, source, payload.to_vec())
        });
        input = rest;
    }
    Ok(tres)
}

/// Interprets a TRE payload through the descriptor registered for `tag`
///
/// Never fails: an unregistered tag, or a payload that does not consume exactly its
/// length under the descriptor, yields an opaque [`Tre`] holding `payload` unchanged.
#[instrument(level = "trace", skip(payload))]
pub fn decode_tre(tag: &str, source: TreSource, payload: &[u8]) -> Tre {
    let Some(descriptor) = registry::lookup(tag) else {
        debug!("no descriptor for {tag}, keeping {} bytes opaque", payload.len());
        return Tre::opaque(tag, source, payload.to_vec());
    };
    let mut input = payload;
    let mut entries = Vec::new();
    let decoded = decode_specs(descriptor.fields, &mut input, &mut entries, None).and_then(|()| {
        if input.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(input.len()))
        }
    });
    match decoded {
        Ok(()) => Tre::with_entries(tag.to_owned(), source, entries),
        Err(e) => {
            warn!("{tag} payload does not match its descriptor ({e}), keeping it opaque");
            Tre::opaque(tag, source, payload.to_vec())
        }
    }
}

fn take_field(input: &mut &[u8], field: &'static str, width: usize) -> Result<String, DecodeError> {
    if input.len() < width {
        return Err(DecodeError::Truncated {
            field,
            wanted: width,
            remaining: input.len(),
        });
    }
    let (value, rest) = input.split_at(width);
    *input = rest;
    Ok(latin1_to_string(value))
}

fn decode_specs(
    specs: &[FieldSpec],
    input: &mut &[u8],
    entries: &mut Vec<TreEntry>,
    parent: Option<&Scope<'_>>,
) -> Result<(), DecodeError> {
    for spec in specs {
        match spec {
            FieldSpec::Field { name, width, .. } => {
                let width = match width {
                    Width::Fixed(width) => *width,
                    Width::FromField(field) => resolve_count(
                        &Scope {
                            entries: entries.as_slice(),
                            parent,
                        },
                        *field,
                    )?,
                };
                let value = take_field(input, *name, width)?;
                entries.push(TreEntry::field(*name, value));
            }
            FieldSpec::Conditional { condition, fields } => {
                let scope = Scope {
                    entries: entries.as_slice(),
                    parent,
                };
                let present = condition.holds(resolve(&scope, condition.field())?.trim());
                if present {
                    decode_specs(fields, input, entries, parent)?;
                }
            }
            FieldSpec::Loop {
                name,
                count,
                fields,
            } => {
                let groups = {
                    let scope = Scope {
                        entries: entries.as_slice(),
                        parent,
                    };
                    let count = resolve_count(&scope, *count)?;
                    let mut groups = Vec::with_capacity(count.min(input.len()));
                    for _ in 0..count {
                        let mut group = Vec::new();
                        decode_specs(fields, input, &mut group, Some(&scope))?;
                        groups.push(TreGroup::new(group));
                    }
                    groups
                };
                entries.push(TreEntry::groups_of(*name, groups));
            }
        }
    }
    Ok(())
}

/// Serializes a TRE as `tag + length + payload`
///
/// Opaque TREs emit their stored payload unchanged. Decoded TREs are laid out by their
/// descriptor; short values are padded by field kind.
///
/// # Errors
///
/// - [`Error::FormatConstraint`] if the tag is not 6 characters, a value is longer than its
///   field, or the payload exceeds 99999 bytes
/// - [`Error::Build`] if the tag has no descriptor, the entries do not follow the descriptor,
///   or a repeat count differs from the number of groups
pub fn encode_tre(tre: &Tre) -> Result<Vec<u8>, Error> {
    let payload = encode_payload(tre)?;
    if tre.tag().chars().count() != TAG_WIDTH {
        return Err(Error::FormatConstraint {
            field: "TRE tag".to_owned(),
            reason: format!("{:?} is not {TAG_WIDTH} characters", tre.tag()),
        });
    }
    let mut w = FieldWriter::new(Vec::with_capacity(TAG_WIDTH + LENGTH_WIDTH + payload.len()));
    w.write_string(tre.tag(), TAG_WIDTH, "TRE tag")?;
    w.write_uint(payload.len() as u64, LENGTH_WIDTH, "TRE length")?;
    w.write_bytes(&payload)?;
    Ok(w.into_inner())
}

/// The payload as it is written, without tag and length
pub(crate) fn encode_payload(tre: &Tre) -> Result<Cow<'_, [u8]>, Error> {
    match tre.content() {
        TreContent::Opaque(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
        TreContent::Entries(entries) => {
            let descriptor = registry::lookup(tre.tag()).ok_or_else(|| {
                Error::Build(format!(
                    "TRE {} has decoded entries but no registered descriptor",
                    tre.tag()
                ))
            })?;
            let mut payload = Vec::new();
            let mut next = 0;
            encode_specs(descriptor.fields, entries, &mut next, None, &mut payload)?;
            ensure_consumed(entries, next, tre.tag())?;
            Ok(Cow::Owned(payload))
        }
    }
}

fn ensure_consumed(entries: &[TreEntry], next: usize, owner: &str) -> Result<(), Error> {
    match entries.get(next) {
        Some(extra) => Err(Error::Build(format!(
            "{owner}: entry {} does not belong at this position",
            extra.name()
        ))),
        None => Ok(()),
    }
}

fn scope_error(e: DecodeError) -> Error {
    Error::Build(e.to_string())
}

fn encode_specs(
    specs: &[FieldSpec],
    entries: &[TreEntry],
    next: &mut usize,
    parent: Option<&Scope<'_>>,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    for spec in specs {
        match spec {
            FieldSpec::Field { name, width, kind } => {
                let entry = expect_entry(entries, *next, *name)?;
                let TreValue::Field(value) = entry.value() else {
                    return Err(Error::Build(format!("{name} must be a scalar entry")));
                };
                let width = match width {
                    Width::Fixed(width) => *width,
                    Width::FromField(field) => resolve_count(
                        &Scope {
                            entries: &entries[..*next],
                            parent,
                        },
                        *field,
                    )
                    .map_err(scope_error)?,
                };
                out.extend(pad_value(value, width, *kind, name)?);
                *next += 1;
            }
            FieldSpec::Conditional { condition, fields } => {
                let scope = Scope {
                    entries: &entries[..*next],
                    parent,
                };
                let value = resolve(&scope, condition.field()).map_err(scope_error)?;
                if condition.holds(value.trim()) {
                    encode_specs(fields, entries, next, parent, out)?;
                }
            }
            FieldSpec::Loop {
                name,
                count,
                fields,
            } => {
                let entry = expect_entry(entries, *next, *name)?;
                let Some(groups) = entry.groups() else {
                    return Err(Error::Build(format!("{name} must be a repeating entry")));
                };
                let scope = Scope {
                    entries: &entries[..*next],
                    parent,
                };
                let declared = resolve_count(&scope, *count).map_err(scope_error)?;
                if declared != groups.len() {
                    return Err(Error::Build(format!(
                        "{count} is {declared} but {name} holds {} groups",
                        groups.len()
                    )));
                }
                for group in groups {
                    let mut group_next = 0;
                    encode_specs(fields, group.entries(), &mut group_next, Some(&scope), out)?;
                    ensure_consumed(group.entries(), group_next, name)?;
                }
                *next += 1;
            }
        }
    }
    Ok(())
}

fn expect_entry<'a>(
    entries: &'a [TreEntry],
    index: usize,
    name: &'static str,
) -> Result<&'a TreEntry, Error> {
    match entries.get(index) {
        Some(entry) if entry.name() == name => Ok(entry),
        Some(entry) => Err(Error::Build(format!(
            "expected entry {name}, found {}",
            entry.name()
        ))),
        None => Err(Error::Build(format!("missing entry {name}"))),
    }
}

/// Pads `value` to `width` bytes: text on the right with spaces, integers on the left with
/// zeros (after any sign), reals on the left with spaces
fn pad_value(value: &str, width: usize, kind: FieldKind, name: &str) -> Result<Vec<u8>, Error> {
    let constraint = |reason: String| Error::FormatConstraint {
        field: name.to_owned(),
        reason,
    };
    let bytes = string_to_latin1(value)
        .ok_or_else(|| constraint(format!("{value:?} is not ISO-8859-1 text")))?;
    if bytes.len() > width {
        return Err(constraint(format!(
            "{value:?} is longer than {width} characters"
        )));
    }
    let fill = width - bytes.len();
    let mut padded = Vec::with_capacity(width);
    match kind {
        FieldKind::Text => {
            padded.extend(&bytes);
            padded.resize(width, b' ');
        }
        FieldKind::Real => {
            padded.resize(fill, b' ');
            padded.extend(&bytes);
        }
        FieldKind::Integer => {
            let (sign, digits) = match bytes.split_first() {
                Some((&s, rest)) if s == b'-' || s == b'+' => (Some(s), rest),
                _ => (None, bytes.as_slice()),
            };
            padded.extend(sign);
            padded.resize(padded.len() + fill, b'0');
            padded.extend(digits);
        }
    }
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tre::TreCollection;

    const CCLSTA_PAYLOAD: &[u8] =
        b"014ISO3166-1:2013040ISO 3166 Maintenance Agency (ISO3166/MA)A525D54C-1858-4BC0-A5F2-57BB92F947E7000";

    fn country_codes() -> Tre {
        let mut tre = Tre::new("CCLSTA", TreSource::ExtendedHeaderData);
        for (name, value) in [
            ("CC_STD_LEN", "14"),
            ("CC_STD", "ISO3166-1:2013"),
            ("CC_ORG_LEN", "40"),
            ("CC_ORG", "ISO 3166 Maintenance Agency (ISO3166/MA)"),
            ("CC_UUID", "A525D54C-1858-4BC0-A5F2-57BB92F947E7"),
            ("NUM_SUPPLEMENTAL_IDENTIFIERS", "0"),
        ] {
            tre.add_entry(TreEntry::field(name, value)).unwrap();
        }
        tre.add_entry(TreEntry::groups_of("SUPPLEMENTAL_IDENTIFIERS", Vec::new()))
            .unwrap();
        tre
    }

    #[test]
    fn decodes_country_code_list() {
        let tre = decode_tre("CCLSTA", TreSource::ExtendedHeaderData, CCLSTA_PAYLOAD);
        assert!(!tre.is_opaque());
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
        assert_eq!(tre.groups("SUPPLEMENTAL_IDENTIFIERS"), Some(&[][..]));
    }

    #[test]
    fn encodes_built_tre_with_padding() {
        let encoded = encode_tre(&country_codes()).unwrap();
        assert_eq!(&encoded[..11], b"CCLSTA00099");
        assert_eq!(&encoded[11..], CCLSTA_PAYLOAD);
    }

    #[test]
    fn country_code_list_declared_one_byte_short() {
        let mut block = b"CCLSTA00098".to_vec();
        block.extend(CCLSTA_PAYLOAD);
        assert_eq!(block.len(), 11 + 99);

        let tres = read_tres(&block[..11 + 98], TreSource::ExtendedHeaderData, true, 0).unwrap();
        assert!(tres[0].is_opaque());
        assert_eq!(tres[0].raw_payload(), Some(&CCLSTA_PAYLOAD[..98]));
        assert_eq!(encode_tre(&tres[0]).unwrap(), block[..11 + 98]);

        // the 99th payload byte is read as the start of a second TRE header
        let err = read_tres(&block, TreSource::ExtendedHeaderData, true, 0).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { offset: 109, .. }));
    }

    #[test]
    fn built_and_read_values_compare_by_wire_form() {
        let read = decode_tre("CCLSTA", TreSource::ExtendedHeaderData, CCLSTA_PAYLOAD);
        let built = country_codes();
        assert_eq!(read.field_value("CC_STD_LEN"), Some("014"));
        assert_eq!(built.field_value("CC_STD_LEN"), Some("14"));
        assert_eq!(built, read);

        let mut relocated = built.clone();
        relocated.source = TreSource::UserDefinedHeaderData;
        assert_ne!(relocated, read);

        let mut edited = built;
        if let Some(entry) = edited.entry_mut("CC_UUID") {
            *entry.value_mut() = TreValue::Field("different".to_owned());
        }
        assert_ne!(edited, read);
    }

    #[test]
    fn collections_compare_per_attachment_point() {
        let header = |tag: &str| Tre::opaque(tag, TreSource::UserDefinedHeaderData, b"h".to_vec());
        let extended = |tag: &str| Tre::opaque(tag, TreSource::ExtendedHeaderData, b"x".to_vec());

        let mut built = TreCollection::new();
        built.add(extended("XXXXXA"));
        built.add(header("HHHHHA"));
        built.add(extended("XXXXXB"));
        let mut read = TreCollection::new();
        read.add(header("HHHHHA"));
        read.add(extended("XXXXXA"));
        read.add(extended("XXXXXB"));
        assert_eq!(built, read);

        let mut swapped = TreCollection::new();
        swapped.add(header("HHHHHA"));
        swapped.add(extended("XXXXXB"));
        swapped.add(extended("XXXXXA"));
        assert_ne!(built, swapped);
    }

    #[test]
    fn repeat_count_drives_groups() {
        let payload = b"003ABC002OR0123456789ABCDEF0123456789ABCDEF0123002004ISO1003XY1";
        let mut tre = decode_tre("CCLSTA", TreSource::ExtendedHeaderData, payload);
        let groups = tre.groups("SUPPLEMENTAL_IDENTIFIERS").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].field_value("SUPP_ID"), Some("ISO1"));
        assert_eq!(groups[1].field_value("SUPP_ID"), Some("XY1"));
        assert_eq!(encode_tre(&tre).unwrap()[11..], payload[..]);

        if let Some(entry) = tre.entry_mut("NUM_SUPPLEMENTAL_IDENTIFIERS") {
            *entry.value_mut() = TreValue::Field("3".to_owned());
        }
        if let Some(TreValue::Groups(groups)) = tre
            .entry_mut("SUPPLEMENTAL_IDENTIFIERS")
            .map(TreEntry::value_mut)
        {
            groups.push(TreGroup::new(vec![
                TreEntry::field("SUPP_ID_LEN", "2"),
                TreEntry::field("SUPP_ID", "ZZ"),
            ]));
        }
        let encoded = encode_tre(&tre).unwrap();
        assert_eq!(&encoded[6..11], format!("{:05}", payload.len() + 5).as_bytes());
    }

    #[test]
    fn unknown_tag_stays_opaque_and_verbatim() {
        let block = b"XYZZYA00005 a b ";
        let tres = read_tres(&block[..], TreSource::UserDefinedHeaderData, true, 100).unwrap();
        assert!(tres[0].is_opaque());
        assert_eq!(tres[0].raw_payload(), Some(&b" a b "[..]));
        assert_eq!(encode_tre(&tres[0]).unwrap(), block);
    }

    #[test]
    fn truncated_block_reports_offset() {
        let err = read_tres(b"XYZZYA00009abc", TreSource::ExtendedHeaderData, true, 400)
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedEof {
                offset: 411,
                wanted: 9,
                ..
            }
        ));
        let err = read_tres(b"XYZ", TreSource::ExtendedHeaderData, true, 7).unwrap_err();
        assert_eq!(err.offset(), 7);
    }

    #[test]
    fn rejects_mismatched_counts_and_long_values() {
        let mut tre = country_codes();
        if let Some(entry) = tre.entry_mut("NUM_SUPPLEMENTAL_IDENTIFIERS") {
            *entry.value_mut() = TreValue::Field("001".to_owned());
        }
        assert!(matches!(encode_tre(&tre), Err(Error::Build(_))));

        let mut tre = country_codes();
        if let Some(entry) = tre.entry_mut("CC_UUID") {
            *entry.value_mut() = TreValue::Field("X".repeat(37));
        }
        assert!(matches!(encode_tre(&tre), Err(Error::FormatConstraint { .. })));
    }

    #[test]
    fn pads_by_field_kind() {
        assert_eq!(pad_value("7", 3, FieldKind::Integer, "N").unwrap(), b"007");
        assert_eq!(pad_value("-7", 4, FieldKind::Integer, "N").unwrap(), b"-007");
        assert_eq!(pad_value("1.5", 5, FieldKind::Real, "R").unwrap(), b"  1.5");
        assert_eq!(pad_value("AB", 4, FieldKind::Text, "T").unwrap(), b"AB  ");
    }
}
