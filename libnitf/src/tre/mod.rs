//! Tagged record extensions (TREs)
//!
//! A TRE is a `tag(6) + length(5) + payload` block. Payloads whose tag has a registered
//! [`descriptor::TreDescriptor`] are decoded into named [`TreEntry`] values; everything else
//! (unknown tags, or payloads that do not match their descriptor) is kept as opaque bytes
//! and written back unchanged.

pub(crate) mod codec;
pub mod descriptor;
pub(crate) mod registry;

use itertools::Itertools;
use std::fmt::Display;

use crate::{serde::utils::parse_real_field, Error};

pub use codec::{decode_tre, encode_tre};
pub use registry::{lookup as lookup_descriptor, registered_tags};

/// Where in a file a TRE is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreSource {
    /// File header user-defined header data (`UDHD`)
    UserDefinedHeaderData,
    /// File header extended header data (`XHD`)
    ExtendedHeaderData,
    /// Image subheader user-defined image data (`UDID`)
    UserDefinedImageData,
    /// Image extended subheader data (`IXSHD`)
    ImageExtendedSubheaderData,
    /// Graphic extended subheader data (`SXSHD`)
    GraphicExtendedSubheaderData,
    /// Symbol extended subheader data (`SXSHD`, legacy)
    SymbolExtendedSubheaderData,
    /// Label extended subheader data (`LXSHD`, legacy)
    LabelExtendedSubheaderData,
    /// Text extended subheader data (`TXSHD`)
    TextExtendedSubheaderData,
    /// Data carried by a TRE overflow data extension segment
    TreOverflow,
}

impl TreSource {
    /// The `DESOFLW` code naming this attachment point in an overflow DES
    #[must_use]
    pub const fn overflow_code(self) -> Option<&'static str> {
        match self {
            Self::UserDefinedHeaderData => Some("UDHD"),
            Self::ExtendedHeaderData => Some("XHD"),
            Self::UserDefinedImageData => Some("UDID"),
            Self::ImageExtendedSubheaderData => Some("IXSHD"),
            Self::GraphicExtendedSubheaderData | Self::SymbolExtendedSubheaderData => {
                Some("SXSHD")
            }
            Self::LabelExtendedSubheaderData => Some("LXSHD"),
            Self::TextExtendedSubheaderData => Some("TXSHD"),
            Self::TreOverflow => None,
        }
    }
}

/// A single tagged record extension
///
/// Equality follows the wire form: two TREs are equal when they share tag and attachment
/// point and serialize to the same payload, so a count built as `"14"` equals the `"014"`
/// read back from a file.
#[derive(Debug, Clone)]
pub struct Tre {
    tag: String,
    source: TreSource,
    content: TreContent,
}

/// Content of a [`Tre`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreContent {
    /// Fields decoded through the tag's descriptor
    Entries(Vec<TreEntry>),
    /// Raw payload bytes of a TRE that has no descriptor or failed to decode
    Opaque(Vec<u8>),
}

/// A named value inside a [`Tre`] or [`TreGroup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreEntry {
    name: String,
    value: TreValue,
}

/// Value of a [`TreEntry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreValue {
    /// Scalar field, kept verbatim (no trimming)
    Field(String),
    /// Repetitions of a group
    Groups(Vec<TreGroup>),
}

/// One repetition of a repeating structure
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TreGroup {
    entries: Vec<TreEntry>,
}

fn find_entry<'a>(entries: &'a [TreEntry], name: &str) -> Option<&'a TreEntry> {
    entries.iter().find(|e| e.name == name)
}

fn field_value<'a>(entries: &'a [TreEntry], name: &str) -> Option<&'a str> {
    find_entry(entries, name).and_then(TreEntry::as_str)
}

fn int_value(entries: &[TreEntry], name: &str) -> Result<i64, Error> {
    let raw = field_value(entries, name).ok_or_else(|| missing(name))?;
    raw.trim().parse().map_err(|_| Error::FormatConstraint {
        field: name.to_owned(),
        reason: format!("{raw:?} is not an integer"),
    })
}

fn double_value(entries: &[TreEntry], name: &str) -> Result<f64, Error> {
    let raw = field_value(entries, name).ok_or_else(|| missing(name))?;
    parse_real_field(raw).ok_or_else(|| Error::FormatConstraint {
        field: name.to_owned(),
        reason: format!("{raw:?} is not a real number"),
    })
}

fn missing(name: &str) -> Error {
    Error::FormatConstraint {
        field: name.to_owned(),
        reason: "no scalar entry with this name".to_owned(),
    }
}

impl Tre {
    /// Creates an empty, decodable TRE. Entries are added with [`Self::add_entry`].
    #[must_use]
    pub fn new(tag: impl Into<String>, source: TreSource) -> Self {
        Self {
            tag: tag.into(),
            source,
            content: TreContent::Entries(Vec::new()),
        }
    }

    /// Creates a TRE holding raw payload bytes
    #[must_use]
    pub fn opaque(tag: impl Into<String>, source: TreSource, payload: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            source,
            content: TreContent::Opaque(payload),
        }
    }

    pub(crate) fn with_entries(tag: String, source: TreSource, entries: Vec<TreEntry>) -> Self {
        Self {
            tag,
            source,
            content: TreContent::Entries(entries),
        }
    }

    /// The 6-character tag
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attachment point
    #[must_use]
    pub const fn source(&self) -> TreSource {
        self.source
    }

    #[must_use]
    pub const fn content(&self) -> &TreContent {
        &self.content
    }

    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self.content, TreContent::Opaque(_))
    }

    /// Raw payload of an opaque TRE
    #[must_use]
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match &self.content {
            TreContent::Opaque(bytes) => Some(bytes),
            TreContent::Entries(_) => None,
        }
    }

    /// Decoded entries, empty for an opaque TRE
    #[must_use]
    pub fn entries(&self) -> &[TreEntry] {
        match &self.content {
            TreContent::Entries(entries) => entries,
            TreContent::Opaque(_) => &[],
        }
    }

    /// Appends an entry
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Build`] on an opaque TRE, whose bytes are never re-interpreted.
    pub fn add_entry(&mut self, entry: TreEntry) -> Result<(), Error> {
        match &mut self.content {
            TreContent::Entries(entries) => {
                entries.push(entry);
                Ok(())
            }
            TreContent::Opaque(_) => Err(Error::Build(format!(
                "cannot add entries to opaque TRE {}",
                self.tag
            ))),
        }
    }

    /// Mutable access to a top-level entry
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut TreEntry> {
        match &mut self.content {
            TreContent::Entries(entries) => entries.iter_mut().find(|e| e.name == name),
            TreContent::Opaque(_) => None,
        }
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&TreEntry> {
        find_entry(self.entries(), name)
    }

    /// Verbatim value of a top-level scalar entry
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        field_value(self.entries(), name)
    }

    /// Value of a top-level scalar entry read as an integer
    ///
    /// # Errors
    ///
    /// Fails if the entry is missing or does not hold an integer
    pub fn int_value(&self, name: &str) -> Result<i64, Error> {
        int_value(self.entries(), name)
    }

    /// Value of a top-level scalar entry read as a real number
    ///
    /// # Errors
    ///
    /// Fails if the entry is missing or does not hold a number
    pub fn double_value(&self, name: &str) -> Result<f64, Error> {
        double_value(self.entries(), name)
    }

    /// Groups of a top-level repeating entry
    #[must_use]
    pub fn groups(&self, name: &str) -> Option<&[TreGroup]> {
        self.entry(name).and_then(TreEntry::groups)
    }
}

impl PartialEq for Tre {
    fn eq(&self, other: &Self) -> bool {
        if self.tag != other.tag || self.source != other.source {
            return false;
        }
        match (codec::encode_payload(self), codec::encode_payload(other)) {
            (Ok(ours), Ok(theirs)) => ours == theirs,
            _ => self.content == other.content,
        }
    }
}

impl Eq for Tre {}

impl TreEntry {
    /// A scalar entry
    #[must_use]
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: TreValue::Field(value.into()),
        }
    }

    /// A repeating entry
    #[must_use]
    pub fn groups_of(name: impl Into<String>, groups: Vec<TreGroup>) -> Self {
        Self {
            name: name.into(),
            value: TreValue::Groups(groups),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn value(&self) -> &TreValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut TreValue {
        &mut self.value
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            TreValue::Field(value) => Some(value),
            TreValue::Groups(_) => None,
        }
    }

    #[must_use]
    pub fn groups(&self) -> Option<&[TreGroup]> {
        match &self.value {
            TreValue::Groups(groups) => Some(groups),
            TreValue::Field(_) => None,
        }
    }
}

impl TreGroup {
    #[must_use]
    pub const fn new(entries: Vec<TreEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[TreEntry] {
        &self.entries
    }

    pub fn add_entry(&mut self, entry: TreEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        field_value(&self.entries, name)
    }

    /// # Errors
    ///
    /// Fails if the entry is missing or does not hold an integer
    pub fn int_value(&self, name: &str) -> Result<i64, Error> {
        int_value(&self.entries, name)
    }

    /// # Errors
    ///
    /// Fails if the entry is missing or does not hold a number
    pub fn double_value(&self, name: &str) -> Result<f64, Error> {
        double_value(&self.entries, name)
    }

    #[must_use]
    pub fn groups(&self, name: &str) -> Option<&[TreGroup]> {
        find_entry(&self.entries, name).and_then(TreEntry::groups)
    }
}

impl Display for Tre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.content {
            TreContent::Opaque(bytes) => write!(f, "{} (opaque, {} bytes)", self.tag, bytes.len()),
            TreContent::Entries(entries) => write!(
                f,
                "{} {{{}}}",
                self.tag,
                entries.iter().map(ToString::to_string).join(", ")
            ),
        }
    }
}

impl Display for TreEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            TreValue::Field(value) => write!(f, "{}={value:?}", self.name),
            TreValue::Groups(groups) => write!(
                f,
                "{}=[{}]",
                self.name,
                groups
                    .iter()
                    .map(|g| format!(
                        "{{{}}}",
                        g.entries.iter().map(ToString::to_string).join(", ")
                    ))
                    .join(", ")
            ),
        }
    }
}

/// TREs attached to one header or segment, each keyed by its [`TreSource`]
///
/// Order matters only among TREs of the same attachment point: a file stores each extension
/// block separately, so two collections holding the same TREs per source are equal.
#[derive(Default, Debug, Clone)]
pub struct TreCollection {
    tres: Vec<Tre>,
}

impl TreCollection {
    #[must_use]
    pub const fn new() -> Self {
        Self { tres: Vec::new() }
    }

    pub fn add(&mut self, tre: Tre) {
        self.tres.push(tre);
    }

    pub(crate) fn extend(&mut self, tres: impl IntoIterator<Item = Tre>) {
        self.tres.extend(tres);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tres.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tres.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tre> {
        self.tres.iter()
    }

    /// TREs attached at `source`, in file order
    pub fn from_source(&self, source: TreSource) -> impl Iterator<Item = &Tre> {
        self.tres.iter().filter(move |t| t.source == source)
    }

    /// TREs with the given tag, from any attachment point
    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Tre> {
        self.tres.iter().filter(move |t| t.tag == tag)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tre> {
        self.tres.iter_mut()
    }

    /// Serializes every TRE attached at `source`, back to back
    pub(crate) fn encode(&self, source: TreSource) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        for tre in self.from_source(source) {
            out.extend(encode_tre(tre)?);
        }
        Ok(out)
    }
}

impl PartialEq for TreCollection {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .chain(other.iter())
                .all(|tre| self.from_source(tre.source).eq(other.from_source(tre.source)))
    }
}

impl Eq for TreCollection {}

impl<'a> IntoIterator for &'a TreCollection {
    type Item = &'a Tre;
    type IntoIter = std::slice::Iter<'a, Tre>;

    fn into_iter(self) -> Self::IntoIter {
        self.tres.iter()
    }
}
