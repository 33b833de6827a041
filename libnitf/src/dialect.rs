use strum::{Display, IntoStaticStr};

/// The three mutually incompatible layouts of the container format
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Dialect {
    /// NITF 02.00 (MIL-STD-2500A)
    #[strum(serialize = "NITF 02.00")]
    Nitf20,
    /// NITF 02.10 (MIL-STD-2500C)
    #[default]
    #[strum(serialize = "NITF 02.10")]
    Nitf21,
    /// NSIF 01.00 (STANAG 4545), field-compatible with NITF 02.10
    #[strum(serialize = "NSIF 01.00")]
    Nsif10,
}

/// Which of the two security field schemas a dialect uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLayout {
    /// NITF 02.00 widths
    Legacy,
    /// NITF 02.10 / NSIF 01.00 widths
    Current,
}

/// Kinds of segments that can follow the file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum SegmentKind {
    /// Image segment (`IM`)
    Image,
    /// Graphic segment (`SY`, current dialects)
    Graphic,
    /// Symbol segment (`SY`, legacy dialect)
    Symbol,
    /// Label segment (`LA`, legacy dialect)
    Label,
    /// Text segment (`TE`)
    Text,
    /// Data extension segment (`DE`)
    DataExtension,
    /// Reserved extension segment (`RE`)
    ReservedExtension,
}

impl SegmentKind {
    /// Two-character marker opening the segment's subheader
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Image => "IM",
            Self::Graphic | Self::Symbol => "SY",
            Self::Label => "LA",
            Self::Text => "TE",
            Self::DataExtension => "DE",
            Self::ReservedExtension => "RE",
        }
    }

    /// Widths of the subheader-length and data-length fields in the file header
    #[must_use]
    pub const fn length_field_widths(self) -> (usize, usize) {
        match self {
            Self::Image => (6, 10),
            Self::Graphic | Self::Symbol => (4, 6),
            Self::Label => (4, 3),
            Self::Text => (4, 5),
            Self::DataExtension => (4, 9),
            Self::ReservedExtension => (4, 7),
        }
    }
}

/// Field-width table of a dialect, selected once per document
#[derive(Debug)]
pub struct Layout {
    /// Security field schema
    pub security: SecurityLayout,
    /// The segment kind counted in each of the six count slots of the file header
    /// (`NUMI`, `NUMS`, `NUMX`/`NUML`, `NUMT`, `NUMDES`, `NUMRES`). [`None`] marks the
    /// reserved `NUMX` slot, which is always zero.
    pub header_slots: [Option<SegmentKind>; 6],
    /// Width of `ONAME`
    pub originator_name_width: usize,
    /// Width of `TEXTID`
    pub text_identifier_width: usize,
    /// `FBKGC` is present
    pub has_background_color: bool,
    /// `TXTALVL` is present
    pub has_text_attachment_level: bool,
    /// `XBANDS` is available for more than nine bands
    pub has_extended_band_count: bool,
    /// chrono format of the 14-character date/time fields
    pub date_time_format: &'static str,
    /// `DESID` values marking a TRE overflow DES
    pub overflow_des_ids: &'static [&'static str],
    /// Fixed part of the file header length, excluding security fields
    pub header_fixed_length: u64,
}

static LEGACY: Layout = Layout {
    security: SecurityLayout::Legacy,
    header_slots: [
        Some(SegmentKind::Image),
        Some(SegmentKind::Symbol),
        Some(SegmentKind::Label),
        Some(SegmentKind::Text),
        Some(SegmentKind::DataExtension),
        Some(SegmentKind::ReservedExtension),
    ],
    originator_name_width: 27,
    text_identifier_width: 10,
    has_background_color: false,
    has_text_attachment_level: false,
    has_extended_band_count: false,
    date_time_format: "%d%H%M%SZ%b%y",
    overflow_des_ids: &["Registered Extensions", "Controlled Extensions"],
    header_fixed_length: 221,
};

static CURRENT: Layout = Layout {
    security: SecurityLayout::Current,
    header_slots: [
        Some(SegmentKind::Image),
        Some(SegmentKind::Graphic),
        None,
        Some(SegmentKind::Text),
        Some(SegmentKind::DataExtension),
        Some(SegmentKind::ReservedExtension),
    ],
    originator_name_width: 24,
    text_identifier_width: 7,
    has_background_color: true,
    has_text_attachment_level: true,
    has_extended_band_count: true,
    date_time_format: "%Y%m%d%H%M%S",
    overflow_des_ids: &["TRE_OVERFLOW"],
    header_fixed_length: 221,
};

impl Dialect {
    /// File profile name (`FHDR`)
    #[must_use]
    pub const fn profile(self) -> &'static str {
        match self {
            Self::Nitf20 | Self::Nitf21 => "NITF",
            Self::Nsif10 => "NSIF",
        }
    }

    /// File version (`FVER`)
    #[must_use]
    pub const fn version(self) -> &'static str {
        match self {
            Self::Nitf20 => "02.00",
            Self::Nitf21 => "02.10",
            Self::Nsif10 => "01.00",
        }
    }

    /// Identifies the dialect from the `FHDR` and `FVER` fields
    #[must_use]
    pub fn from_markers(profile: &str, version: &str) -> Option<Self> {
        [Self::Nitf20, Self::Nitf21, Self::Nsif10]
            .into_iter()
            .find(|d| d.profile() == profile && d.version() == version)
    }

    /// Returns `true` for NITF 02.00
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Nitf20)
    }

    /// The field-width table for this dialect
    #[must_use]
    pub fn layout(self) -> &'static Layout {
        match self {
            Self::Nitf20 => &LEGACY,
            Self::Nitf21 | Self::Nsif10 => &CURRENT,
        }
    }

    /// Returns `true` if `kind` can appear in documents of this dialect
    #[must_use]
    pub fn supports(self, kind: SegmentKind) -> bool {
        self.layout().header_slots.contains(&Some(kind))
    }
}
