//! File and segment security metadata
//!
//! The legacy and current dialects carry incompatible field sets. They are modelled as two
//! separate types wrapped in [`SecurityMetadata`], and the codec for one is never applied to
//! the bytes of the other.

use std::io::{Read, Write};

use bon::Builder;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    dialect::{Dialect, SecurityLayout},
    serde::{error::Error as ParseError, FieldReader, FieldWriter},
    Error,
};

/// Value of the legacy downgrade field announcing that a downgrade event description follows
pub const DOWNGRADE_EVENT_SENTINEL: &str = "999998";

/// Security classification level
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumString, IntoStaticStr, Display,
)]
pub enum Classification {
    /// `U`
    #[default]
    #[strum(serialize = "U")]
    Unclassified,
    /// `R`
    #[strum(serialize = "R")]
    Restricted,
    /// `C`
    #[strum(serialize = "C")]
    Confidential,
    /// `S`
    #[strum(serialize = "S")]
    Secret,
    /// `T`
    #[strum(serialize = "T")]
    TopSecret,
}

/// Security metadata, in the schema of the document's dialect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityMetadata {
    /// NITF 02.00 fields
    Legacy(LegacySecurity),
    /// NITF 02.10 / NSIF 01.00 fields
    Current(CurrentSecurity),
}

/// NITF 02.00 security fields
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct LegacySecurity {
    /// `xSCLAS`
    #[builder(default)]
    pub classification: Classification,
    /// `xSCODE`, 40 characters
    #[builder(default, into)]
    pub codewords: String,
    /// `xSCTLH`, 40 characters
    #[builder(default, into)]
    pub control_and_handling: String,
    /// `xSREL`, 40 characters
    #[builder(default, into)]
    pub releasing_instructions: String,
    /// `xSCAUT`, 20 characters
    #[builder(default, into)]
    pub classification_authority: String,
    /// `xSCTLN`, 20 characters
    #[builder(default, into)]
    pub control_number: String,
    /// `xSDWNG`, 6 characters: blank, a `YYMMDD` date, or [`DOWNGRADE_EVENT_SENTINEL`]
    #[builder(default, into)]
    pub downgrade: String,
    /// `xSDEVT`, 40 characters; present only when [`Self::downgrade`] holds the sentinel
    pub downgrade_event: Option<String>,
}

/// NITF 02.10 / NSIF 01.00 security fields
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct CurrentSecurity {
    /// `xSCLAS`
    #[builder(default)]
    pub classification: Classification,
    /// `xSCLSY`, 2 characters
    #[builder(default, into)]
    pub classification_system: String,
    /// `xSCODE`, 11 characters
    #[builder(default, into)]
    pub codewords: String,
    /// `xSCTLH`, 2 characters
    #[builder(default, into)]
    pub control_and_handling: String,
    /// `xSREL`, 20 characters
    #[builder(default, into)]
    pub releasing_instructions: String,
    /// `xSDCTP`, 2 characters
    #[builder(default, into)]
    pub declassification_type: String,
    /// `xSDCDT`, 8 characters
    #[builder(default, into)]
    pub declassification_date: String,
    /// `xSDCXM`, 4 characters
    #[builder(default, into)]
    pub declassification_exemption: String,
    /// `xSDG`, 1 character
    #[builder(default, into)]
    pub downgrade: String,
    /// `xSDGDT`, 8 characters
    #[builder(default, into)]
    pub downgrade_date: String,
    /// `xSCLTX`, 43 characters
    #[builder(default, into)]
    pub classification_text: String,
    /// `xSCATP`, 1 character
    #[builder(default, into)]
    pub classification_authority_type: String,
    /// `xSCAUT`, 40 characters
    #[builder(default, into)]
    pub classification_authority: String,
    /// `xSCRSN`, 1 character
    #[builder(default, into)]
    pub classification_reason: String,
    /// `xSSRDT`, 8 characters
    #[builder(default, into)]
    pub source_date: String,
    /// `xSCTLN`, 15 characters
    #[builder(default, into)]
    pub control_number: String,
}

impl Default for SecurityMetadata {
    fn default() -> Self {
        Self::Current(CurrentSecurity::default())
    }
}

impl SecurityMetadata {
    /// Unclassified metadata in the schema of `dialect`
    #[must_use]
    pub fn unclassified(dialect: Dialect) -> Self {
        match dialect.layout().security {
            SecurityLayout::Legacy => Self::Legacy(LegacySecurity::default()),
            SecurityLayout::Current => Self::Current(CurrentSecurity::default()),
        }
    }

    /// The classification level, common to both schemas
    #[must_use]
    pub const fn classification(&self) -> Classification {
        match self {
            Self::Legacy(s) => s.classification,
            Self::Current(s) => s.classification,
        }
    }

    /// The schema this value is expressed in
    #[must_use]
    pub const fn layout(&self) -> SecurityLayout {
        match self {
            Self::Legacy(_) => SecurityLayout::Legacy,
            Self::Current(_) => SecurityLayout::Current,
        }
    }

    /// Serialized length in bytes
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        match self {
            Self::Legacy(s) => 167 + if s.has_downgrade_event() { 40 } else { 0 },
            Self::Current(_) => 167,
        }
    }

    pub(crate) fn read<R: Read>(
        r: &mut FieldReader<R>,
        dialect: Dialect,
    ) -> Result<Self, ParseError> {
        match dialect.layout().security {
            SecurityLayout::Legacy => LegacySecurity::read(r).map(Self::Legacy),
            SecurityLayout::Current => CurrentSecurity::read(r).map(Self::Current),
        }
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut FieldWriter<W>,
        dialect: Dialect,
    ) -> Result<(), Error> {
        self.check_dialect(dialect)?;
        match self {
            Self::Legacy(s) => s.write(w),
            Self::Current(s) => s.write(w),
        }
    }

    /// Fails with [`Error::Build`] if this metadata belongs to another dialect's schema
    pub(crate) fn check_dialect(&self, dialect: Dialect) -> Result<(), Error> {
        if self.layout() != dialect.layout().security {
            return Err(Error::Build(format!(
                "{:?} security metadata cannot be written in a {dialect} document",
                self.layout()
            )));
        }
        Ok(())
    }
}

fn read_classification<R: Read>(r: &mut FieldReader<R>) -> Result<Classification, ParseError> {
    let offset = r.offset();
    let value = r.read_raw_string(1, "security classification")?;
    value.parse().map_err(|_| ParseError::InvalidValue {
        offset,
        field: "security classification",
        value,
    })
}

impl LegacySecurity {
    fn has_downgrade_event(&self) -> bool {
        self.downgrade == DOWNGRADE_EVENT_SENTINEL
    }

    fn read<R: Read>(r: &mut FieldReader<R>) -> Result<Self, ParseError> {
        let classification = read_classification(r)?;
        let codewords = r.read_string(40, "security codewords")?;
        let control_and_handling = r.read_string(40, "security control and handling")?;
        let releasing_instructions = r.read_string(40, "security releasing instructions")?;
        let classification_authority = r.read_string(20, "security classification authority")?;
        let control_number = r.read_string(20, "security control number")?;
        let downgrade = r.read_string(6, "security downgrade")?;
        let downgrade_event = if downgrade == DOWNGRADE_EVENT_SENTINEL {
            Some(r.read_string(40, "security downgrade event")?)
        } else {
            None
        };
        Ok(Self {
            classification,
            codewords,
            control_and_handling,
            releasing_instructions,
            classification_authority,
            control_number,
            downgrade,
            downgrade_event,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>) -> Result<(), Error> {
        if !self.has_downgrade_event() && self.downgrade_event.is_some() {
            return Err(Error::Build(format!(
                "downgrade event set but downgrade is {:?}, not {DOWNGRADE_EVENT_SENTINEL:?}",
                self.downgrade
            )));
        }
        w.write_string(self.classification.into(), 1, "security classification")?;
        w.write_string(&self.codewords, 40, "security codewords")?;
        w.write_string(&self.control_and_handling, 40, "security control and handling")?;
        w.write_string(&self.releasing_instructions, 40, "security releasing instructions")?;
        w.write_string(&self.classification_authority, 20, "security classification authority")?;
        w.write_string(&self.control_number, 20, "security control number")?;
        w.write_string(&self.downgrade, 6, "security downgrade")?;
        if self.has_downgrade_event() {
            let event = self.downgrade_event.as_deref().unwrap_or_default();
            w.write_string(event, 40, "security downgrade event")?;
        }
        Ok(())
    }
}

impl CurrentSecurity {
    fn read<R: Read>(r: &mut FieldReader<R>) -> Result<Self, ParseError> {
        Ok(Self {
            classification: read_classification(r)?,
            classification_system: r.read_string(2, "security classification system")?,
            codewords: r.read_string(11, "security codewords")?,
            control_and_handling: r.read_string(2, "security control and handling")?,
            releasing_instructions: r.read_string(20, "security releasing instructions")?,
            declassification_type: r.read_string(2, "security declassification type")?,
            declassification_date: r.read_string(8, "security declassification date")?,
            declassification_exemption: r.read_string(4, "security declassification exemption")?,
            downgrade: r.read_string(1, "security downgrade")?,
            downgrade_date: r.read_string(8, "security downgrade date")?,
            classification_text: r.read_string(43, "security classification text")?,
            classification_authority_type: r
                .read_string(1, "security classification authority type")?,
            classification_authority: r.read_string(40, "security classification authority")?,
            classification_reason: r.read_string(1, "security classification reason")?,
            source_date: r.read_string(8, "security source date")?,
            control_number: r.read_string(15, "security control number")?,
        })
    }

    fn write<W: Write>(&self, w: &mut FieldWriter<W>) -> Result<(), Error> {
        w.write_string(self.classification.into(), 1, "security classification")?;
        w.write_string(&self.classification_system, 2, "security classification system")?;
        w.write_string(&self.codewords, 11, "security codewords")?;
        w.write_string(&self.control_and_handling, 2, "security control and handling")?;
        w.write_string(&self.releasing_instructions, 20, "security releasing instructions")?;
        w.write_string(&self.declassification_type, 2, "security declassification type")?;
        w.write_string(&self.declassification_date, 8, "security declassification date")?;
        w.write_string(
            &self.declassification_exemption,
            4,
            "security declassification exemption",
        )?;
        w.write_string(&self.downgrade, 1, "security downgrade")?;
        w.write_string(&self.downgrade_date, 8, "security downgrade date")?;
        w.write_string(&self.classification_text, 43, "security classification text")?;
        w.write_string(
            &self.classification_authority_type,
            1,
            "security classification authority type",
        )?;
        w.write_string(&self.classification_authority, 40, "security classification authority")?;
        w.write_string(&self.classification_reason, 1, "security classification reason")?;
        w.write_string(&self.source_date, 8, "security source date")?;
        w.write_string(&self.control_number, 15, "security control number")
    }
}
