//! Static description of a TRE payload layout
//!
//! A descriptor is an ordered list of [`FieldSpec`]s, evaluated by one generic interpreter
//! in both directions. Specs refer to earlier fields by name; a name is looked up in the
//! current group first and then in each enclosing scope.

/// Layout of one registered TRE
#[derive(Debug)]
pub struct TreDescriptor {
    /// 6-character tag
    pub tag: &'static str,
    /// Payload layout, in wire order
    pub fields: &'static [FieldSpec],
}

/// One step of a TRE payload layout
#[derive(Debug)]
pub enum FieldSpec {
    /// A single fixed- or field-driven-width value
    Field {
        /// entry name
        name: &'static str,
        /// byte width
        width: Width,
        /// padding rules used when encoding a short value
        kind: FieldKind,
    },
    /// Fields present only when an earlier field satisfies `condition`
    Conditional {
        /// presence test
        condition: Condition,
        /// fields read when the test holds
        fields: &'static [FieldSpec],
    },
    /// A group repeated as many times as the value of an earlier field
    Loop {
        /// entry name holding the groups
        name: &'static str,
        /// name of the earlier field holding the repeat count
        count: &'static str,
        /// layout of one repetition
        fields: &'static [FieldSpec],
    },
}

/// Byte width of a [`FieldSpec::Field`]
#[derive(Debug, Clone, Copy)]
pub enum Width {
    /// Constant width
    Fixed(usize),
    /// Width given by the numeric value of an earlier field
    FromField(&'static str),
}

/// How a value is padded when it is shorter than its width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Left-justified, space filled
    Text,
    /// Right-justified, zero filled
    Integer,
    /// Right-justified, space filled
    Real,
}

/// Presence test of a [`FieldSpec::Conditional`]
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Earlier field equals the value
    Equals(&'static str, &'static str),
    /// Earlier field differs from the value
    NotEquals(&'static str, &'static str),
}

impl Condition {
    /// Name of the field the condition inspects
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Equals(field, _) | Self::NotEquals(field, _) => field,
        }
    }

    /// Evaluates the condition against the referenced field's value
    #[must_use]
    pub fn holds(&self, value: &str) -> bool {
        match self {
            Self::Equals(_, expected) => value == *expected,
            Self::NotEquals(_, expected) => value != *expected,
        }
    }
}

impl TreDescriptor {
    /// Payload length when every field has a fixed width and no conditional or repeating
    /// parts exist
    #[must_use]
    pub fn fixed_length(&self) -> Option<usize> {
        self.fields.iter().try_fold(0, |acc, spec| match spec {
            FieldSpec::Field {
                width: Width::Fixed(w),
                ..
            } => Some(acc + w),
            _ => None,
        })
    }
}

/// Text field of constant width
macro_rules! text {
    ($name:literal, $width:literal) => {
        $crate::tre::descriptor::FieldSpec::Field {
            name: $name,
            width: $crate::tre::descriptor::Width::Fixed($width),
            kind: $crate::tre::descriptor::FieldKind::Text,
        }
    };
    ($name:literal, sized_by $field:literal) => {
        $crate::tre::descriptor::FieldSpec::Field {
            name: $name,
            width: $crate::tre::descriptor::Width::FromField($field),
            kind: $crate::tre::descriptor::FieldKind::Text,
        }
    };
}

macro_rules! int {
    ($name:literal, $width:literal) => {
        $crate::tre::descriptor::FieldSpec::Field {
            name: $name,
            width: $crate::tre::descriptor::Width::Fixed($width),
            kind: $crate::tre::descriptor::FieldKind::Integer,
        }
    };
}

macro_rules! real {
    ($name:literal, $width:literal) => {
        $crate::tre::descriptor::FieldSpec::Field {
            name: $name,
            width: $crate::tre::descriptor::Width::Fixed($width),
            kind: $crate::tre::descriptor::FieldKind::Real,
        }
    };
}

macro_rules! when {
    ($field:literal == $value:literal, [$($spec:expr),* $(,)?]) => {
        $crate::tre::descriptor::FieldSpec::Conditional {
            condition: $crate::tre::descriptor::Condition::Equals($field, $value),
            fields: &[$($spec),*],
        }
    };
    ($field:literal != $value:literal, [$($spec:expr),* $(,)?]) => {
        $crate::tre::descriptor::FieldSpec::Conditional {
            condition: $crate::tre::descriptor::Condition::NotEquals($field, $value),
            fields: &[$($spec),*],
        }
    };
}

macro_rules! repeat {
    ($name:literal, count = $count:literal, [$($spec:expr),* $(,)?]) => {
        $crate::tre::descriptor::FieldSpec::Loop {
            name: $name,
            count: $count,
            fields: &[$($spec),*],
        }
    };
}

pub(crate) use {int, real, repeat, text, when};
