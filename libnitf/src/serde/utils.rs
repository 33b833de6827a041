use nom::{
    bytes::complete::tag,
    character::complete::{digit1, space0},
    combinator::{all_consuming, map_opt, opt},
    number::complete::double,
    sequence::delimited,
    IResult,
};

/// Parses a run of ASCII digits into a `u64`, failing on overflow
pub fn decimal(input: &[u8]) -> IResult<&[u8], u64> {
    map_opt(digit1, |digits: &[u8]| {
        digits.iter().try_fold(0u64, |acc, d| {
            acc.checked_mul(10)?.checked_add(u64::from(d - b'0'))
        })
    })(input)
}

pub fn signed_decimal(input: &[u8]) -> IResult<&[u8], i64> {
    let (input, sign) = opt(nom::branch::alt((tag(&b"-"[..]), tag(&b"+"[..]))))(input)?;
    let (input, magnitude) = map_opt(decimal, |m| i64::try_from(m).ok())(input)?;
    let value = if sign == Some(&b"-"[..]) {
        -magnitude
    } else {
        magnitude
    };
    Ok((input, value))
}

/// Parses a whole fixed-width field as an unsigned number
///
/// Surrounding spaces are tolerated since some writers space-pad numeric fields.
pub fn parse_uint_field(field: &[u8]) -> Option<u64> {
    all_consuming(delimited(space0, decimal, space0))(field)
        .ok()
        .map(|(_, value)| value)
}

pub fn parse_int_field(field: &[u8]) -> Option<i64> {
    all_consuming(delimited(space0, signed_decimal, space0))(field)
        .ok()
        .map(|(_, value)| value)
}

pub fn parse_real_field(field: &str) -> Option<f64> {
    let parsed: IResult<&str, f64> = all_consuming(delimited(space0, double, space0))(field);
    parsed.ok().map(|(_, value)| value)
}

/// Splits a fixed-width `RRRRRCCCCC` style field into its two signed halves
pub fn parse_int_pair_field(field: &[u8]) -> Option<(i64, i64)> {
    let (first, second) = field.split_at(field.len() / 2);
    Some((parse_int_field(first)?, parse_int_field(second)?))
}

/// Decodes bytes as ISO-8859-1, which maps every byte onto a char and back without loss
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encodes chars as ISO-8859-1, returning [`None`] for chars outside that range
pub fn string_to_latin1(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_padded_fields() {
        assert_eq!(parse_uint_field(b"00098"), Some(98));
        assert_eq!(parse_uint_field(b"  12"), Some(12));
        assert_eq!(parse_uint_field(b"     "), None);
        assert_eq!(parse_uint_field(b"12a"), None);
    }

    #[test]
    fn parses_signed_fields() {
        assert_eq!(parse_int_field(b"-0010"), Some(-10));
        assert_eq!(parse_int_field(b"00010"), Some(10));
        assert_eq!(parse_int_pair_field(b"-000100020"), Some((-1, 20)));
    }

    #[test]
    fn rejects_overflowing_numbers() {
        assert_eq!(parse_uint_field(b"99999999999999999999999"), None);
    }

    #[test]
    fn latin1_is_lossless() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = latin1_to_string(&bytes);
        assert_eq!(string_to_latin1(&text), Some(bytes));
        assert_eq!(string_to_latin1("\u{263A}"), None);
    }
}
