//! Format-string field packer.
//!
//! Each character of the format selects the width of one field and consumes
//! exactly one value:
//!
//! | Code | Width | Encoding |
//! |---|---|---|
//! | `b` `B` | 1 | low 8 bits |
//! | `h` `H` | 2 | big-endian, low 16 bits |
//! | `l` `L` `i` `I` | 4 | big-endian, low 32 bits |
//! | `S` | variable | raw UTF-8, no length prefix |
//!
//! Signed and unsigned codes encode identically: the value is truncated to
//! the field width with two's-complement wraparound and no range check.

use sensorlink_types::EncodingError;

// ────────────────────────────────────────────────────────────────────────────
// Values
// ────────────────────────────────────────────────────────────────────────────

/// One value handed to [`pack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackValue {
    Int(i64),
    Str(String),
}

impl PackValue {
    fn kind(&self) -> &'static str {
        match self {
            PackValue::Int(_) => "integer",
            PackValue::Str(_) => "string",
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PackValue {
                fn from(v: $t) -> Self {
                    PackValue::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, u8, i16, u16, i32, u32, i64);

impl From<&str> for PackValue {
    fn from(v: &str) -> Self {
        PackValue::Str(v.to_string())
    }
}

impl From<String> for PackValue {
    fn from(v: String) -> Self {
        PackValue::Str(v)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field codes
// ────────────────────────────────────────────────────────────────────────────

/// A parsed format character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCode {
    Byte,
    Short,
    Long,
    Str,
}

impl FieldCode {
    pub fn from_char(c: char) -> Result<Self, EncodingError> {
        match c {
            'b' | 'B' => Ok(FieldCode::Byte),
            'h' | 'H' => Ok(FieldCode::Short),
            'l' | 'L' | 'i' | 'I' => Ok(FieldCode::Long),
            'S' => Ok(FieldCode::Str),
            other => Err(EncodingError::UnsupportedField(other)),
        }
    }

    /// Encoded width in bytes; `None` for variable-length strings.
    pub fn width(self) -> Option<usize> {
        match self {
            FieldCode::Byte => Some(1),
            FieldCode::Short => Some(2),
            FieldCode::Long => Some(4),
            FieldCode::Str => None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Truncation helpers
// ────────────────────────────────────────────────────────────────────────────

/// Keep the low 8 bits of `v`.
pub fn truncate_u8(v: i64) -> u8 {
    (v & 0xFF) as u8
}

/// Keep the low 16 bits of `v`.
pub fn truncate_u16(v: i64) -> u16 {
    (v & 0xFFFF) as u16
}

/// Keep the low 32 bits of `v`.
pub fn truncate_u32(v: i64) -> u32 {
    (v & 0xFFFF_FFFF) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// pack
// ────────────────────────────────────────────────────────────────────────────

/// Serialise `values` according to `format`.
///
/// # Errors
///
/// * [`EncodingError::UnsupportedField`] – a format character is not a known
///   field code.
/// * [`EncodingError::Underflow`] – the format has more codes than there are
///   values.
/// * [`EncodingError::TypeMismatch`] – a string was given for an integer code
///   or vice versa.
///
/// The whole format is validated before any byte is produced, so an error
/// never leaves partial output behind.
pub fn pack(format: &str, values: &[PackValue]) -> Result<Vec<u8>, EncodingError> {
    let codes = format
        .chars()
        .map(FieldCode::from_char)
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() < codes.len() {
        return Err(EncodingError::Underflow {
            needed: codes.len(),
            available: values.len(),
        });
    }

    let fixed: usize = codes.iter().filter_map(|c| c.width()).sum();
    let mut out = Vec::with_capacity(fixed);

    for (position, ((code, ch), value)) in codes.iter().zip(format.chars()).zip(values).enumerate() {
        match (code, value) {
            (FieldCode::Byte, PackValue::Int(v)) => out.push(truncate_u8(*v)),
            (FieldCode::Short, PackValue::Int(v)) => {
                out.extend_from_slice(&truncate_u16(*v).to_be_bytes())
            }
            (FieldCode::Long, PackValue::Int(v)) => {
                out.extend_from_slice(&truncate_u32(*v).to_be_bytes())
            }
            (FieldCode::Str, PackValue::Str(s)) => out.extend_from_slice(s.as_bytes()),
            (_, other) => {
                return Err(EncodingError::TypeMismatch {
                    code: ch,
                    position,
                    found: other.kind().to_string(),
                });
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(v: &[i64]) -> Vec<PackValue> {
        v.iter().copied().map(PackValue::from).collect()
    }

    #[test]
    fn byte_fields_keep_low_bits() {
        assert_eq!(pack("bB", &ints(&[-1, 0x1FF])).unwrap(), vec![0xFF, 0xFF]);
        assert_eq!(pack("b", &ints(&[2])).unwrap(), vec![0x02]);
    }

    #[test]
    fn short_fields_are_big_endian() {
        assert_eq!(pack("h", &ints(&[0x1234])).unwrap(), vec![0x12, 0x34]);
        assert_eq!(pack("H", &ints(&[-1000])).unwrap(), vec![0xFC, 0x18]);
        assert_eq!(pack("h", &ints(&[0x1_0001])).unwrap(), vec![0x00, 0x01]);
    }

    #[test]
    fn long_fields_are_big_endian() {
        assert_eq!(
            pack("I", &ints(&[0x0102_0304])).unwrap(),
            vec![0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(pack("l", &ints(&[-2])).unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(pack("L", &ints(&[65536])).unwrap(), vec![0x00, 0x01, 0x00, 0x00]);
        assert_eq!(pack("i", &ints(&[1 << 32])).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn string_field_is_raw_utf8() {
        let out = pack("bS", &[PackValue::from(3u8), PackValue::from("héllo")]).unwrap();
        assert_eq!(out[0], 3);
        assert_eq!(&out[1..], "héllo".as_bytes());
    }

    #[test]
    fn output_length_is_sum_of_widths() {
        let out = pack("bhIBHl", &ints(&[1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(out.len(), 1 + 2 + 4 + 1 + 2 + 4);
    }

    #[test]
    fn extra_values_are_ignored() {
        assert_eq!(pack("b", &ints(&[7, 8, 9])).unwrap(), vec![7]);
    }

    #[test]
    fn empty_format_packs_nothing() {
        assert!(pack("", &[]).unwrap().is_empty());
    }

    #[test]
    fn too_few_values_is_underflow() {
        let err = pack("hhh", &ints(&[1, 2])).unwrap_err();
        assert_eq!(err, EncodingError::Underflow { needed: 3, available: 2 });
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = pack("bq", &ints(&[1, 2])).unwrap_err();
        assert_eq!(err, EncodingError::UnsupportedField('q'));
    }

    #[test]
    fn unknown_code_wins_over_underflow() {
        let err = pack("x", &[]).unwrap_err();
        assert_eq!(err, EncodingError::UnsupportedField('x'));
    }

    #[test]
    fn string_under_integer_code_is_type_mismatch() {
        let err = pack("bh", &[PackValue::from(1u8), PackValue::from("no")]).unwrap_err();
        assert!(matches!(
            err,
            EncodingError::TypeMismatch { code: 'h', position: 1, .. }
        ));
    }

    #[test]
    fn integer_under_string_code_is_type_mismatch() {
        let err = pack("S", &ints(&[5])).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { code: 'S', position: 0, .. }));
    }

    #[test]
    fn truncation_helpers() {
        assert_eq!(truncate_u8(256 + 5), 5);
        assert_eq!(truncate_u8(-128), 0x80);
        assert_eq!(truncate_u16(-1), 0xFFFF);
        assert_eq!(truncate_u32(-1), 0xFFFF_FFFF);
        assert_eq!(truncate_u32(0x1_2345_6789), 0x2345_6789);
    }

    #[test]
    fn field_code_widths() {
        assert_eq!(FieldCode::from_char('B').unwrap().width(), Some(1));
        assert_eq!(FieldCode::from_char('H').unwrap().width(), Some(2));
        assert_eq!(FieldCode::from_char('i').unwrap().width(), Some(4));
        assert_eq!(FieldCode::from_char('S').unwrap().width(), None);
    }
}
