//! Typed property values
//!
//! Every persisted field is one variant of [`PropertyValue`]. The binary
//! encoding is little-endian and fixed-width for scalars; strings carry a
//! single length byte.

use std::fmt;

/// Longest string payload (bytes) the one-byte length prefix can describe
pub const MAX_STRING_LEN: usize = 255;

/// Type tag of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float,
    Double,
    Str,
}

impl PropertyType {
    /// Encoded width of fixed-size types, `None` for strings
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            PropertyType::Bool | PropertyType::Int8 | PropertyType::UInt8 => Some(1),
            PropertyType::Int16 | PropertyType::UInt16 => Some(2),
            PropertyType::Int32 | PropertyType::UInt32 | PropertyType::Float => Some(4),
            PropertyType::Double => Some(8),
            PropertyType::Str => None,
        }
    }

    /// Short lowercase name, used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Bool => "bool",
            PropertyType::Int8 => "i8",
            PropertyType::Int16 => "i16",
            PropertyType::Int32 => "i32",
            PropertyType::UInt8 => "u8",
            PropertyType::UInt16 => "u16",
            PropertyType::UInt32 => "u32",
            PropertyType::Float => "f32",
            PropertyType::Double => "f64",
            PropertyType::Str => "string",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors while decoding a value from bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes available than the encoding needs
    Truncated { needed: usize, available: usize },
    /// A boolean byte other than 0 or 1
    InvalidBool(u8),
    /// String payload is not UTF-8
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => {
                write!(f, "truncated value: need {} bytes, have {}", needed, available)
            }
            DecodeError::InvalidBool(b) => write!(f, "invalid boolean byte {:#04x}", b),
            DecodeError::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Property value (strongly typed)
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    Float(f32),
    Double(f64),
    /// UTF-8 string, persisted with a one-byte length prefix
    Str(String),
}

/// Longest prefix of `s` that fits the length byte without splitting a char
fn truncated(s: &str) -> &str {
    if s.len() <= MAX_STRING_LEN {
        return s;
    }
    let mut end = MAX_STRING_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn take<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes
        .get(..N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(DecodeError::Truncated {
            needed: N,
            available: bytes.len(),
        })
}

impl PropertyValue {
    /// Returns the type tag of this value
    pub fn type_tag(&self) -> PropertyType {
        match self {
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Int8(_) => PropertyType::Int8,
            PropertyValue::Int16(_) => PropertyType::Int16,
            PropertyValue::Int32(_) => PropertyType::Int32,
            PropertyValue::UInt8(_) => PropertyType::UInt8,
            PropertyValue::UInt16(_) => PropertyType::UInt16,
            PropertyValue::UInt32(_) => PropertyType::UInt32,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Str(_) => PropertyType::Str,
        }
    }

    /// Number of bytes [`encode_into`](Self::encode_into) appends
    pub fn size_in_bytes(&self) -> usize {
        match self {
            PropertyValue::Str(s) => 1 + truncated(s).len(),
            other => other.type_tag().fixed_size().unwrap_or(0),
        }
    }

    /// Appends the binary encoding of this value to `out`
    ///
    /// Strings longer than [`MAX_STRING_LEN`] bytes are truncated on a
    /// character boundary.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            PropertyValue::Bool(v) => out.push(u8::from(*v)),
            PropertyValue::Int8(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::UInt8(v) => out.push(*v),
            PropertyValue::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::UInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            PropertyValue::Float(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            PropertyValue::Double(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            PropertyValue::Str(s) => {
                let s = truncated(s);
                out.push(s.len() as u8);
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Convenience wrapper returning a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_in_bytes());
        self.encode_into(&mut out);
        out
    }

    /// Decodes a value of type `ty` from the start of `bytes`
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn decode_from(ty: PropertyType, bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let value = match ty {
            PropertyType::Bool => match take::<1>(bytes)?[0] {
                0 => PropertyValue::Bool(false),
                1 => PropertyValue::Bool(true),
                other => return Err(DecodeError::InvalidBool(other)),
            },
            PropertyType::Int8 => PropertyValue::Int8(i8::from_le_bytes(take(bytes)?)),
            PropertyType::Int16 => PropertyValue::Int16(i16::from_le_bytes(take(bytes)?)),
            PropertyType::Int32 => PropertyValue::Int32(i32::from_le_bytes(take(bytes)?)),
            PropertyType::UInt8 => PropertyValue::UInt8(take::<1>(bytes)?[0]),
            PropertyType::UInt16 => PropertyValue::UInt16(u16::from_le_bytes(take(bytes)?)),
            PropertyType::UInt32 => PropertyValue::UInt32(u32::from_le_bytes(take(bytes)?)),
            PropertyType::Float => {
                PropertyValue::Float(f32::from_bits(u32::from_le_bytes(take(bytes)?)))
            }
            PropertyType::Double => {
                PropertyValue::Double(f64::from_bits(u64::from_le_bytes(take(bytes)?)))
            }
            PropertyType::Str => {
                let len = take::<1>(bytes)?[0] as usize;
                let payload = bytes.get(1..1 + len).ok_or(DecodeError::Truncated {
                    needed: 1 + len,
                    available: bytes.len(),
                })?;
                let s = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
                PropertyValue::Str(s.to_string())
            }
        };
        let consumed = value.size_in_bytes();
        Ok((value, consumed))
    }

    /// Tries to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Tries to get any integer variant widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int8(v) => Some(i64::from(*v)),
            PropertyValue::Int16(v) => Some(i64::from(*v)),
            PropertyValue::Int32(v) => Some(i64::from(*v)),
            PropertyValue::UInt8(v) => Some(i64::from(*v)),
            PropertyValue::UInt16(v) => Some(i64::from(*v)),
            PropertyValue::UInt32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Tries to get either float variant widened to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(f64::from(*v)),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Tries to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int8(v) => write!(f, "{}", v),
            PropertyValue::Int16(v) => write!(f, "{}", v),
            PropertyValue::Int32(v) => write!(f, "{}", v),
            PropertyValue::UInt8(v) => write!(f, "{}", v),
            PropertyValue::UInt16(v) => write!(f, "{}", v),
            PropertyValue::UInt32(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_sizes() {
        assert_eq!(PropertyValue::Bool(true).size_in_bytes(), 1);
        assert_eq!(PropertyValue::Int16(-2).size_in_bytes(), 2);
        assert_eq!(PropertyValue::UInt32(7).size_in_bytes(), 4);
        assert_eq!(PropertyValue::Float(1.5).size_in_bytes(), 4);
        assert_eq!(PropertyValue::Double(1.5).size_in_bytes(), 8);
        assert_eq!(PropertyValue::Str("abc".to_string()).size_in_bytes(), 4);
        assert_eq!(PropertyType::Str.fixed_size(), None);
    }

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(PropertyValue::UInt16(0x1234).to_bytes(), vec![0x34, 0x12]);
        assert_eq!(
            PropertyValue::Int32(-2).to_bytes(),
            vec![0xFE, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            PropertyValue::Str("hi".to_string()).to_bytes(),
            vec![2, b'h', b'i']
        );
    }

    #[test]
    fn test_decode_every_variant() {
        let values = [
            PropertyValue::Bool(true),
            PropertyValue::Int8(-8),
            PropertyValue::Int16(-1600),
            PropertyValue::Int32(-3_200_000),
            PropertyValue::UInt8(200),
            PropertyValue::UInt16(60_000),
            PropertyValue::UInt32(4_000_000_000),
            PropertyValue::Float(-0.125),
            PropertyValue::Double(core::f64::consts::E),
            PropertyValue::Str("bme280".to_string()),
        ];

        for value in values {
            let bytes = value.to_bytes();
            let (decoded, used) = PropertyValue::decode_from(value.type_tag(), &bytes).unwrap();
            assert_eq!(decoded, value);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn test_float_bits_preserved() {
        let value = PropertyValue::Float(f32::from_bits(0x7FC0_0001));
        let (decoded, _) = PropertyValue::decode_from(PropertyType::Float, &value.to_bytes()).unwrap();
        match decoded {
            PropertyValue::Float(f) => assert_eq!(f.to_bits(), 0x7FC0_0001),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_long_string_truncated_on_char_boundary() {
        // 254 ASCII bytes followed by a two byte char crossing the limit
        let mut s = "a".repeat(254);
        s.push('é');
        s.push_str("tail");
        let value = PropertyValue::Str(s);

        assert_eq!(value.size_in_bytes(), 255);
        let bytes = value.to_bytes();
        assert_eq!(bytes[0], 254);

        let (decoded, _) = PropertyValue::decode_from(PropertyType::Str, &bytes).unwrap();
        assert_eq!(decoded.as_str().unwrap().len(), 254);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            PropertyValue::decode_from(PropertyType::UInt32, &[1, 2]),
            Err(DecodeError::Truncated {
                needed: 4,
                available: 2
            })
        );
        assert_eq!(
            PropertyValue::decode_from(PropertyType::Bool, &[7]),
            Err(DecodeError::InvalidBool(7))
        );
        assert_eq!(
            PropertyValue::decode_from(PropertyType::Str, &[2, 0xFF, 0xFE]),
            Err(DecodeError::InvalidUtf8)
        );
        assert!(PropertyValue::decode_from(PropertyType::Str, &[5, b'a']).is_err());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(PropertyValue::Bool(true).as_bool(), Some(true));
        assert_eq!(PropertyValue::UInt16(9).as_i64(), Some(9));
        assert_eq!(PropertyValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(PropertyValue::Str("x".to_string()).as_str(), Some("x"));
        assert_eq!(PropertyValue::Int8(1).as_bool(), None);
    }
}
