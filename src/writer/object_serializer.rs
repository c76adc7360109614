//! PDF object serialization.
//!
//! Turns [`Object`] values back into PDF syntax. Output is single-line and
//! deterministic: dictionaries are written in their stored key order, reals
//! with at most five decimals.

use crate::encryption::EncryptionWriteHandler;
use crate::error::Result;
use crate::object::{Dict, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a new object serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for logs and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an object whose strings and stream data are encrypted with
    /// the key of object `obj_num`/`gen_num`. Stream `/Length` entries are
    /// rewritten to the ciphertext length.
    pub fn serialize_encrypted(
        &self,
        obj: &Object,
        obj_num: u32,
        gen_num: u16,
        handler: &EncryptionWriteHandler,
    ) -> Result<Vec<u8>> {
        let encrypted = encrypt_object(obj, obj_num, gen_num, handler)?;
        Ok(self.serialize(&encrypted))
    }

    fn write_object(&self, w: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => w.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => w.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(items) => {
                w.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        w.push(b' ');
                    }
                    self.write_object(w, item);
                }
                w.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(w, &dict);
                w.extend_from_slice(b"\nstream\n");
                w.extend_from_slice(data);
                w.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => w.extend_from_slice(format!("{} {} R", r.id, r.gen).as_bytes()),
        }
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dict) {
        w.extend_from_slice(b"<<");
        for (key, value) in dict {
            w.push(b' ');
            write_name(w, key);
            w.push(b' ');
            self.write_object(w, value);
        }
        w.extend_from_slice(b" >>");
    }
}

/// Copy of `obj` with every string and stream body encrypted.
fn encrypt_object(
    obj: &Object,
    obj_num: u32,
    gen_num: u16,
    handler: &EncryptionWriteHandler,
) -> Result<Object> {
    let encrypt_dict = |dict: &Dict| -> Result<Dict> {
        dict.iter()
            .map(|(key, value)| {
                Ok((key.clone(), encrypt_object(value, obj_num, gen_num, handler)?))
            })
            .collect()
    };

    Ok(match obj {
        Object::String(s) => Object::String(handler.encrypt_string(s, obj_num, gen_num)?),
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| encrypt_object(item, obj_num, gen_num, handler))
                .collect::<Result<_>>()?,
        ),
        Object::Dictionary(dict) => Object::Dictionary(encrypt_dict(dict)?),
        Object::Stream { dict, data } => Object::Stream {
            dict: encrypt_dict(dict)?,
            data: handler.encrypt_stream(data, obj_num, gen_num)?.into(),
        },
        other => other.clone(),
    })
}

/// Format a real with up to five decimals, trimming trailing zeros.
///
/// ```
/// # use pdf_inject::writer::format_real;
/// assert_eq!(format_real(841.89), "841.89");
/// assert_eq!(format_real(2.0), "2");
/// assert_eq!(format_real(-0.000001), "0");
/// ```
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Literal string syntax for printable ASCII, hex syntax otherwise.
fn write_string(w: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if printable {
        w.push(b'(');
        for &byte in data {
            match byte {
                b'(' | b')' | b'\\' => w.extend_from_slice(&[b'\\', byte]),
                b'\n' => w.extend_from_slice(b"\\n"),
                b'\r' => w.extend_from_slice(b"\\r"),
                b'\t' => w.extend_from_slice(b"\\t"),
                _ => w.push(byte),
            }
        }
        w.push(b')');
    } else {
        w.push(b'<');
        for byte in data {
            w.extend_from_slice(format!("{:02X}", byte).as_bytes());
        }
        w.push(b'>');
    }
}

/// Names escape delimiters, whitespace, `#` and non-printable bytes as `#XX`.
fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for byte in name.bytes() {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(
                byte,
                b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
            );
        if regular {
            w.push(byte);
        } else {
            w.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{rc4_crypt, Algorithm};
    use crate::parser::parse_payload;

    fn dict(entries: Vec<(&str, Object)>) -> Dict {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_serialize_primitives() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Integer(-4)), "-4");
        assert_eq!(s.serialize_to_string(&Object::Real(0.1)), "0.1");
        assert_eq!(s.serialize_to_string(&Object::reference(7)), "7 0 R");
    }

    #[test]
    fn test_serialize_dictionary_in_key_order() {
        let d = dict(vec![
            ("Type", Object::name("Page")),
            ("Parent", Object::reference(2)),
            ("Contents", Object::Array(vec![Object::reference(4), Object::reference(9)])),
        ]);
        assert_eq!(
            ObjectSerializer::new().serialize_to_string(&Object::Dictionary(d)),
            "<< /Type /Page /Parent 2 0 R /Contents [4 0 R 9 0 R] >>"
        );
    }

    #[test]
    fn test_strings_choose_literal_or_hex() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::String(b"a(b)".to_vec())), "(a\\(b\\))");
        assert_eq!(s.serialize_to_string(&Object::String(vec![0, 255])), "<00FF>");
    }

    #[test]
    fn test_names_are_escaped() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::name("A B#")), "/A#20B#23");
    }

    #[test]
    fn test_stream_length_is_rewritten() {
        let obj = Object::Stream {
            dict: dict(vec![("Length", Object::reference(12))]),
            data: bytes::Bytes::from_static(b"q Q"),
        };
        let out = ObjectSerializer::new().serialize_to_string(&obj);
        assert_eq!(out, "<< /Length 3 >>\nstream\nq Q\nendstream");
    }

    #[test]
    fn test_output_parses_back_to_same_object() {
        let original = Object::Dictionary(dict(vec![
            ("Title", Object::String(b"Report (draft)".to_vec())),
            ("Scale", Object::Real(1.25)),
            ("Kids", Object::Array(vec![Object::reference(3), Object::Null])),
        ]));
        let bytes = ObjectSerializer::new().serialize(&original);
        assert_eq!(parse_payload(&bytes).unwrap(), original);
    }

    #[test]
    fn test_encrypted_strings_and_stream_lengths() {
        let handler = EncryptionWriteHandler::from_key(vec![5; 5], Algorithm::Rc4_40);
        let obj = Object::Stream {
            dict: dict(vec![
                ("Length", Object::Integer(99)),
                ("Name", Object::String(b"abc".to_vec())),
            ]),
            data: bytes::Bytes::from_static(b"BT ET"),
        };
        let out = ObjectSerializer::new()
            .serialize_encrypted(&obj, 4, 0, &handler)
            .unwrap();
        let key = handler.derive_object_key(4, 0);
        match parse_payload(&out).unwrap() {
            Object::Stream { dict, data } => {
                assert_eq!(dict["Length"], Object::Integer(5));
                assert_eq!(rc4_crypt(&key, dict["Name"].as_string().unwrap()), b"abc");
                assert_eq!(rc4_crypt(&key, &data), b"BT ET");
            },
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_encryption_failure_is_reported() {
        let handler = EncryptionWriteHandler::from_key(vec![5; 5], Algorithm::Aes128);
        let obj = Object::String(b"x".to_vec());
        assert!(ObjectSerializer::new()
            .serialize_encrypted(&obj, 1, 0, &handler)
            .is_err());
    }
}
