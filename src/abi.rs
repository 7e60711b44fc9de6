//! Contract ABI model: parsing, constructor lookup, and encoding of static
//! constructor arguments into 32-byte words.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One parameter in a function or constructor signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One entry of a contract interface description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<AbiParam>,
    /// Unmodeled fields (stateMutability, payable, anonymous, ...) are kept
    /// so the ABI round-trips into account metadata unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// Solidity defaults a missing entry type to "function".
fn default_entry_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("abi is not valid JSON: {0}")]
    Json(String),
    #[error("abi must be a JSON array of interface entries")]
    NotAnArray,
    #[error("abi entry {index} has unknown type '{kind}'")]
    UnknownEntryKind { index: usize, kind: String },
    #[error("abi entry {index} ({kind}) is missing a name")]
    MissingName { index: usize, kind: String },
}

const ENTRY_KINDS: &[&str] = &[
    "function",
    "constructor",
    "event",
    "fallback",
    "receive",
    "error",
];

/// A parsed contract interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(Vec<AbiEntry>);

impl Abi {
    /// Parse and structurally validate ABI JSON text.
    pub fn parse(text: &str) -> Result<Self, AbiError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| AbiError::Json(e.to_string()))?;
        if !value.is_array() {
            return Err(AbiError::NotAnArray);
        }
        let entries: Vec<AbiEntry> =
            serde_json::from_value(value).map_err(|e| AbiError::Json(e.to_string()))?;

        for (index, entry) in entries.iter().enumerate() {
            if !ENTRY_KINDS.contains(&entry.kind.as_str()) {
                return Err(AbiError::UnknownEntryKind {
                    index,
                    kind: entry.kind.clone(),
                });
            }
            let named = matches!(entry.kind.as_str(), "function" | "event" | "error");
            if named && entry.name.as_deref().unwrap_or("").is_empty() {
                return Err(AbiError::MissingName {
                    index,
                    kind: entry.kind.clone(),
                });
            }
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[AbiEntry] {
        &self.0
    }

    /// The constructor entry, if the contract declares one.
    pub fn constructor(&self) -> Option<&AbiEntry> {
        self.0.iter().find(|e| e.kind == "constructor")
    }

    /// Constructor parameter declarations; empty when no constructor.
    pub fn constructor_params(&self) -> &[AbiParam] {
        self.constructor().map_or(&[], |e| e.inputs.as_slice())
    }

    /// The ABI as a JSON value, for account metadata.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Array(Vec::new()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("expected {expected} constructor arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("argument '{name}': {detail}")]
    BadValue { name: String, detail: String },
    #[error("argument '{name}' has unsupported constructor parameter type '{kind}'")]
    UnsupportedType { name: String, kind: String },
}

/// Encode constructor arguments as the 32-byte words appended to deployment
/// bytecode.
///
/// Supports the static types: `uintN`/`intN` (decimal text), `address`,
/// `bool`, and fixed `bytesN`. Dynamic types (`string`, `bytes`, arrays)
/// are rejected rather than mis-encoded.
pub fn encode_constructor_args(params: &[AbiParam], values: &[String]) -> Result<Vec<u8>, EncodeError> {
    if params.len() != values.len() {
        return Err(EncodeError::ArityMismatch {
            expected: params.len(),
            got: values.len(),
        });
    }

    let mut out = Vec::with_capacity(params.len() * 32);
    for (param, value) in params.iter().zip(values) {
        let word = encode_word(param, value.trim())?;
        out.extend_from_slice(&word);
    }
    Ok(out)
}

fn encode_word(param: &AbiParam, value: &str) -> Result<[u8; 32], EncodeError> {
    let kind = param.kind.as_str();
    let bad = |detail: String| EncodeError::BadValue {
        name: param.name.clone(),
        detail,
    };

    if kind == "address" {
        let hex_part = value.strip_prefix("0x").unwrap_or(value);
        if hex_part.len() != 40 {
            return Err(bad(format!("'{value}' is not a 20-byte address")));
        }
        let bytes = hex::decode(hex_part).map_err(|e| bad(e.to_string()))?;
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&bytes);
        return Ok(word);
    }

    if kind == "bool" {
        let mut word = [0u8; 32];
        match value {
            "true" | "1" => word[31] = 1,
            "false" | "0" => {}
            other => return Err(bad(format!("'{other}' is not a boolean"))),
        }
        return Ok(word);
    }

    if let Some(width) = parse_sized(kind, "uint") {
        check_numeric_width(width).map_err(|d| bad(d))?;
        if value.starts_with('-') {
            return Err(bad(format!("'{value}' is negative for {kind}")));
        }
        let word = decimal_magnitude(value).map_err(|d| bad(d))?;
        if !fits_in_bits(&word, width) {
            return Err(bad(format!("'{value}' does not fit in {kind}")));
        }
        return Ok(word);
    }

    if let Some(width) = parse_sized(kind, "int") {
        check_numeric_width(width).map_err(|d| bad(d))?;
        let negative = value.starts_with('-');
        let digits = value.strip_prefix('-').unwrap_or(value);
        let mut word = decimal_magnitude(digits).map_err(|d| bad(d))?;
        // Two's-complement range is asymmetric: -2^(w-1) ..= 2^(w-1)-1.
        let in_range = if negative {
            fits_in_bits(&word, width - 1) || is_power_of_two_at(&word, width - 1)
        } else {
            fits_in_bits(&word, width - 1)
        };
        if !in_range {
            return Err(bad(format!("'{value}' does not fit in {kind}")));
        }
        if negative {
            twos_complement(&mut word);
        }
        return Ok(word);
    }

    if let Some(len) = parse_sized(kind, "bytes") {
        if len == 0 || len > 32 {
            return Err(EncodeError::UnsupportedType {
                name: param.name.clone(),
                kind: param.kind.clone(),
            });
        }
        let hex_part = value.strip_prefix("0x").unwrap_or(value);
        let bytes = hex::decode(hex_part).map_err(|e| bad(e.to_string()))?;
        if bytes.len() != len {
            return Err(bad(format!("expected {len} bytes, got {}", bytes.len())));
        }
        let mut word = [0u8; 32];
        word[..len].copy_from_slice(&bytes);
        return Ok(word);
    }

    Err(EncodeError::UnsupportedType {
        name: param.name.clone(),
        kind: param.kind.clone(),
    })
}

/// Parse `prefixN` into N; bare `uint`/`int` mean 256.
fn parse_sized(kind: &str, prefix: &str) -> Option<usize> {
    let rest = kind.strip_prefix(prefix)?;
    if rest.is_empty() {
        // Bare "bytes" is dynamic, not bytes32.
        if prefix == "bytes" {
            return None;
        }
        return Some(256);
    }
    rest.parse().ok()
}

fn check_numeric_width(width: usize) -> Result<(), String> {
    if width == 0 || width > 256 || width % 8 != 0 {
        return Err(format!("invalid numeric width {width}"));
    }
    Ok(())
}

/// Convert a decimal magnitude into a big-endian 32-byte word.
fn decimal_magnitude(digits: &str) -> Result<[u8; 32], String> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{digits}' is not a decimal number"));
    }

    let mut word = [0u8; 32];
    for b in digits.bytes() {
        let mut carry = u16::from(b - b'0');
        for byte in word.iter_mut().rev() {
            let v = u16::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err("value does not fit in 256 bits".to_string());
        }
    }
    Ok(word)
}

/// Whether the magnitude is strictly below `2^bits`.
fn fits_in_bits(word: &[u8; 32], bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let zero_bytes = (256 - bits) / 8;
    if word[..zero_bytes].iter().any(|b| *b != 0) {
        return false;
    }
    let rem = (256 - bits) % 8;
    rem == 0 || word[zero_bytes] >> (8 - rem) == 0
}

/// Whether the magnitude is exactly `2^bits` (the signed minimum).
fn is_power_of_two_at(word: &[u8; 32], bits: usize) -> bool {
    let byte_index = 31 - bits / 8;
    let expected = 1u8 << (bits % 8);
    word.iter()
        .enumerate()
        .all(|(i, b)| if i == byte_index { *b == expected } else { *b == 0 })
}

// Invert and add one.
fn twos_complement(word: &mut [u8; 32]) {
    for byte in word.iter_mut() {
        *byte = !*byte;
    }
    for byte in word.iter_mut().rev() {
        let (v, overflow) = byte.overflowing_add(1);
        *byte = v;
        if !overflow {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"supply","type":"uint256"},{"name":"owner","type":"address"}]},
        {"type":"function","name":"balanceOf","inputs":[{"name":"who","type":"address"}],"outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"event","name":"Transfer","inputs":[]}
    ]"#;

    #[test]
    fn test_parse_valid_abi() {
        let abi = Abi::parse(TOKEN_ABI).unwrap();
        assert_eq!(abi.entries().len(), 3);
        assert_eq!(abi.constructor_params().len(), 2);
        assert_eq!(abi.constructor_params()[0].kind, "uint256");
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert_eq!(Abi::parse("{}"), Err(AbiError::NotAnArray));
        assert!(matches!(Abi::parse("not json"), Err(AbiError::Json(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_entry_kind() {
        let err = Abi::parse(r#"[{"type":"destructor"}]"#).unwrap_err();
        assert_eq!(
            err,
            AbiError::UnknownEntryKind {
                index: 0,
                kind: "destructor".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unnamed_function() {
        let err = Abi::parse(r#"[{"type":"function"}]"#).unwrap_err();
        assert!(matches!(err, AbiError::MissingName { index: 0, .. }));
    }

    #[test]
    fn test_no_constructor_means_no_params() {
        let abi = Abi::parse(r#"[{"type":"fallback"}]"#).unwrap();
        assert!(abi.constructor().is_none());
        assert!(abi.constructor_params().is_empty());
    }

    #[test]
    fn test_abi_round_trips_extra_fields() {
        let abi = Abi::parse(TOKEN_ABI).unwrap();
        let json = abi.to_json();
        assert_eq!(json[1]["stateMutability"], "view");
    }

    fn param(name: &str, kind: &str) -> AbiParam {
        AbiParam {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }

    #[test]
    fn test_encode_uint256() {
        let words =
            encode_constructor_args(&[param("supply", "uint256")], &["1000000".to_string()])
                .unwrap();
        assert_eq!(words.len(), 32);
        assert_eq!(&words[29..], &[0x0f, 0x42, 0x40]);
        assert!(words[..29].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_negative_int() {
        let words = encode_constructor_args(&[param("delta", "int8")], &["-1".to_string()]).unwrap();
        assert!(words.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_encode_address_left_padded() {
        let words = encode_constructor_args(
            &[param("owner", "address")],
            &["0x00000000000000000000000000000000000000ff".to_string()],
        )
        .unwrap();
        assert_eq!(words[31], 0xff);
        assert!(words[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_bool_and_bytes4() {
        let words = encode_constructor_args(
            &[param("flag", "bool"), param("sig", "bytes4")],
            &["true".to_string(), "0xdeadbeef".to_string()],
        )
        .unwrap();
        assert_eq!(words[31], 1);
        assert_eq!(&words[32..36], &[0xde, 0xad, 0xbe, 0xef]);
        assert!(words[36..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_rejects_dynamic_types() {
        let err = encode_constructor_args(&[param("label", "string")], &["hi".to_string()])
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedType { .. }));

        let err =
            encode_constructor_args(&[param("blob", "bytes")], &["0x00".to_string()]).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedType { .. }));
    }

    #[test]
    fn test_encode_arity_mismatch() {
        let err = encode_constructor_args(&[param("supply", "uint256")], &[]).unwrap_err();
        assert_eq!(
            err,
            EncodeError::ArityMismatch {
                expected: 1,
                got: 0
            }
        );
    }

    #[test]
    fn test_encode_rejects_value_too_wide_for_sized_uint() {
        let err =
            encode_constructor_args(&[param("fee", "uint8")], &["300".to_string()]).unwrap_err();
        assert!(matches!(err, EncodeError::BadValue { .. }));

        let words =
            encode_constructor_args(&[param("fee", "uint8")], &["255".to_string()]).unwrap();
        assert_eq!(words[31], 255);
        assert!(
            encode_constructor_args(&[param("fee", "uint8")], &["256".to_string()]).is_err()
        );
    }

    #[test]
    fn test_encode_signed_range_is_asymmetric() {
        assert!(encode_constructor_args(&[param("delta", "int8")], &["127".to_string()]).is_ok());
        assert!(encode_constructor_args(&[param("delta", "int8")], &["128".to_string()]).is_err());

        let words =
            encode_constructor_args(&[param("delta", "int8")], &["-128".to_string()]).unwrap();
        assert_eq!(words[31], 0x80);
        assert!(words[..31].iter().all(|b| *b == 0xff));

        assert!(
            encode_constructor_args(&[param("delta", "int8")], &["-129".to_string()]).is_err()
        );
    }

    #[test]
    fn test_encode_overflow_detected() {
        // 2^256 does not fit.
        let too_big = format!("1{}", "0".repeat(78));
        let err =
            encode_constructor_args(&[param("supply", "uint256")], &[too_big]).unwrap_err();
        assert!(matches!(err, EncodeError::BadValue { .. }));
    }
}
