//! Pure field validators for the wizard form.
//!
//! Each validator is synchronous and side-effect free: it returns the
//! (possibly normalized) value together with an optional error message, the
//! shape the wizard stores per field.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::abi::Abi;

pub const ERR_INVALID_NAME: &str = "name should not be blank and longer than 2 characters";
pub const ERR_INVALID_ABI: &str = "abi should be a valid JSON array of interface entries";
pub const ERR_INVALID_CODE: &str = "code should be the compiled hex string";
pub const ERR_INVALID_OWNER: &str =
    "a valid account as the contract owner needs to be selected";

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("address regex is valid"));

/// Check well-formedness of a network address.
pub fn is_address_valid(text: &str) -> bool {
    ADDRESS_RE.is_match(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValidation {
    pub name: String,
    pub error: Option<String>,
}

/// Contract names must be non-blank and longer than 2 characters.
pub fn validate_name(text: &str) -> NameValidation {
    let name = text.to_string();
    let error = if name.trim().len() > 2 {
        None
    } else {
        Some(ERR_INVALID_NAME.to_string())
    };
    NameValidation { name, error }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbiValidation {
    pub abi: String,
    /// Structured form, present only when the text validated.
    pub parsed: Option<Abi>,
    pub error: Option<String>,
}

/// Validate ABI JSON text; the parsed form is cleared on invalid input.
pub fn validate_abi(text: &str) -> AbiValidation {
    match Abi::parse(text) {
        Ok(parsed) => AbiValidation {
            abi: text.to_string(),
            parsed: Some(parsed),
            error: None,
        },
        Err(err) => {
            tracing::debug!(%err, "abi text failed validation");
            AbiValidation {
                abi: text.to_string(),
                parsed: None,
                error: Some(ERR_INVALID_ABI.to_string()),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeValidation {
    pub code: String,
    pub error: Option<String>,
}

/// Bytecode must be a non-empty, even-length hex string (0x prefix optional).
pub fn validate_code(text: &str) -> CodeValidation {
    let code = text.trim().to_string();
    let hex_part = code.strip_prefix("0x").unwrap_or(&code);

    let well_formed = !hex_part.is_empty()
        && hex_part.len() % 2 == 0
        && hex_part.bytes().all(|b| b.is_ascii_hexdigit());

    CodeValidation {
        code,
        error: if well_formed {
            None
        } else {
            Some(ERR_INVALID_CODE.to_string())
        },
    }
}

/// One contract extracted from `solc --combined-json abi,bin` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolcContract {
    pub name: String,
    pub abi: String,
    pub bin: String,
}

/// Extract contracts from pasted solc combined-JSON output.
///
/// Accepts both the modern shape (`"abi"` as a JSON array) and the legacy
/// one (`"abi"` as an embedded JSON string).
pub fn parse_solc_output(text: &str) -> Result<Vec<SolcContract>, String> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| format!("not valid solc JSON: {e}"))?;
    let contracts = value
        .get("contracts")
        .and_then(|c| c.as_object())
        .ok_or_else(|| "solc output has no 'contracts' object".to_string())?;

    let mut out = Vec::new();
    for (key, entry) in contracts {
        // Keys look like "Token.sol:Token"; keep the part after the colon.
        let name = key.rsplit(':').next().unwrap_or(key).to_string();

        let abi = match entry.get("abi") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => continue,
        };
        let bin = match entry.get("bin").and_then(|b| b.as_str()) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => continue,
        };
        out.push(SolcContract { name, abi, bin });
    }

    if out.is_empty() {
        return Err("solc output contains no deployable contracts".to_string());
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}
