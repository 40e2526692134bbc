// SPDX-FileCopyrightText: 2025-2026 TII (SSRC) and the Ghaf contributors
// SPDX-License-Identifier: Apache-2.0

//! Recovery of taxpayer identity fields from the raw value of the subject
//! alternative name extension of ICP-Brasil certificates.
//!
//! The identity data lives in `otherName` entries, but rather than walking
//! the ASN.1 structure the decoder looks for the DER encoding of the
//! `otherName` type OIDs and reads fields at fixed offsets from them. Each
//! pass is independent: a missing indicator yields `Ok(None)`, while an
//! indicator whose field would extend past the end of the buffer yields
//! [`DecodeError::BufferOutOfRange`].

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// OID of the extension consumed by [`decode`]
pub const SUBJECT_ALT_NAME_OID: &str = "2.5.29.17";

/// DER of OID 2.16.76.1.3.3 (CNPJ of the company holding the certificate)
pub const CORPORATE_ID_INDICATOR: [u8; 7] = [0x06, 0x05, 0x60, 0x4C, 0x01, 0x03, 0x03];
/// DER of OID 2.16.76.1.3.4 (holder data: birth date followed by CPF)
pub const INDIVIDUAL_ID_INDICATOR: [u8; 7] = [0x06, 0x05, 0x60, 0x4C, 0x01, 0x03, 0x04];
/// DER of OID 2.16.76.1.3.2 (name of the individual responsible)
pub const INDIVIDUAL_NAME_INDICATOR: [u8; 7] = [0x06, 0x05, 0x60, 0x4C, 0x01, 0x03, 0x02];

const CORPORATE_ID_START: usize = 6;
const CORPORATE_ID_END: usize = 25;

const INDIVIDUAL_TEXT_INDICATOR: u8 = 0x01;
const INDIVIDUAL_TEXT_TERMINATOR: u8 = 0x17;
const INDIVIDUAL_TEXT_OFFSET: usize = 15;

const INDIVIDUAL_ID_OFFSET: usize = 19;
const INDIVIDUAL_ID_LENGTH: usize = 11;

const INDIVIDUAL_NAME_OFFSET: usize = 11;

static CORPORATE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{14}").expect("Invalid regex"));
static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("extension field {start}..{end} lies outside the {len} byte buffer")]
    BufferOutOfRange { start: usize, end: usize, len: usize },
}

/// Identity fields found in one extension value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxpayerIdentity {
    /// CNPJ, or CPF when the certificate belongs to an individual
    pub tax_id: Option<String>,
    /// CPF of the individual holder
    pub individual_tax_id: Option<String>,
    pub individual_name: Option<String>,
}

impl TaxpayerIdentity {
    #[must_use]
    pub fn is_corporate(&self) -> bool {
        self.tax_id.as_ref().is_some_and(|id| id.len() == 14)
    }
}

/// Position of the first occurrence of `indicator` in `buffer`.
#[must_use]
pub fn find_indicator(buffer: &[u8], indicator: &[u8]) -> Option<usize> {
    if indicator.is_empty() || buffer.len() < indicator.len() {
        return None;
    }
    buffer
        .windows(indicator.len())
        .position(|window| window == indicator)
}

/// Run every pass over `extension`, treating a failed pass as a missing field.
#[must_use]
pub fn decode(extension: &[u8]) -> TaxpayerIdentity {
    TaxpayerIdentity {
        tax_id: absorb("tax id", document_from_extension(extension)),
        individual_tax_id: absorb("individual tax id", process_tax_id(extension)),
        individual_name: absorb("individual name", process_individual_name(extension)),
    }
}

fn absorb(field: &str, result: Result<Option<String>, DecodeError>) -> Option<String> {
    result.unwrap_or_else(|e| {
        debug!("Ignoring undecodable {field}: {e}");
        None
    })
}

/// CNPJ next to the corporate indicator, falling back to a CPF found by the
/// textual individual pass when the corporate indicator is absent.
///
/// # Errors
/// Return `Err(DecodeError)` if an indicator is present but its field is truncated
pub fn document_from_extension(extension: &[u8]) -> Result<Option<String>, DecodeError> {
    match corporate_document(extension)? {
        Some(document) => Ok(Some(document)),
        None => individual_document(extension),
    }
}

/// CPF from the structured holder data (`INDIVIDUAL_ID_INDICATOR`).
///
/// # Errors
/// Return `Err(DecodeError)` if the indicator is present but the CPF is truncated
pub fn process_tax_id(extension: &[u8]) -> Result<Option<String>, DecodeError> {
    let Some(index) = find_indicator(extension, &INDIVIDUAL_ID_INDICATOR) else {
        return Ok(None);
    };
    let start = index + INDIVIDUAL_ID_OFFSET;
    let field = slice(extension, start, start + INDIVIDUAL_ID_LENGTH)?;
    Ok(validate_document(&String::from_utf8_lossy(field)))
}

/// Name of the individual responsible; its length is the byte right before it.
///
/// # Errors
/// Return `Err(DecodeError)` if the indicator is present but the name is truncated
pub fn process_individual_name(extension: &[u8]) -> Result<Option<String>, DecodeError> {
    let Some(index) = find_indicator(extension, &INDIVIDUAL_NAME_INDICATOR) else {
        return Ok(None);
    };
    let start = index + INDIVIDUAL_NAME_OFFSET;
    let length = slice(extension, start - 1, start)?[0];
    let name = slice(extension, start, start + usize::from(length))?;
    Ok(Some(String::from_utf8_lossy(name).into_owned()))
}

fn corporate_document(extension: &[u8]) -> Result<Option<String>, DecodeError> {
    let Some(index) = find_indicator(extension, &CORPORATE_ID_INDICATOR) else {
        return Ok(None);
    };
    let field = slice(
        extension,
        index + CORPORATE_ID_START,
        index + CORPORATE_ID_END,
    )?;
    Ok(validate_document(&digits(field)))
}

fn individual_document(extension: &[u8]) -> Result<Option<String>, DecodeError> {
    let Some(index) = extension
        .iter()
        .position(|b| *b == INDIVIDUAL_TEXT_INDICATOR)
    else {
        return Ok(None);
    };
    let start = index + INDIVIDUAL_TEXT_OFFSET;
    let terminated = extension
        .get(start..)
        .is_some_and(|rest| rest.contains(&INDIVIDUAL_TEXT_TERMINATOR));
    if !terminated {
        return Ok(None);
    }
    let field = slice(extension, start, start + INDIVIDUAL_ID_LENGTH)?;
    Ok(validate_document(&digits(field)))
}

fn slice(buffer: &[u8], start: usize, end: usize) -> Result<&[u8], DecodeError> {
    buffer.get(start..end).ok_or(DecodeError::BufferOutOfRange {
        start,
        end,
        len: buffer.len(),
    })
}

fn digits(field: &[u8]) -> String {
    field
        .iter()
        .filter(|b| b.is_ascii_digit())
        .map(|b| char::from(*b))
        .collect()
}

/// Accept a 14 digit CNPJ (leftmost match) or, failing that, a digit run of
/// exactly 11 digits (CPF).
#[must_use]
pub fn validate_document(candidate: &str) -> Option<String> {
    if let Some(cnpj) = CORPORATE_ID_RE.find(candidate) {
        return Some(cnpj.as_str().to_owned());
    }
    DIGIT_RUN_RE
        .find_iter(candidate)
        .find(|run| run.len() == INDIVIDUAL_ID_LENGTH)
        .map(|run| run.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mimic one `otherName` entry: OID, `[0]` tag, string tag, value.
    fn other_name(indicator: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = indicator.to_vec();
        let inner_len = u8::try_from(value.len() + 2).unwrap();
        out.extend_from_slice(&[0xA0, inner_len, 0x04, u8::try_from(value.len()).unwrap()]);
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn test_find_indicator() {
        let buf = [9, 9, 6, 5, 96, 76, 1, 3, 4, 0];
        assert_eq!(find_indicator(&buf, &INDIVIDUAL_ID_INDICATOR), Some(2));
        assert_eq!(find_indicator(&buf, &INDIVIDUAL_NAME_INDICATOR), None);
        assert_eq!(find_indicator(&[6, 5], &INDIVIDUAL_ID_INDICATOR), None);
        assert_eq!(find_indicator(&[], &[]), None);
    }

    #[test]
    fn test_structured_individual_id() {
        let mut buf = INDIVIDUAL_ID_INDICATOR.to_vec();
        buf.extend_from_slice(&[0u8; 12]);
        buf.extend_from_slice(b"12345678901");
        assert_eq!(process_tax_id(&buf), Ok(Some("12345678901".to_string())));

        let realistic = other_name(&INDIVIDUAL_ID_INDICATOR, b"0101198012345678901000000000000");
        assert_eq!(
            process_tax_id(&realistic),
            Ok(Some("12345678901".to_string()))
        );
    }

    #[test]
    fn test_structured_individual_id_rejects_non_digits() {
        let realistic = other_name(&INDIVIDUAL_ID_INDICATOR, b"01011980ABCDEFGHIJK00000");
        assert_eq!(process_tax_id(&realistic), Ok(None));
    }

    #[test]
    fn test_truncated_fields() {
        let mut buf = INDIVIDUAL_ID_INDICATOR.to_vec();
        buf.extend_from_slice(b"short");
        assert_eq!(
            process_tax_id(&buf),
            Err(DecodeError::BufferOutOfRange {
                start: 19,
                end: 30,
                len: 12
            })
        );

        let mut name = INDIVIDUAL_NAME_INDICATOR.to_vec();
        name.extend_from_slice(&[0xA0, 0x20, 0x04, 0x1E, b'J', b'O']);
        assert!(matches!(
            process_individual_name(&name),
            Err(DecodeError::BufferOutOfRange { .. })
        ));

        let mut cnpj = CORPORATE_ID_INDICATOR.to_vec();
        cnpj.extend_from_slice(b"1234");
        assert!(document_from_extension(&cnpj).is_err());
    }

    #[test]
    fn test_no_indicators() {
        for buf in [
            Vec::new(),
            vec![0x30],
            b"plain rfc822 name".to_vec(),
            vec![0xFF; 64],
        ] {
            assert_eq!(document_from_extension(&buf), Ok(None));
            assert_eq!(process_tax_id(&buf), Ok(None));
            assert_eq!(process_individual_name(&buf), Ok(None));
            assert_eq!(decode(&buf), TaxpayerIdentity::default());
        }
    }

    #[test]
    fn test_individual_name() {
        let buf = other_name(&INDIVIDUAL_NAME_INDICATOR, b"JOAO DA SILVA");
        assert_eq!(
            process_individual_name(&buf),
            Ok(Some("JOAO DA SILVA".to_string()))
        );
    }

    #[test]
    fn test_corporate_document() {
        let buf = other_name(&CORPORATE_ID_INDICATOR, b"12345678000195");
        assert_eq!(
            document_from_extension(&buf),
            Ok(Some("12345678000195".to_string()))
        );
        let identity = decode(&buf);
        assert!(identity.is_corporate());
    }

    #[test]
    fn test_corporate_path_falls_back_to_cpf_pattern() {
        // Only eleven digits fit the corporate window
        let mut buf = CORPORATE_ID_INDICATOR.to_vec();
        buf.extend_from_slice(&[0xA0, 0x0F, 0x04, 0x0D]);
        buf.extend_from_slice(b"12345678901  ");
        buf.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            document_from_extension(&buf),
            Ok(Some("12345678901".to_string()))
        );

        // Twelve digits are neither a CNPJ nor a CPF
        let mut buf = CORPORATE_ID_INDICATOR.to_vec();
        buf.extend_from_slice(&[0xA0, 0x0F, 0x04, 0x0D]);
        buf.extend_from_slice(b"123456789012 ");
        buf.extend_from_slice(&[0u8; 8]);
        assert_eq!(document_from_extension(&buf), Ok(None));
    }

    #[test]
    fn test_textual_individual_fallback() {
        let mut buf = vec![0x30, 0x01];
        buf.extend_from_slice(&[0x20; 14]);
        buf.extend_from_slice(b"98765432100");
        buf.extend_from_slice(&[0x17, 0x00]);
        assert_eq!(
            document_from_extension(&buf),
            Ok(Some("98765432100".to_string()))
        );

        // without the terminator the pass does not apply
        let unterminated: Vec<u8> = buf[..buf.len() - 2].to_vec();
        assert_eq!(document_from_extension(&unterminated), Ok(None));
    }

    #[test]
    fn test_validate_document() {
        assert_eq!(
            validate_document("12345678000195").as_deref(),
            Some("12345678000195")
        );
        assert_eq!(
            validate_document("x12345678901y").as_deref(),
            Some("12345678901")
        );
        assert_eq!(
            validate_document("1234567890123456").as_deref(),
            Some("12345678901234")
        );
        assert_eq!(validate_document("123456789012"), None);
        assert_eq!(validate_document("1234567890"), None);
        assert_eq!(validate_document(""), None);
    }

    #[test]
    fn test_decode_individual_certificate() {
        let mut buf = vec![0x30, 0x50];
        buf.extend(other_name(&INDIVIDUAL_NAME_INDICATOR, b"MARIA SOUZA"));
        buf.extend(other_name(&INDIVIDUAL_ID_INDICATOR, b"3112199011122233344"));
        let identity = decode(&buf);
        assert_eq!(identity.individual_name.as_deref(), Some("MARIA SOUZA"));
        assert_eq!(identity.individual_tax_id.as_deref(), Some("11122233344"));
        assert!(!identity.is_corporate());
    }

    #[test]
    fn test_decode_absorbs_errors() {
        let mut buf = other_name(&INDIVIDUAL_NAME_INDICATOR, b"ANA");
        buf.extend_from_slice(&INDIVIDUAL_ID_INDICATOR);
        let identity = decode(&buf);
        assert_eq!(identity.individual_name.as_deref(), Some("ANA"));
        assert_eq!(identity.individual_tax_id, None);
    }
}
