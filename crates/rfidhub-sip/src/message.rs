//! SIP2 request forming and response parsing.
//!
//! Only the three exchanges the hub needs are covered: login (93/94),
//! checkin (09/10) and item information (17/18).

use std::collections::HashMap;

use chrono::{DateTime, TimeZone};
use rfidhub_core::ItemResult;

use crate::error::{SipError, SipResult};

/// Request terminator.
pub const TERMINATOR: char = '\r';

/// Fixed-length part of a checkin response, identifier included.
const CHECKIN_FIXED_LEN: usize = 24;

/// Fixed-length part of an item information response, identifier included.
const ITEM_INFO_FIXED_LEN: usize = 26;

/// SIP2 date: `YYYYMMDDZZZZHHMMSS` with a blank zone.
pub fn timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y%m%d    %H%M%S").to_string()
}

/// Login request (93).
pub fn login(username: &str, password: &str, location: &str) -> String {
    format!("9300CN{}|CO{}|CP{}|", username, password, location)
}

/// Checkin request (09).
pub fn checkin(
    timestamp: &str,
    branch: &str,
    institution: &str,
    barcode: &str,
    terminal_password: &str,
) -> String {
    format!(
        "09N{ts}{ts}AP{}|AO{}|AB{}|AC{}|",
        branch,
        institution,
        barcode,
        terminal_password,
        ts = timestamp
    )
}

/// Item information request (17).
pub fn item_information(
    timestamp: &str,
    institution: &str,
    barcode: &str,
    terminal_password: &str,
) -> String {
    format!(
        "17{}AO{}|AB{}|AC{}|",
        timestamp, institution, barcode, terminal_password
    )
}

/// A response split into its fixed part and variable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipResponse {
    /// Fixed-length part, identifier included
    pub fixed: String,
    /// Variable fields by two-letter code; the first occurrence wins
    pub fields: HashMap<String, String>,
}

impl SipResponse {
    /// Split `raw` after checking its identifier and fixed-part length.
    pub fn parse(raw: &str, id: &str, fixed_len: usize) -> SipResult<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        if !raw.starts_with(id) {
            return Err(SipError::Malformed(format!(
                "expected message {}, got {:?}",
                id,
                raw.get(..2).unwrap_or(raw)
            )));
        }
        if raw.len() < fixed_len || !raw.is_char_boundary(fixed_len) {
            return Err(SipError::Malformed(format!(
                "message {} shorter than its fixed part",
                id
            )));
        }

        let (fixed, rest) = raw.split_at(fixed_len);
        let mut fields = HashMap::new();
        for segment in rest.split('|') {
            if segment.len() < 2 || !segment.is_char_boundary(2) {
                continue;
            }
            let (code, value) = segment.split_at(2);
            fields
                .entry(code.to_string())
                .or_insert_with(|| value.to_string());
        }

        Ok(Self {
            fixed: fixed.to_string(),
            fields,
        })
    }

    pub fn field(&self, code: &str) -> Option<&str> {
        self.fields.get(code).map(String::as_str)
    }

    /// Byte of the fixed part at `pos`.
    fn flag(&self, pos: usize) -> Option<u8> {
        self.fixed.as_bytes().get(pos).copied()
    }
}

/// Parse a login response (94); true when the server accepted the login.
pub fn parse_login(raw: &str) -> SipResult<bool> {
    let resp = SipResponse::parse(raw, "94", 3)?;
    Ok(resp.flag(2) == Some(b'1'))
}

/// Parse a checkin response (10).
pub fn parse_checkin(raw: &str, barcode: &str) -> SipResult<ItemResult> {
    let resp = SipResponse::parse(raw, "10", CHECKIN_FIXED_LEN)?;
    let mut item = item_from_fields(&resp, barcode);
    item.transaction_failed = resp.flag(2) != Some(b'1');
    Ok(item)
}

/// Parse an item information response (18).
pub fn parse_item_information(raw: &str, barcode: &str) -> SipResult<ItemResult> {
    let resp = SipResponse::parse(raw, "18", ITEM_INFO_FIXED_LEN)?;
    Ok(item_from_fields(&resp, barcode))
}

fn item_from_fields(resp: &SipResponse, barcode: &str) -> ItemResult {
    let title = resp.field("AJ").unwrap_or_default().trim().to_string();
    ItemResult {
        barcode: resp
            .field("AB")
            .filter(|b| !b.is_empty())
            .unwrap_or(barcode)
            .to_string(),
        unknown: title.is_empty(),
        title,
        transaction_failed: false,
    }
}
