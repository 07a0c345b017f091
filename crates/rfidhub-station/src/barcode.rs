//! Barcode normalization.
//!
//! The reader reports item barcodes with a fixed two-character prefix. The
//! stripped form is the key for pending items and both retry maps, and the
//! value passed to the backend.

/// Prefix the reader puts in front of every item barcode.
pub const SCAN_PREFIX: &str = "10";

/// Strip the scan prefix once, if present.
pub fn normalize(barcode: &str) -> &str {
    barcode.strip_prefix(SCAN_PREFIX).unwrap_or(barcode)
}

/// Barcode as written to a tag.
pub fn with_prefix(barcode: &str) -> String {
    format!("{}{}", SCAN_PREFIX, barcode)
}
