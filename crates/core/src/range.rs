//! Byte ranges as exchanged with the upload session service

use crate::error::{Error, Result};

/// Closed, inclusive interval of byte offsets within the uploaded content.
///
/// Either both bounds are `-1` (the empty range: nothing left to send) or
/// `0 <= min_value <= max_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    min_value: i64,
    max_value: i64,
}

impl ByteRange {
    /// The empty/unset range
    pub const EMPTY: ByteRange = ByteRange {
        min_value: -1,
        max_value: -1,
    };

    /// Create a non-empty range
    pub fn new(min_value: i64, max_value: i64) -> Result<Self> {
        if min_value < 0 || max_value < min_value {
            return Err(Error::Protocol(format!(
                "Invalid byte range {}-{}",
                min_value, max_value
            )));
        }
        Ok(Self {
            min_value,
            max_value,
        })
    }

    /// First byte offset, `-1` for the empty range
    pub fn min_value(&self) -> i64 {
        self.min_value
    }

    /// Last byte offset (inclusive), `-1` for the empty range
    pub fn max_value(&self) -> i64 {
        self.max_value
    }

    pub fn is_empty(&self) -> bool {
        self.min_value == -1 && self.max_value == -1
    }

    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.max_value - self.min_value + 1) as u64
        }
    }

    /// Value of the `Content-Range` request header for this range
    pub fn content_range(&self, file_size: u64) -> String {
        format!("bytes {}-{}/{}", self.min_value, self.max_value, file_size)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min_value, self.max_value)
    }
}

/// Parse the first server-advertised range expression.
///
/// Accepts `"<min>-<max>"` and the open-ended `"<min>-"`, whose end resolves
/// to the last byte of the file. An empty list or an empty first entry yields
/// [`ByteRange::EMPTY`].
pub fn parse_range<S: AsRef<str>>(candidates: &[S], file_size: u64) -> Result<ByteRange> {
    let expression = match candidates.first() {
        Some(candidate) => candidate.as_ref().trim(),
        None => return Ok(ByteRange::EMPTY),
    };

    if expression.is_empty() {
        return Ok(ByteRange::EMPTY);
    }

    let (min_str, max_str) = expression
        .split_once('-')
        .ok_or_else(|| Error::Protocol(format!("Malformed range expression: {}", expression)))?;

    let min_value = parse_bound(min_str, expression)?;
    let max_value = if max_str.is_empty() {
        if file_size == 0 {
            return Err(Error::Protocol(format!(
                "Open-ended range {} against empty content",
                expression
            )));
        }
        file_size as i64 - 1
    } else {
        parse_bound(max_str, expression)?
    };

    ByteRange::new(min_value, max_value)
}

fn parse_bound(bound: &str, expression: &str) -> Result<i64> {
    // i64 parsing would accept a leading sign
    if bound.is_empty() || !bound.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Protocol(format!(
            "Malformed range expression: {}",
            expression
        )));
    }
    bound
        .parse::<i64>()
        .map_err(|e| Error::Protocol(format!("Malformed range expression {}: {}", expression, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_candidates() {
        let none: [&str; 0] = [];
        assert_eq!(parse_range(&none, 100).unwrap(), ByteRange::EMPTY);
        assert_eq!(parse_range(&[""], 100).unwrap(), ByteRange::EMPTY);
    }

    #[test]
    fn test_parse_closed_range() {
        let range = parse_range(&["100-200"], 100_000).unwrap();
        assert_eq!(range.min_value(), 100);
        assert_eq!(range.max_value(), 200);
        assert_eq!(range.len(), 101);
    }

    #[test]
    fn test_parse_open_ended_range() {
        let range = parse_range(&["0-".to_string()], 100_000).unwrap();
        assert_eq!(range, ByteRange::new(0, 99_999).unwrap());
    }

    #[test]
    fn test_parse_uses_first_candidate_only() {
        let range = parse_range(&["10-19", "40-"], 100).unwrap();
        assert_eq!(range, ByteRange::new(10, 19).unwrap());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["abc", "12", "-5", "5-3", "x-10", "1-y", "+1-4"] {
            let err = parse_range(&[bad], 100).unwrap_err();
            assert_eq!(err.name(), "ProtocolError", "{bad}");
        }
    }

    #[test]
    fn test_open_ended_against_empty_file() {
        assert!(parse_range(&["0-"], 0).is_err());
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert_eq!(ByteRange::new(5, 3).unwrap_err().name(), "ProtocolError");
        assert!(ByteRange::new(-2, 3).is_err());
        let range = ByteRange::new(3, 5).unwrap();
        assert_eq!((range.min_value(), range.max_value(), range.len()), (3, 5, 3));
    }

    #[test]
    fn test_empty_range_properties() {
        assert!(ByteRange::EMPTY.is_empty());
        assert_eq!(ByteRange::EMPTY.len(), 0);
        assert!(!ByteRange::new(0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_wire_formats() {
        let range = ByteRange::new(327_680, 328_679).unwrap();
        assert_eq!(range.to_string(), "327680-328679");
        assert_eq!(range.content_range(328_680), "bytes 327680-328679/328680");
    }
}
