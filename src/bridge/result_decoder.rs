// Parser for the simulator's result dump

use super::tensor::{ResultBuffer, HW_ARRAY_SIZE};
use log::warn;
use std::io::{self, BufRead};

/// Lines starting with this marker are comments.
pub const COMMENT_MARKER: &str = "//";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResults {
  pub values: ResultBuffer,
  /// Lanes filled from the artifact; the rest were zero-filled.
  pub parsed: usize,
  /// Non-comment lines that failed to parse, in file order.
  pub malformed: Vec<String>,
}

impl DecodedResults {
  pub fn is_short(&self) -> bool {
    self.parsed < HW_ARRAY_SIZE
  }
}

fn is_blank(line: &[u8]) -> bool {
  line.iter().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

/// Parses a leading hex integer the way `%x` does: optional whitespace,
/// optional sign, optional `0x`, then as many hex digits as are present.
/// The 32-bit pattern is reinterpreted as signed.
pub fn parse_hex_word(line: &str) -> Option<i32> {
  let mut s = line.trim_start();
  let negative = match s.as_bytes().first() {
    Some(b'-') => {
      s = &s[1..];
      true
    },
    Some(b'+') => {
      s = &s[1..];
      false
    },
    _ => false,
  };
  if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
    if rest.starts_with(|c: char| c.is_ascii_hexdigit()) {
      s = rest;
    }
  }
  let end = s.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(s.len());
  if end == 0 {
    return None;
  }
  let raw = u32::from_str_radix(&s[..end], 16).ok()?;
  let raw = if negative { raw.wrapping_neg() } else { raw };
  Some(raw as i32)
}

/// Reads up to `HW_ARRAY_SIZE` results, skipping comments and blank lines.
///
/// Lines are handled as bytes, so non-UTF-8 content is never fatal: inside a
/// comment it is ignored, elsewhere the line is malformed. A malformed line is
/// reported and does not consume a lane. A short artifact is zero-filled and
/// reported; only an I/O error while reading is fatal.
pub fn decode_results<R: BufRead>(mut reader: R) -> io::Result<DecodedResults> {
  let mut values: ResultBuffer = [0; HW_ARRAY_SIZE];
  let mut parsed = 0;
  let mut malformed = Vec::new();
  let mut buf = Vec::new();

  while parsed < HW_ARRAY_SIZE {
    buf.clear();
    if reader.read_until(b'\n', &mut buf)? == 0 {
      break;
    }
    if buf.starts_with(COMMENT_MARKER.as_bytes()) || is_blank(&buf) {
      continue;
    }
    let text = String::from_utf8_lossy(&buf);
    let line = text.trim_end_matches(|c: char| c == '\n' || c == '\r');
    match parse_hex_word(line) {
      Some(v) => {
        values[parsed] = v;
        parsed += 1;
      },
      None => {
        warn!("cannot parse result line \"{}\"", line);
        malformed.push(line.to_string());
      },
    }
  }

  if parsed < HW_ARRAY_SIZE {
    warn!(
      "only {} results read, expected {}; remaining lanes set to 0",
      parsed, HW_ARRAY_SIZE
    );
  }

  Ok(DecodedResults {
    values,
    parsed,
    malformed,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_hex_word() {
    assert_eq!(parse_hex_word("0000002a"), Some(42));
    assert_eq!(parse_hex_word("  ffffffff"), Some(-1));
    assert_eq!(parse_hex_word("0x10"), Some(16));
    assert_eq!(parse_hex_word("80000000"), Some(i32::MIN));
    assert_eq!(parse_hex_word("1f trailing"), Some(31));
    assert_eq!(parse_hex_word("-1"), Some(-1));
    assert_eq!(parse_hex_word("xyz"), None);
    assert_eq!(parse_hex_word("123456789"), None);
  }

  #[test]
  fn test_comments_and_blanks_are_transparent() {
    let plain = "1\n2\n3\n4\n5\n6\n7\n8\n";
    let noisy = "// dump begin\n1\n\n2\n   \n3\n// lane 3\n4\n\t\n5\n6\r\n7\n8\n// end\n";
    let a = decode_results(plain.as_bytes()).unwrap();
    let b = decode_results(noisy.as_bytes()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.values, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(!a.is_short());
  }

  #[test]
  fn test_shortfall_zero_fills() {
    let decoded = decode_results("// three lanes\nfffffffe\n3\n4\n".as_bytes()).unwrap();
    assert_eq!(decoded.parsed, 3);
    assert!(decoded.is_short());
    assert_eq!(decoded.values, [-2, 3, 4, 0, 0, 0, 0, 0]);
  }

  #[test]
  fn test_malformed_line_does_not_consume_lane() {
    let text = "1\nzz\n2\n  // indented comment is not a comment\n3\n";
    let decoded = decode_results(text.as_bytes()).unwrap();
    assert_eq!(&decoded.values[..3], &[1, 2, 3]);
    assert_eq!(decoded.parsed, 3);
    assert_eq!(decoded.malformed.len(), 2);
    assert_eq!(decoded.malformed[0], "zz");
  }

  #[test]
  fn test_non_utf8_comment_is_skipped() {
    let mut text = b"// r\xe9sultats\n".to_vec();
    text.extend_from_slice(b"1\n2\n3\n4\n5\n6\n7\n8\n");
    let decoded = decode_results(text.as_slice()).unwrap();
    assert_eq!(decoded.values, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(decoded.malformed.is_empty());
  }

  #[test]
  fn test_non_utf8_garbage_is_malformed() {
    let text = b"1\n\xff\xfe\n2\n3\n4\n5\n6\n7\n8\n";
    let decoded = decode_results(&text[..]).unwrap();
    assert_eq!(decoded.values, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(decoded.parsed, HW_ARRAY_SIZE);
    assert_eq!(decoded.malformed.len(), 1);
  }

  #[test]
  fn test_stops_after_full_buffer() {
    let text: String = (1..=12).map(|v| format!("{:x}\n", v)).collect();
    let decoded = decode_results(text.as_bytes()).unwrap();
    assert_eq!(decoded.values, [1, 2, 3, 4, 5, 6, 7, 8]);
  }
}
