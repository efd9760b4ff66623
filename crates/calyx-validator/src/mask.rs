//! Comment stripping and string masking.
//!
//! Both transforms preserve byte offsets: every replaced byte becomes a
//! space, so positions found in the masked text index directly into the
//! original source. Newlines are kept so line-based checks still line up.

/// The two derived views of a source text.
pub struct MaskedSource {
  /// Comments blanked, string bodies kept (quotes and all).
  pub stripped: String,
  /// Comments blanked and string/template bodies blanked; quotes remain.
  pub masked: String,
  /// Still inside a string or template literal at end of input.
  pub unterminated_string: bool,
  /// Still inside a block comment at end of input.
  pub unterminated_comment: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
  Normal,
  LineComment,
  BlockComment,
  Single,
  Double,
  Template,
}

/// Run the masking state machine over `source`.
pub fn mask_source(source: &str) -> MaskedSource {
  let bytes = source.as_bytes();
  let mut stripped = bytes.to_vec();
  let mut masked = bytes.to_vec();

  let mut state = State::Normal;
  let mut escaped = false;
  let mut i = 0;

  while i < bytes.len() {
    let b = bytes[i];
    match state {
      State::Normal => match b {
        b'/' if bytes.get(i + 1) == Some(&b'/') => {
          state = State::LineComment;
          blank(&mut stripped, i);
          blank(&mut masked, i);
        }
        b'/' if bytes.get(i + 1) == Some(&b'*') => {
          state = State::BlockComment;
          blank(&mut stripped, i);
          blank(&mut masked, i);
        }
        b'\'' => state = State::Single,
        b'"' => state = State::Double,
        b'`' => state = State::Template,
        _ => {}
      },
      State::LineComment => {
        if b == b'\n' {
          state = State::Normal;
        } else {
          blank(&mut stripped, i);
          blank(&mut masked, i);
        }
      }
      State::BlockComment => {
        if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
          blank(&mut stripped, i);
          blank(&mut masked, i);
          blank(&mut stripped, i + 1);
          blank(&mut masked, i + 1);
          i += 1;
          state = State::Normal;
        } else if b != b'\n' {
          blank(&mut stripped, i);
          blank(&mut masked, i);
        }
      }
      State::Single | State::Double | State::Template => {
        let quote = match state {
          State::Single => b'\'',
          State::Double => b'"',
          _ => b'`',
        };
        if escaped {
          escaped = false;
          blank(&mut masked, i);
        } else if b == b'\\' {
          escaped = true;
          blank(&mut masked, i);
        } else if b == quote {
          state = State::Normal;
        } else if b != b'\n' {
          blank(&mut masked, i);
        }
      }
    }
    i += 1;
  }

  MaskedSource {
    stripped: String::from_utf8(stripped).expect("blanking preserves utf-8"),
    masked: String::from_utf8(masked).expect("blanking preserves utf-8"),
    unterminated_string: matches!(state, State::Single | State::Double | State::Template),
    unterminated_comment: state == State::BlockComment,
  }
}

fn blank(buf: &mut [u8], index: usize) {
  buf[index] = b' ';
}

impl MaskedSource {
  /// Net `{`/`}` balance of the masked text.
  pub fn brace_balance(&self) -> i64 {
    let mut net = 0i64;
    for b in self.masked.bytes() {
      match b {
        b'{' => net += 1,
        b'}' => net -= 1,
        _ => {}
      }
    }
    net
  }

  /// Deepest `{` nesting observed in the masked text.
  pub fn max_nesting(&self) -> usize {
    let mut depth = 0i64;
    let mut max = 0i64;
    for b in self.masked.bytes() {
      match b {
        b'{' => {
          depth += 1;
          max = max.max(depth);
        }
        b'}' => depth -= 1,
        _ => {}
      }
    }
    max.max(0) as usize
  }
}
