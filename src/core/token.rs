//! Input tokens
//!
//! Unix terminals deliver raw bytes, Windows consoles deliver UTF-16 key
//! characters. The protocol scanner works on either through [`Token`].

use std::fmt::Write;

pub const ESC: char = '\u{1b}';

/// A unit of console input: `u8` on Unix, `char` on Windows.
pub trait Token: Copy + Default + Eq + Send + std::fmt::Debug + 'static {
    /// The token as a character, for grammar checks. Bytes map 1:1 to U+0000..U+00FF.
    fn to_char(self) -> char;

    /// Append the token to `out`, escaping anything that is not printable.
    fn render(self, out: &mut String);

    /// Decode a run of tokens into text.
    fn decode(tokens: &[Self]) -> String;
}

impl Token for u8 {
    fn to_char(self) -> char {
        char::from(self)
    }

    fn render(self, out: &mut String) {
        if (0x20..=0x7e).contains(&self) {
            out.push(char::from(self));
        } else {
            let _ = write!(out, "\\u{:04x}", self);
        }
    }

    fn decode(tokens: &[Self]) -> String {
        String::from_utf8_lossy(tokens).into_owned()
    }
}

impl Token for char {
    fn to_char(self) -> char {
        self
    }

    fn render(self, out: &mut String) {
        if ('\u{20}'..='\u{7e}').contains(&self) || self >= '\u{80}' {
            out.push(self);
        } else {
            let _ = write!(out, "\\u{:04x}", u32::from(self));
        }
    }

    fn decode(tokens: &[Self]) -> String {
        tokens.iter().collect()
    }
}

/// Incremental UTF-8 decoding of a byte stream that may split characters
/// across reads. Invalid sequences become U+FFFD and are dropped.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, keeping an incomplete trailing sequence for the next call.
    pub fn push(&mut self, bytes: &[u8], out: &mut impl Extend<char>) {
        self.pending.extend_from_slice(bytes);
        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.extend(text.chars());
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid = start + e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[start..valid]) {
                        out.extend(text.chars());
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.extend(Some(char::REPLACEMENT_CHARACTER));
                            start = valid + len;
                        }
                        None => {
                            start = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
    }

    /// Flush whatever is left at end of input.
    pub fn finish(&mut self, out: &mut impl Extend<char>) {
        let rest = std::mem::take(&mut self.pending);
        out.extend(String::from_utf8_lossy(&rest).chars());
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Render a token sequence for diagnostics.
pub fn render_tokens<T: Token>(tokens: &[T]) -> String {
    let mut out = String::with_capacity(tokens.len() * 2);
    for &token in tokens {
        token.render(&mut out);
    }
    out
}
