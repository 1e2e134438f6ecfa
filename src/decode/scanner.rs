//! Byte-level structural scanner over a JSON stream
//!
//! The scanner never builds a document tree. Every value it walks is checked
//! against the JSON grammar, so a skipped value must be as well formed as a
//! decoded one. Values can either be skipped or copied out verbatim for a
//! typed decode.

use crate::error::{BakeError, Result};
use std::io::BufRead;

/// Pull-based cursor over a JSON byte stream
pub struct JsonScanner<R> {
    reader: R,
    offset: u64,
}

impl<R: BufRead> JsonScanner<R> {
    pub fn new(reader: R) -> Self {
        JsonScanner { reader, offset: 0 }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Skip whitespace and return the next significant byte without consuming it
    pub fn peek_token(&mut self) -> Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf().map_err(read_error)?;
            if buf.is_empty() {
                return Ok(None);
            }
            let skipped = buf.iter().take_while(|b| is_whitespace(**b)).count();
            let next = buf.get(skipped).copied();
            self.advance(skipped);
            if next.is_some() {
                return Ok(next);
            }
        }
    }

    /// Consume `expected` as the next significant byte
    pub fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek_token()? {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(b) => Err(self.malformed(format!(
                "expected {:?}, found {:?}",
                expected as char, b as char
            ))),
            None => Err(self.malformed(format!(
                "expected {:?}, found end of input",
                expected as char
            ))),
        }
    }

    /// Read an object key and the colon following it
    pub fn read_key(&mut self) -> Result<String> {
        let start = match self.peek_token()? {
            Some(b'"') => self.offset,
            Some(b) => return Err(self.malformed(format!("expected object key, found {:?}", b as char))),
            None => return Err(self.malformed("expected object key, found end of input")),
        };

        let mut raw = Vec::new();
        self.walk_value(Some(&mut raw))?;
        let key: String = serde_json::from_slice(&raw)
            .map_err(|e| BakeError::malformed(start, format!("invalid object key: {e}")))?;

        self.expect(b':')?;
        Ok(key)
    }

    /// Skip the next value without keeping any of it
    pub fn skip_value(&mut self) -> Result<()> {
        self.walk_value(None)
    }

    /// Append the raw bytes of the next value to `out`
    pub fn capture_value(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.walk_value(Some(out))
    }

    /// Require that only whitespace remains
    pub fn expect_end(&mut self) -> Result<()> {
        match self.peek_token()? {
            None => Ok(()),
            Some(b) => Err(self.malformed(format!("trailing data after document: {:?}", b as char))),
        }
    }

    fn walk_value(&mut self, mut out: Option<&mut Vec<u8>>) -> Result<()> {
        let start = match self.peek_token()? {
            None => return Err(self.malformed("expected a value, found end of input")),
            Some(_) => self.offset,
        };

        let mut grammar = ValueGrammar::new();
        loop {
            let buf = self.reader.fill_buf().map_err(read_error)?;
            if buf.is_empty() {
                if grammar.ends_at_eof() {
                    return Ok(());
                }
                return Err(BakeError::malformed(start, "value truncated by end of input"));
            }

            let mut consumed = 0;
            let mut outcome = None;
            for &b in buf {
                match grammar.step(b) {
                    Step::Continue => consumed += 1,
                    Step::Complete => {
                        consumed += 1;
                        outcome = Some(Ok(()));
                        break;
                    }
                    Step::Boundary => {
                        outcome = Some(Ok(()));
                        break;
                    }
                    Step::Invalid(message) => {
                        outcome = Some(Err(message));
                        break;
                    }
                }
            }

            if let Some(out) = out.as_deref_mut() {
                out.extend_from_slice(&buf[..consumed]);
            }
            self.advance(consumed);

            match outcome {
                Some(Ok(())) => return Ok(()),
                Some(Err(message)) => return Err(self.malformed(message)),
                None => {}
            }
        }
    }

    fn advance(&mut self, n: usize) {
        self.reader.consume(n);
        self.offset += n as u64;
    }

    fn malformed(&self, message: impl Into<String>) -> BakeError {
        BakeError::malformed(self.offset, message)
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

impl Container {
    fn closer(self) -> u8 {
        match self {
            Container::Object => b'}',
            Container::Array => b']',
        }
    }
}

/// Next token the grammar accepts outside of a scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Value,
    ValueOrClose,
    Key,
    KeyOrClose,
    Colon,
    CommaOrClose,
}

impl Expect {
    fn describe(self) -> &'static str {
        match self {
            Expect::Value => "a value",
            Expect::ValueOrClose => "a value or ']'",
            Expect::Key => "an object key",
            Expect::KeyOrClose => "an object key or '}'",
            Expect::Colon => "':'",
            Expect::CommaOrClose => "',' or a closing bracket",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Backslash,
    Unicode(u8),
}

/// Positions inside a JSON number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Num {
    Minus,
    Zero,
    Int,
    Dot,
    Frac,
    Exp,
    ExpSign,
    ExpDigits,
}

impl Num {
    fn next(self, b: u8) -> Option<Num> {
        match (self, b) {
            (Num::Minus, b'0') => Some(Num::Zero),
            (Num::Minus | Num::Int, b'1'..=b'9') => Some(Num::Int),
            (Num::Int, b'0') => Some(Num::Int),
            (Num::Zero | Num::Int, b'.') => Some(Num::Dot),
            (Num::Dot | Num::Frac, b'0'..=b'9') => Some(Num::Frac),
            (Num::Zero | Num::Int | Num::Frac, b'e' | b'E') => Some(Num::Exp),
            (Num::Exp, b'+' | b'-') => Some(Num::ExpSign),
            (Num::Exp | Num::ExpSign | Num::ExpDigits, b'0'..=b'9') => Some(Num::ExpDigits),
            _ => None,
        }
    }

    fn is_complete(self) -> bool {
        matches!(self, Num::Zero | Num::Int | Num::Frac | Num::ExpDigits)
    }
}

#[derive(Debug, Clone, Copy)]
enum Lexeme {
    Between,
    Str { key: bool, escape: Escape, utf8_pending: u8 },
    Literal(&'static [u8]),
    Number(Num),
}

enum Step {
    /// Byte consumed, value still open
    Continue,
    /// Byte consumed and it closed the value
    Complete,
    /// Value ended before this byte, which is left unconsumed
    Boundary,
    Invalid(String),
}

/// Byte-at-a-time validator for a single JSON value.
///
/// Holds only the container stack and the current lexeme, so memory use is
/// bounded by nesting depth rather than value size.
struct ValueGrammar {
    stack: Vec<Container>,
    expect: Expect,
    lexeme: Lexeme,
}

impl ValueGrammar {
    fn new() -> Self {
        ValueGrammar {
            stack: Vec::new(),
            expect: Expect::Value,
            lexeme: Lexeme::Between,
        }
    }

    /// A top-level number has no terminator of its own
    fn ends_at_eof(&self) -> bool {
        self.stack.is_empty() && matches!(self.lexeme, Lexeme::Number(num) if num.is_complete())
    }

    fn step(&mut self, b: u8) -> Step {
        match self.lexeme {
            Lexeme::Between => self.between(b),
            Lexeme::Str {
                key,
                escape,
                utf8_pending,
            } => self.string_byte(key, escape, utf8_pending, b),
            Lexeme::Literal(rest) => {
                if rest.first() != Some(&b) {
                    return Step::Invalid(format!("invalid literal, found {:?}", b as char));
                }
                if rest.len() == 1 {
                    self.lexeme = Lexeme::Between;
                    self.value_done()
                } else {
                    self.lexeme = Lexeme::Literal(&rest[1..]);
                    Step::Continue
                }
            }
            Lexeme::Number(num) => match num.next(b) {
                Some(next) => {
                    self.lexeme = Lexeme::Number(next);
                    Step::Continue
                }
                None if num.is_complete() => {
                    self.lexeme = Lexeme::Between;
                    match self.value_done() {
                        Step::Complete => Step::Boundary,
                        _ => self.between(b),
                    }
                }
                None => Step::Invalid(format!("invalid number, found {:?}", b as char)),
            },
        }
    }

    fn between(&mut self, b: u8) -> Step {
        if is_whitespace(b) {
            return Step::Continue;
        }

        let wants_value = matches!(self.expect, Expect::Value | Expect::ValueOrClose);
        let wants_key = matches!(self.expect, Expect::Key | Expect::KeyOrClose);
        match b {
            b'"' if wants_value || wants_key => {
                self.lexeme = Lexeme::Str {
                    key: wants_key,
                    escape: Escape::None,
                    utf8_pending: 0,
                };
            }
            b'{' if wants_value => {
                self.stack.push(Container::Object);
                self.expect = Expect::KeyOrClose;
            }
            b'[' if wants_value => {
                self.stack.push(Container::Array);
                self.expect = Expect::ValueOrClose;
            }
            b'}' | b']' => return self.close(b),
            b',' if self.expect == Expect::CommaOrClose => {
                self.expect = match self.stack.last() {
                    Some(Container::Object) => Expect::Key,
                    _ => Expect::Value,
                };
            }
            b':' if self.expect == Expect::Colon => self.expect = Expect::Value,
            b't' if wants_value => self.lexeme = Lexeme::Literal(b"rue"),
            b'f' if wants_value => self.lexeme = Lexeme::Literal(b"alse"),
            b'n' if wants_value => self.lexeme = Lexeme::Literal(b"ull"),
            b'-' if wants_value => self.lexeme = Lexeme::Number(Num::Minus),
            b'0' if wants_value => self.lexeme = Lexeme::Number(Num::Zero),
            b'1'..=b'9' if wants_value => self.lexeme = Lexeme::Number(Num::Int),
            _ => return self.unexpected(b),
        }
        Step::Continue
    }

    fn close(&mut self, b: u8) -> Step {
        let allowed = match self.expect {
            Expect::CommaOrClose => true,
            Expect::KeyOrClose => b == b'}',
            Expect::ValueOrClose => b == b']',
            _ => false,
        };
        if !allowed {
            return self.unexpected(b);
        }

        match self.stack.pop() {
            Some(open) if open.closer() == b => self.value_done(),
            Some(open) => Step::Invalid(format!(
                "mismatched bracket: expected {:?}, found {:?}",
                open.closer() as char,
                b as char
            )),
            None => self.unexpected(b),
        }
    }

    fn string_byte(&mut self, key: bool, escape: Escape, utf8_pending: u8, b: u8) -> Step {
        let escape = match escape {
            Escape::Backslash => match b {
                b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Escape::None,
                b'u' => Escape::Unicode(4),
                _ => return Step::Invalid(format!("invalid escape {:?}", b as char)),
            },
            Escape::Unicode(remaining) => {
                if !b.is_ascii_hexdigit() {
                    return Step::Invalid(format!("invalid unicode escape, found {:?}", b as char));
                }
                if remaining == 1 {
                    Escape::None
                } else {
                    Escape::Unicode(remaining - 1)
                }
            }
            Escape::None if utf8_pending > 0 => {
                if b & 0xC0 != 0x80 {
                    return Step::Invalid("invalid UTF-8 in string".to_string());
                }
                self.lexeme = Lexeme::Str {
                    key,
                    escape: Escape::None,
                    utf8_pending: utf8_pending - 1,
                };
                return Step::Continue;
            }
            Escape::None => match b {
                b'"' => {
                    self.lexeme = Lexeme::Between;
                    if key {
                        self.expect = Expect::Colon;
                        return Step::Continue;
                    }
                    return self.value_done();
                }
                b'\\' => Escape::Backslash,
                0x00..=0x1F => return Step::Invalid("control character in string".to_string()),
                0x80..=0xFF => {
                    let pending = match b {
                        0xC2..=0xDF => 1,
                        0xE0..=0xEF => 2,
                        0xF0..=0xF4 => 3,
                        _ => return Step::Invalid("invalid UTF-8 in string".to_string()),
                    };
                    self.lexeme = Lexeme::Str {
                        key,
                        escape: Escape::None,
                        utf8_pending: pending,
                    };
                    return Step::Continue;
                }
                _ => Escape::None,
            },
        };

        self.lexeme = Lexeme::Str {
            key,
            escape,
            utf8_pending: 0,
        };
        Step::Continue
    }

    fn value_done(&mut self) -> Step {
        self.expect = Expect::CommaOrClose;
        if self.stack.is_empty() {
            Step::Complete
        } else {
            Step::Continue
        }
    }

    fn unexpected(&self, b: u8) -> Step {
        Step::Invalid(format!(
            "expected {}, found {:?}",
            self.expect.describe(),
            b as char
        ))
    }
}

fn read_error(err: std::io::Error) -> BakeError {
    BakeError::ArchiveCorrupt(format!("failed to read archive entry: {err}"))
}
