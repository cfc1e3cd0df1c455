//! Tokenizer for the model text file format.
//!
//! The grammar is whitespace-insensitive except where tokens are glued
//! together without a separating space (`(0 0.75 -2)` has no space before
//! the closing paren) — so reading proceeds token-by-token rather than
//! line-by-line, mirroring the original's `fscanf`-based reader: each
//! numeric or single-character conversion consumes leading whitespace and
//! then exactly the characters that belong to it, nothing more.

use crate::error::{MiniLightError, Result};
use crate::vector3::Vector3;

pub struct ModelReader {
    bytes: Vec<u8>,
    pos: usize,
}

impl ModelReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }

    /// Skips whitespace and consumes exactly one non-whitespace byte.
    fn next_byte(&mut self) -> Option<u8> {
        self.skip_whitespace();
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Whether any non-whitespace content remains — used to decide whether
    /// the triangle list continues or the model file has ended.
    pub fn has_more(&mut self) -> bool {
        self.skip_whitespace();
        self.pos < self.bytes.len()
    }

    /// Checks the model format identifier literally, with no leading
    /// whitespace skip: the file must begin with exactly this text.
    /// A short read or a mismatch anywhere are both reported the same way,
    /// as an unrecognised format, matching the original's "matched char
    /// count vs literal length" check.
    pub fn check_format_id(&mut self, id: &str) -> Result<()> {
        let id_bytes = id.as_bytes();
        let end = (self.pos + id_bytes.len()).min(self.bytes.len());
        let matched = &self.bytes[self.pos..end];
        if matched == id_bytes {
            self.pos = end;
            Ok(())
        } else {
            Err(MiniLightError::UnrecognizedFormat)
        }
    }

    pub fn next_i32(&mut self) -> Result<i32> {
        self.skip_whitespace();
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if self.pos == start || (self.pos == start + 1 && !self.bytes[start].is_ascii_digit()) {
            return Err(if start >= self.bytes.len() {
                MiniLightError::Truncated
            } else {
                MiniLightError::InvalidModel("expected integer".into())
            });
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| MiniLightError::InvalidModel("expected integer".into()))
    }

    /// Reads a real number as single precision, then widens — the model
    /// format stores `float` values, and parsing through `f32` reproduces
    /// the rounding the original renderer actually sees.
    pub fn next_f64(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let start = self.pos;
        if matches!(self.bytes.get(self.pos), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if self.bytes.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                self.pos += 1;
            }
        }
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.bytes.get(self.pos), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                while self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit) {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }

        if self.pos == start {
            return Err(if start >= self.bytes.len() {
                MiniLightError::Truncated
            } else {
                MiniLightError::InvalidModel("expected real number".into())
            });
        }

        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .map(|f| f as f64)
            .ok_or_else(|| MiniLightError::InvalidModel("expected real number".into()))
    }

    /// Reads a `"(" real real real ")"` vector, parens glued or spaced.
    pub fn next_vector(&mut self) -> Result<Vector3> {
        match self.next_byte() {
            Some(b'(') => {}
            Some(_) => return Err(MiniLightError::InvalidModel("expected '('".into())),
            None => return Err(MiniLightError::Truncated),
        }
        let x = self.next_f64()?;
        let y = self.next_f64()?;
        let z = self.next_f64()?;
        match self.next_byte() {
            Some(b')') => {}
            Some(_) => return Err(MiniLightError::InvalidModel("expected ')'".into())),
            None => return Err(MiniLightError::Truncated),
        }
        Ok(Vector3::new(x, y, z))
    }
}
