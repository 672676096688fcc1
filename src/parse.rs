// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! Parsing of raw trace records
//!
//! The testbench emits one record per line in the form
//!
//! ```text
//! <time> <cycle> <priv> <pc-hex> <insn-text> [#; {'<key>': 0x<hex>, ...}]
//! ```
//!
//! [`TraceRecord::parse`] splits a line into its fields, borrowing from the
//! input. The optional annotation blob after the `#;` marker is decoded
//! separately by [`Annotations::parse`] into a key/value map; the key
//! vocabulary is enforced later by the [annotator][crate::annotate] so that
//! unknown keys survive this layer.


use core::fmt;

use std::collections::HashMap;

use crate::types::Privilege;

/// Parsing errors
///
/// Both variants carry the offending input. A record that does not parse
/// leaves the decode state untrustworthy, so these errors are always fatal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The line does not match the record pattern
    MalformedLine(String),
    /// A key/value pair in the annotation blob cannot be decoded
    MalformedAnnotation(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine(l) => write!(f, "not a valid trace record: {l}"),
            Self::MalformedAnnotation(a) => write!(f, "not a valid annotation: {a}"),
        }
    }
}

/// A single raw trace record
///
/// Text fields borrow from the input line. The PC is kept as text: the RTL
/// may dump `z` states for it before the core leaves reset, and such records
/// must still pass through as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceRecord<'l> {
    /// Simulation timestamp
    pub time: u64,
    /// Cycle index
    pub cycle: u64,
    /// Privilege level the record was traced under
    pub privilege: Privilege,
    /// Program counter as dumped, `0x`-prefixed
    pub pc: &'l str,
    /// Disassembled instruction text
    pub insn: &'l str,
    /// Raw annotation blob, if the record carries one
    pub annotation: Option<&'l str>,
}

impl<'l> TraceRecord<'l> {
    /// Parse a record from one line of trace text
    pub fn parse(line: &'l str) -> Result<Self, Error> {
        let line = line.trim();
        let malformed = || Error::MalformedLine(line.into());

        let (head, annotation) = match line.split_once("#;") {
            Some((head, blob)) => (head, Some(blob.trim())),
            None => (line, None),
        };

        let (time, rest) = split_field(head).ok_or_else(malformed)?;
        let time = time.parse().map_err(|_| malformed())?;
        let (cycle, rest) = split_field(rest).ok_or_else(malformed)?;
        let cycle = cycle.parse().map_err(|_| malformed())?;
        let (privilege, rest) = split_field(rest).ok_or_else(malformed)?;
        let privilege = privilege
            .parse::<u8>()
            .ok()
            .and_then(|p| Privilege::try_from(p).ok())
            .ok_or_else(malformed)?;
        let (pc, rest) = split_field(rest).ok_or_else(malformed)?;
        let digits = pc.strip_prefix("0x").ok_or_else(malformed)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit() || c == 'z') {
            return Err(malformed());
        }

        Ok(Self {
            time,
            cycle,
            privilege,
            pc,
            insn: rest.trim(),
            annotation,
        })
    }

    /// The PC as a number
    ///
    /// `None` if the dumped PC contains `z` states.
    pub fn pc_value(&self) -> Option<u64> {
        self.pc
            .strip_prefix("0x")
            .and_then(|d| u64::from_str_radix(d, 16).ok())
    }
}

/// Decoded annotation blob
///
/// Maps field names to raw values. All values are transported as hex;
/// boolean signals arrive as `0`/`1`. The map is open: keys this crate does
/// not know are preserved.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations<'l>(HashMap<&'l str, u64>);

impl<'l> Annotations<'l> {
    /// Decode an annotation blob
    ///
    /// The blob is a brace-enclosed sequence of `'key': 0xHEX` pairs.
    pub fn parse(blob: &'l str) -> Result<Self, Error> {
        let malformed = || Error::MalformedAnnotation(blob.into());

        let mut body = blob.trim();
        body = body.strip_prefix('{').unwrap_or(body);
        body = body.strip_suffix('}').unwrap_or(body);

        let mut map = HashMap::new();
        for pair in body.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once(':').ok_or_else(malformed)?;
            let key = key
                .trim()
                .strip_prefix('\'')
                .and_then(|k| k.strip_suffix('\''))
                .ok_or_else(malformed)?;
            let value = value.trim();
            let digits = value.strip_prefix("0x").unwrap_or(value);
            let value = u64::from_str_radix(digits, 16).map_err(|_| malformed())?;
            map.insert(key, value);
        }
        Ok(Self(map))
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    /// Number of decoded fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the blob contained no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split the next whitespace-delimited field off a record
fn split_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}
