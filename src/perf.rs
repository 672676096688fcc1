// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! Performance segments and derived metrics
//!
//! A [`Segment`] accumulates counters over a contiguous cycle range. The
//! stream is partitioned into segments by reads of the `mcycle` CSR: such a
//! read closes the open segment and opens the next one. Derived metrics are
//! computed once per segment by [`evaluate`][Segment::evaluate] after the
//! stream ends, and the whole run is summarized in a [`Report`].


use core::fmt;

use std::io;

use crate::check::Diagnostic;
use crate::literal::{self, IntWidth};

/// Counters that only serve to compute derived metrics
///
/// These are omitted from the printed report by default but always included
/// in the structured dump.
pub const HOUSEKEEPING_COUNTERS: &[&str] = &[
    "start",
    "end",
    "snitch_issues",
    "snitch_load_latency",
    "snitch_fseq_offloads",
];

/// Number of significant digits for derived metrics in the printed report
const METRIC_DIGITS: usize = 4;

/// A single counter value
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(u64),
    Float(f64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => f.pad(&literal::integer(*v, IntWidth::Word, false)),
            Self::Float(v) => f.pad(&literal::format_float(*v, METRIC_DIGITS)),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
        }
    }
}

/// A performance measurement segment
///
/// Counters default to zero. The raw counters are bumped by the
/// [annotator][crate::annotate::Annotator] while the segment is open; the
/// derived metrics are filled in by [`evaluate`][Self::evaluate] once `end`
/// is known.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segment {
    /// First cycle of the measured range
    pub start: u64,
    /// Last cycle of the measured range
    pub end: u64,
    /// Loads issued
    pub loads: u64,
    /// Stores issued
    pub stores: u64,
    /// Instructions issued by the integer pipeline
    pub issues: u64,
    /// Accumulated issue-to-retirement latency over all retired loads
    pub load_latency: u64,
    /// Instructions offloaded to the FPU subsystem or sequencer
    pub fseq_offloads: u64,
    /// Cycles spanned, `end - start + 1`
    pub cycles: u64,
    /// Average load retirement latency
    pub avg_load_latency: f64,
    /// Issued instructions per cycle
    pub occupancy: f64,
    /// Offloaded instructions relative to everything leaving the pipeline
    pub fseq_rel_offloads: f64,
}

impl Segment {
    /// Create a segment measuring from the given start cycle
    pub fn opened_at(start: u64) -> Self {
        Self {
            start,
            ..Default::default()
        }
    }

    /// Compute the derived metrics
    ///
    /// Ratios with a zero denominator evaluate to zero; these are
    /// descriptive statistics, not invariants.
    pub fn evaluate(&mut self) {
        self.cycles = self.end.saturating_sub(self.start) + 1;
        self.avg_load_latency = safe_div(self.load_latency as f64, self.loads as f64);
        self.occupancy = safe_div(self.issues as f64, self.cycles as f64);
        self.fseq_rel_offloads = safe_div(
            self.fseq_offloads as f64,
            (self.issues + self.fseq_offloads) as f64,
        );
    }

    /// All counters in report order, under their reported names
    pub fn entries(&self) -> [(&'static str, Value); 11] {
        [
            ("start", Value::Int(self.start)),
            ("end", Value::Int(self.end)),
            ("snitch_loads", Value::Int(self.loads)),
            ("snitch_stores", Value::Int(self.stores)),
            ("snitch_issues", Value::Int(self.issues)),
            ("snitch_load_latency", Value::Int(self.load_latency)),
            ("snitch_fseq_offloads", Value::Int(self.fseq_offloads)),
            ("cycles", Value::Int(self.cycles)),
            ("snitch_avg_load_latency", Value::Float(self.avg_load_latency)),
            ("snitch_occupancy", Value::Float(self.occupancy)),
            ("snitch_fseq_rel_offloads", Value::Float(self.fseq_rel_offloads)),
        ]
    }
}

/// Segments serialize as ordered name/value mappings, housekeeping included
impl serde::Serialize for Segment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, value) in entries {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// End-of-run report
///
/// Produced by [`Annotator::finish`][crate::annotate::Annotator::finish].
/// [`Display`][fmt::Display] renders the per-segment metrics section of the
/// output; the structured dump is available via [`dump`][Self::dump].
#[derive(Clone, Debug)]
pub struct Report {
    /// All segments of the run, in stream order, evaluated
    pub segments: Vec<Segment>,
    /// Findings of the end-of-stream consistency scan
    pub diagnostics: Vec<Diagnostic>,
    all_counters: bool,
}

impl Report {
    pub(crate) fn new(
        segments: Vec<Segment>,
        diagnostics: Vec<Diagnostic>,
        all_counters: bool,
    ) -> Self {
        Self {
            segments,
            diagnostics,
            all_counters,
        }
    }

    /// Whether the consistency scan came up empty
    ///
    /// An inconsistent final state usually means the trace is incomplete and
    /// the metrics are to be taken with a grain of salt.
    pub fn is_consistent(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Write the full segment list as JSON
    ///
    /// Includes the housekeeping counters regardless of the report's
    /// configuration.
    pub fn dump(&self, sink: impl io::Write) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(sink, &self.segments)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            writeln!(
                f,
                "Performance metrics for section {idx} @ ({}, {}):",
                segment.start, segment.end,
            )?;
            for (name, value) in segment.entries() {
                if !self.all_counters && HOUSEKEEPING_COUNTERS.contains(&name) {
                    continue;
                }
                writeln!(f, "{name:<40}{value:>10}")?;
            }
        }
        Ok(())
    }
}

/// Division defaulting to zero for a zero divisor
pub fn safe_div(dividend: f64, divisor: f64) -> f64 {
    if divisor == 0.0 {
        0.0
    } else {
        dividend / divisor
    }
}
