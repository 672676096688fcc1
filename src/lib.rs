// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! # Annotator for Snitch core execution traces
//!
//! The Snitch core's RTL testbench emits one raw trace record per cycle,
//! carrying the retired instruction's disassembly and a blob of decode-stage
//! signals. This crate turns such a stream into a human-readable annotated
//! trace and computes per-segment performance metrics along the way. A
//! measurement segment spans the cycles between two reads of the `mcycle`
//! CSR; metrics such as the average load latency and the issue occupancy are
//! derived for each segment once the stream ends.
//!
//! This crate is not concerned with how the trace is captured or where it is
//! read from; it consumes lines of text and produces lines of text plus a
//! [`Report`][perf::Report].
//!
//! See [annotate] for the per-record state machine, [parse] for the record
//! format and [perf] for the metrics.
//!
//! # Example
//!
//! ```
//! use snitch_trace::annotate;
//!
//! let mut annotator = annotate::builder().build();
//! let line = "105 12 3 0x80010000 addi sp, sp, -32";
//! let annotated = annotator.process_line(line).unwrap();
//! assert!(annotated.is_some());
//!
//! let report = annotator.finish();
//! assert!(report.is_consistent());
//! ```

pub mod annotate;
pub mod check;
pub mod literal;
pub mod parse;
pub mod perf;
pub mod types;

pub use annotate::Annotator;

/// Annotator options
///
/// Bundles the knobs a driver exposes. The [`Default`] options reproduce the
/// plain annotation mode: offloads are not marked on their own line, small
/// addresses render as hex and housekeeping counters are omitted from the
/// printed report.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Options {
    /// Annotate FPU subsystem and sequencer offloads on the issuing line
    pub offload_annotations: bool,
    /// Render small load/store addresses as signed decimals instead of hex
    pub decimal_addresses: bool,
    /// Include housekeeping counters in the printed report
    pub all_counters: bool,
    /// Downgrade state-tracking inconsistencies from fatal errors to warnings
    pub permissive: bool,
}
