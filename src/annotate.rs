// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! Event annotation
//!
//! This module provides the [`Annotator`], the state machine at the heart of
//! the crate. It consumes raw trace records one at a time, produces the
//! annotated output line for each (or `None` for lines carrying no
//! information) and keeps track of in-flight load write-backs, offloaded
//! instructions and the currently open performance [`Segment`].
//!
//! An annotator processes the records of a single core in cycle order.
//! After the last record, [`finish`][Annotator::finish] closes the final
//! segment and yields the end-of-run [`Report`].
//!
//! # Example
//!
//! ```
//! use snitch_trace::annotate;
//!
//! let mut annotator = annotate::builder().build();
//! for line in [
//!     "1000 10 3 0x80010000 mv a1, a0",
//!     "2000 20 3 0x80010004 ret",
//! ] {
//!     if let Some(annotated) = annotator.process_line(line).unwrap() {
//!         println!("{annotated}");
//!     }
//! }
//! let report = annotator.finish();
//! assert_eq!(report.segments.len(), 1);
//! ```

pub mod offload;

mod event;

#[cfg(test)]
mod tests;

pub use event::CoreEvent;

use core::fmt;
use core::mem;

use std::collections::VecDeque;

use crate::literal::{self, IntWidth};
use crate::parse::{Annotations, TraceRecord};
use crate::perf::{Report, Segment};
use crate::types::{self, LsSize};
use crate::{Options, check, parse};

use event::{OP_SELECT_CSR, OP_SELECT_GPR};
use offload::OffloadTracker;

/// Annotation errors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The raw record or its annotation blob could not be parsed
    Parse(parse::Error),
    /// The annotation declares an event source this version does not support
    ///
    /// Only core events (source `0`) are supported; the FPU subsystem (`1`)
    /// and sequencer (`2`) sources are reserved.
    UnknownEventSource(u64),
    /// A required key is missing from a core event annotation
    MissingKey(&'static str),
    /// A load retired into a register with no issue in flight
    ///
    /// Fatal unless [`Options::permissive`] downgrades it to a warning.
    WritebackWithoutIssue { cycle: u64, reg: u8 },
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::UnknownEventSource(s) => write!(f, "unknown trace event source {s}"),
            Self::MissingKey(k) => write!(f, "annotation is missing required key '{k}'"),
            Self::WritebackWithoutIssue { cycle, reg } => write!(
                f,
                "in cycle {cycle}, LSU attempts writeback to {}, but none in flight",
                types::gpr_name(*reg),
            ),
        }
    }
}

impl From<parse::Error> for Error {
    fn from(e: parse::Error) -> Self {
        Self::Parse(e)
    }
}

/// Create a new [`Builder`] for [`Annotator`]s
pub fn builder() -> Builder {
    Default::default()
}

/// Builder for [`Annotator`]
#[derive(Copy, Clone, Debug, Default)]
pub struct Builder {
    options: Options,
}

impl Builder {
    /// Create a new builder for an [`Annotator`]
    pub fn new() -> Self {
        Default::default()
    }

    /// Build the [`Annotator`] with the given [`Options`]
    pub fn with_options(self, options: Options) -> Self {
        Self { options }
    }

    /// Build the [`Annotator`]
    pub fn build(self) -> Annotator {
        Annotator {
            options: self.options,
            gpr_pending: Default::default(),
            fpr_pending: Default::default(),
            offloads: Default::default(),
            closed: Vec::new(),
            current: Segment::default(),
            started: false,
            last_time: None,
        }
    }
}

/// Trace annotation state machine
///
/// All mutable decode state lives here: one in-flight write-back queue per
/// register, the offload bookkeeping and the performance segments. Records
/// are fed in through [`process_line`][Self::process_line] (or
/// [`process_record`][Self::process_record] for pre-parsed records) in cycle
/// order.
#[derive(Debug)]
pub struct Annotator {
    options: Options,
    /// Issue cycles of in-flight loads, one FIFO per integer register
    gpr_pending: [VecDeque<u64>; 32],
    /// Issue cycles of in-flight loads, one FIFO per float register
    fpr_pending: [VecDeque<u64>; 32],
    offloads: OffloadTracker,
    closed: Vec<Segment>,
    current: Segment,
    started: bool,
    /// Time and cycle of the last displayed line
    last_time: Option<(u64, u64)>,
}

impl Annotator {
    /// Process one line of trace text
    ///
    /// Returns the annotated output line, or `None` if the line carries no
    /// information (consecutive stall or offload cycles) and is suppressed.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>, Error> {
        let record = TraceRecord::parse(line)?;
        self.process_record(&record)
    }

    /// Process one parsed [`TraceRecord`]
    pub fn process_record(&mut self, record: &TraceRecord) -> Result<Option<String>, Error> {
        if !self.started {
            self.current.start = record.cycle;
            self.started = true;
        }
        let show_time = self.last_time != Some((record.time, record.cycle));

        let Some(blob) = record.annotation else {
            // Vanilla record: no behavioral effect on any state
            self.last_time = Some((record.time, record.cycle));
            return Ok(Some(self.render(record, show_time, record.pc, record.insn, None)));
        };

        let annotations = Annotations::parse(blob)?;
        let event = CoreEvent::from_annotations(&annotations)?;
        let pc = record
            .pc_value()
            .ok_or_else(|| parse::Error::MalformedLine(record.pc.into()))?;

        let annotation = self.annotate_core(&event, record.cycle, pc)?;

        if event.fpu_offload {
            self.current.fseq_offloads += 1;
            self.offloads.record(pc, self.closed.len(), event.is_seq_insn);
        }
        let (pc_text, insn) = if event.stall || event.fpu_offload {
            // Attributed to the eventual issuing record
            ("", "")
        } else {
            self.current.issues += 1;
            (record.pc, record.insn)
        };

        if insn.is_empty() && annotation.is_empty() {
            return Ok(None);
        }
        self.last_time = Some((record.time, record.cycle));
        Ok(Some(self.render(record, show_time, pc_text, insn, Some(&annotation))))
    }

    /// Close the final segment and produce the end-of-run [`Report`]
    ///
    /// The last displayed cycle serves as the final segment's end. All
    /// segments are evaluated and the consistency scan is run.
    pub fn finish(mut self) -> Report {
        if let Some((_, cycle)) = self.last_time {
            self.current.end = cycle;
        }
        let mut segments = self.closed;
        segments.push(self.current);
        for segment in &mut segments {
            segment.evaluate();
        }
        let diagnostics = check::run(&self.gpr_pending, &self.fpr_pending, &self.offloads);
        Report::new(segments, diagnostics, self.options.all_counters)
    }

    /// Annotate a core event, updating the tracking state
    ///
    /// Produces the comma-joined annotation items in datapath order.
    fn annotate_core(&mut self, event: &CoreEvent, cycle: u64, pc: u64) -> Result<String, Error> {
        let mut items = Vec::new();
        let lit = |value| literal::integer(value, IntWidth::Word, false);

        if self.options.offload_annotations && event.fpu_offload {
            let target = if event.is_seq_insn { "FSEQ" } else { "FPSS" };
            items.push(format!("{target} <~~ 0x{pc:08x}"));
        }
        if !event.stall && event.exception {
            items.push("exception".into());
        }
        // Regular linear datapath operation
        if !(event.stall || event.fpu_offload) {
            if event.opa_select == OP_SELECT_GPR && event.rs1 != 0 {
                items.push(format!("{:<3} = {}", types::gpr_name(event.rs1), lit(event.opa)));
            }
            if event.opb_select == OP_SELECT_GPR && event.rs2 != 0 {
                items.push(format!("{:<3} = {}", types::gpr_name(event.rs2), lit(event.opb)));
            }
            // CSRs are always read through operand b
            if event.opb_select == OP_SELECT_CSR {
                let name = types::csr_name(event.csr_addr);
                if event.csr_addr == types::MCYCLE {
                    // The read delimits measurement segments
                    let mut finished =
                        mem::replace(&mut self.current, Segment::opened_at(event.opb + 2));
                    finished.end = event.opb;
                    tracing::debug!("section {} ends at cycle {}", self.closed.len(), finished.end);
                    self.closed.push(finished);
                }
                items.push(format!("{name} = {}", lit(event.opb)));
            }
            if event.is_load {
                self.current.loads += 1;
                self.gpr_pending[usize::from(event.rd & 0x1F)].push_back(cycle);
                items.push(format!(
                    "{:<3} <~~ {}[{}]",
                    types::gpr_name(event.rd),
                    LsSize::from(event.ls_size),
                    self.address(event.alu_result),
                ));
            } else if event.is_store {
                self.current.stores += 1;
                items.push(format!(
                    "{} ~~> {}[{}]",
                    lit(event.gpr_rdata_1),
                    LsSize::from(event.ls_size),
                    self.address(event.alu_result),
                ));
            } else if event.is_branch {
                let taken = if event.alu_result != 0 { "taken" } else { "not taken" };
                items.push(taken.into());
            }
            // Datapath (ALU / jump target / bypass) register writeback
            if event.write_rd && event.rd != 0 {
                items.push(format!(
                    "(wrb) {:<3} <-- {}",
                    types::gpr_name(event.rd),
                    lit(event.writeback),
                ));
            }
        }
        // Retired loads and accelerator results can come back on stalls and
        // during other operations
        if event.retire_load && event.lsu_rd != 0 {
            match self.gpr_pending[usize::from(event.lsu_rd & 0x1F)].pop_front() {
                Some(issued) => self.current.load_latency += cycle.saturating_sub(issued),
                None => {
                    let err = Error::WritebackWithoutIssue {
                        cycle,
                        reg: event.lsu_rd,
                    };
                    if self.options.permissive {
                        tracing::warn!("{err}");
                    } else {
                        return Err(err);
                    }
                }
            }
            items.push(format!(
                "(lsu) {:<3} <-- {}",
                types::gpr_name(event.lsu_rd),
                lit(event.ld_result_32),
            ));
        }
        if event.retire_acc && event.acc_pid != 0 {
            items.push(format!(
                "(acc) {:<3} <-- {}",
                types::gpr_name(event.acc_pid),
                lit(event.acc_pdata_32),
            ));
        }
        // Any kind of PC change: branch, jump, trap
        if !event.stall && event.pc_d != pc.wrapping_add(4) {
            items.push(format!("goto {}", lit(event.pc_d)));
        }
        Ok(items.join(", "))
    }

    /// Render a load/store address
    fn address(&self, value: u64) -> String {
        literal::integer(value, IntWidth::Word, !self.options.decimal_addresses)
    }

    /// Render one output line
    fn render(
        &self,
        record: &TraceRecord,
        show_time: bool,
        pc: &str,
        insn: &str,
        annotation: Option<&str>,
    ) -> String {
        let (time, cycle) = if show_time {
            (record.time.to_string(), record.cycle.to_string())
        } else {
            (String::new(), String::new())
        };
        let base = format!(
            "{time:>8} {cycle:>8} {:>8} {pc:>10} {insn:<30}",
            record.privilege.to_string(),
        );
        match annotation {
            Some(annotation) => format!("{base} #; {annotation}"),
            None => base,
        }
    }
}
