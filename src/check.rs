// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! End-of-stream consistency checking
//!
//! Once the stream ends, every in-flight load should have retired and every
//! offloaded instruction should have been issued downstream. Leftovers
//! usually mean the trace was truncated. The scan runs after all output has
//! been produced and its findings are non-fatal [`Diagnostic`]s; drivers
//! should surface them (e.g. through a non-zero completion status) so that
//! automation can detect incomplete traces.

use core::fmt;

use std::collections::VecDeque;

use crate::annotate::offload::OffloadTracker;
use crate::types;

/// A consistency finding
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Diagnostic {
    /// Load transactions were still in flight for a register
    InFlightTransactions { reg: &'static str, count: usize },
    /// Sequencer instructions were recorded but never issued
    UnissuedSequencerInsns(usize),
    /// Non-sequencer offloads were never issued by the FPU subsystem
    UnissuedOffloads(usize),
    /// A sequence configuration was still being expanded
    PendingSequenceConfig { pc: u64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InFlightTransactions { reg, count } => {
                write!(f, "{count} transactions still in flight for {reg}")
            }
            Self::UnissuedSequencerInsns(count) => {
                write!(f, "{count} sequencer instructions were not issued")
            }
            Self::UnissuedOffloads(count) => {
                write!(f, "{count} unsequenced FPSS instructions were not issued")
            }
            Self::PendingSequenceConfig { pc } => {
                write!(f, "not all FPSS instructions from sequence 0x{pc:08x} were issued")
            }
        }
    }
}

/// Scan the final tracking state for loose ends
pub(crate) fn run(
    gpr_pending: &[VecDeque<u64>; 32],
    fpr_pending: &[VecDeque<u64>; 32],
    offloads: &OffloadTracker,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (index, queue) in fpr_pending.iter().enumerate() {
        if !queue.is_empty() {
            diagnostics.push(Diagnostic::InFlightTransactions {
                reg: types::fpr_name(index as u8),
                count: queue.len(),
            });
        }
    }
    for (index, queue) in gpr_pending.iter().enumerate() {
        if !queue.is_empty() {
            diagnostics.push(Diagnostic::InFlightTransactions {
                reg: types::gpr_name(index as u8),
                count: queue.len(),
            });
        }
    }

    let sequencer = offloads.unissued_sequencer();
    if sequencer > 0 {
        diagnostics.push(Diagnostic::UnissuedSequencerInsns(sequencer));
    }
    let unsequenced = offloads.unsequenced();
    if unsequenced > 0 {
        diagnostics.push(Diagnostic::UnissuedOffloads(unsequenced));
    }
    if let Some(pc) = offloads.active_config() {
        diagnostics.push(Diagnostic::PendingSequenceConfig { pc });
    }

    diagnostics
}
