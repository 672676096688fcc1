// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! Typed view of core event annotations

use crate::parse::Annotations;

use super::Error;

/// Event source identifier of the core's integer pipeline
pub const SOURCE_CORE: u64 = 0;

/// Operand mux select code for a general purpose register
pub const OP_SELECT_GPR: u64 = 1;

/// Operand mux select code for a CSR
pub const OP_SELECT_CSR: u64 = 8;

/// Decode-stage signals of one core event
///
/// This is the fixed schema behind the open [`Annotations`] map for records
/// originating from the integer pipeline. Every field is required; keys the
/// schema does not name are ignored. Register fields carry the raw 5-bit
/// index, boolean signals arrive as `0`/`1`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreEvent {
    /// The pipeline is stalled this cycle
    pub stall: bool,
    /// The instruction raised an exception
    pub exception: bool,
    /// The instruction is handed to the FPU subsystem or sequencer
    pub fpu_offload: bool,
    /// The offloaded instruction targets the sequencer
    pub is_seq_insn: bool,
    /// Operand a mux select
    pub opa_select: u64,
    /// Operand b mux select
    pub opb_select: u64,
    pub rs1: u8,
    pub rs2: u8,
    pub rd: u8,
    /// Operand a value
    pub opa: u64,
    /// Operand b value; carries the read value for CSR reads
    pub opb: u64,
    pub csr_addr: u16,
    pub is_load: bool,
    pub is_store: bool,
    pub is_branch: bool,
    /// Access size, see [`LsSize`][crate::types::LsSize]
    pub ls_size: u8,
    /// ALU result; the memory address for loads and stores, the branch
    /// decision for branches
    pub alu_result: u64,
    /// The instruction writes `rd` through the regular datapath
    pub write_rd: bool,
    /// Value written through the regular datapath
    pub writeback: u64,
    /// Second register file read port; the stored value for stores
    pub gpr_rdata_1: u64,
    /// A previously issued load retires this cycle
    pub retire_load: bool,
    /// Destination register of the retiring load
    pub lsu_rd: u8,
    /// Value the retiring load writes back
    pub ld_result_32: u64,
    /// An accelerator (FPU) result retires this cycle
    pub retire_acc: bool,
    /// Destination register of the retiring accelerator result
    pub acc_pid: u8,
    /// Value the retiring accelerator result writes back
    pub acc_pdata_32: u64,
    /// PC of the next cycle
    pub pc_d: u64,
}

impl CoreEvent {
    /// Extract a core event from a decoded annotation map
    ///
    /// Fails with [`Error::UnknownEventSource`] for any source other than
    /// the core pipeline and with [`Error::MissingKey`] if a required field
    /// is absent.
    pub fn from_annotations(annotations: &Annotations) -> Result<Self, Error> {
        let require =
            |key: &'static str| annotations.get(key).ok_or(Error::MissingKey(key));
        let flag = |key: &'static str| require(key).map(|v| v != 0);

        let source = require("source")?;
        if source != SOURCE_CORE {
            return Err(Error::UnknownEventSource(source));
        }

        Ok(Self {
            stall: flag("stall")?,
            exception: flag("exception")?,
            fpu_offload: flag("fpu_offload")?,
            is_seq_insn: flag("is_seq_insn")?,
            opa_select: require("opa_select")?,
            opb_select: require("opb_select")?,
            rs1: require("rs1")? as u8,
            rs2: require("rs2")? as u8,
            rd: require("rd")? as u8,
            opa: require("opa")?,
            opb: require("opb")?,
            csr_addr: (require("csr_addr")? & 0xFFF) as u16,
            is_load: flag("is_load")?,
            is_store: flag("is_store")?,
            is_branch: flag("is_branch")?,
            ls_size: (require("ls_size")? & 0x3) as u8,
            alu_result: require("alu_result")?,
            write_rd: flag("write_rd")?,
            writeback: require("writeback")?,
            gpr_rdata_1: require("gpr_rdata_1")?,
            retire_load: flag("retire_load")?,
            lsu_rd: require("lsu_rd")? as u8,
            ld_result_32: require("ld_result_32")?,
            retire_acc: flag("retire_acc")?,
            acc_pid: require("acc_pid")? as u8,
            acc_pdata_32: require("acc_pdata_32")?,
            pc_d: require("pc_d")?,
        })
    }
}
