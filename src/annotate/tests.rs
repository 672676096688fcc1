// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
use super::*;

use crate::check::Diagnostic;

/// Build an annotation blob with all core event keys, applying overrides
fn extras(overrides: &[(&str, u64)]) -> String {
    let mut fields: Vec<(&str, u64)> = vec![
        ("source", 0),
        ("stall", 0),
        ("exception", 0),
        ("fpu_offload", 0),
        ("is_seq_insn", 0),
        ("opa_select", 0),
        ("opb_select", 0),
        ("rs1", 0),
        ("rs2", 0),
        ("rd", 0),
        ("opa", 0),
        ("opb", 0),
        ("csr_addr", 0),
        ("is_load", 0),
        ("is_store", 0),
        ("is_branch", 0),
        ("ls_size", 0),
        ("alu_result", 0),
        ("write_rd", 0),
        ("writeback", 0),
        ("gpr_rdata_1", 0),
        ("retire_load", 0),
        ("lsu_rd", 0),
        ("ld_result_32", 0),
        ("retire_acc", 0),
        ("acc_pid", 0),
        ("acc_pdata_32", 0),
        ("pc_d", 0),
    ];
    for &(key, value) in overrides {
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => fields.push((key, value)),
        }
    }
    let body = fields
        .iter()
        .map(|(k, v)| format!("'{k}': 0x{v:x}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

/// Build a full trace line for a core event at the given time and cycle
///
/// Unless overridden, `pc_d` advances by the standard instruction width.
fn line(time: u64, cycle: u64, pc: u64, insn: &str, overrides: &[(&str, u64)]) -> String {
    let mut all = vec![("pc_d", pc + 4)];
    all.extend_from_slice(overrides);
    format!("{time} {cycle} 3 0x{pc:08x} {insn} #; {}", extras(&all))
}

fn permissive() -> Options {
    Options {
        permissive: true,
        ..Default::default()
    }
}

#[test]
fn load_retire_latency() {
    let mut annotator = builder().build();
    let issue = line(
        100,
        10,
        0x1000,
        "lw a0, 0(a1)",
        &[("is_load", 1), ("rd", 10), ("ls_size", 2), ("alu_result", 0x2000)],
    );
    let out = annotator.process_line(&issue).unwrap().unwrap();
    assert!(
        out.starts_with("     100       10        M 0x00001000 lw a0, 0(a1)"),
        "bad layout: {out:?}"
    );
    assert!(out.contains(" #; a0  <~~ Word[0x00002000]"), "{out:?}");

    let retire = line(
        150,
        15,
        0x1004,
        "mv a1, a0",
        &[("retire_load", 1), ("lsu_rd", 10), ("ld_result_32", 42)],
    );
    let out = annotator.process_line(&retire).unwrap().unwrap();
    assert!(out.contains("(lsu) a0  <-- 42"), "{out:?}");

    let report = annotator.finish();
    assert!(report.is_consistent(), "{:?}", report.diagnostics);
    assert_eq!(report.segments.len(), 1);
    let segment = &report.segments[0];
    assert_eq!(segment.load_latency, 5);
    assert_eq!(segment.loads, 1);
    assert_eq!(segment.issues, 2);
    assert_eq!(segment.avg_load_latency, 5.0);
}

#[test]
fn writeback_without_issue_is_fatal() {
    let mut annotator = builder().build();
    let retire = line(100, 10, 0x1000, "mv a1, a0", &[("retire_load", 1), ("lsu_rd", 5)]);
    assert_eq!(
        annotator.process_line(&retire),
        Err(Error::WritebackWithoutIssue { cycle: 10, reg: 5 }),
    );
}

#[test]
fn writeback_without_issue_permissive() {
    let mut annotator = builder().with_options(permissive()).build();
    let retire = line(100, 10, 0x1000, "mv a1, a0", &[("retire_load", 1), ("lsu_rd", 5)]);
    let out = annotator.process_line(&retire).unwrap().unwrap();
    // annotation still emitted, processing continues
    assert!(out.contains("(lsu) t0  <-- 0"), "{out:?}");
    let report = annotator.finish();
    assert!(report.is_consistent());
}

#[test]
fn mcycle_read_delimits_segments() {
    let mut annotator = builder().build();
    // a load left in flight must not be disturbed by the segment boundary
    let issue = line(100, 10, 0x1000, "lw a0, 0(a1)", &[("is_load", 1), ("rd", 10)]);
    annotator.process_line(&issue).unwrap();
    let read = line(
        200,
        30,
        0x1004,
        "csrr a1, mcycle",
        &[
            ("opb_select", 8),
            ("csr_addr", 0xB00),
            ("opb", 100),
            ("write_rd", 1),
            ("rd", 11),
            ("writeback", 100),
        ],
    );
    let out = annotator.process_line(&read).unwrap().unwrap();
    assert!(out.contains("mcycle = 100"), "{out:?}");

    let report = annotator.finish();
    assert_eq!(report.segments.len(), 2);
    assert_eq!(report.segments[0].start, 10);
    assert_eq!(report.segments[0].end, 100);
    assert_eq!(report.segments[1].start, 102);
    assert_eq!(report.segments[1].end, 30);
    // the pending load survives into the consistency scan untouched
    assert_eq!(
        report.diagnostics,
        vec![Diagnostic::InFlightTransactions { reg: "a0", count: 1 }],
    );
}

#[test]
fn segment_boundaries_are_idempotent() {
    let trace = [
        line(100, 10, 0x1000, "mv a0, a1", &[]),
        line(
            200,
            20,
            0x1004,
            "csrr a0, mcycle",
            &[("opb_select", 8), ("csr_addr", 0xB00), ("opb", 18)],
        ),
        line(300, 30, 0x1008, "mv a1, a0", &[]),
    ];
    let bounds = |trace: &[String]| {
        let mut annotator = builder().build();
        for l in trace {
            annotator.process_line(l).unwrap();
        }
        annotator
            .finish()
            .segments
            .iter()
            .map(|s| (s.start, s.end))
            .collect::<Vec<_>>()
    };
    let first = bounds(&trace);
    assert_eq!(first, vec![(10, 18), (20, 30)]);
    assert_eq!(first, bounds(&trace));
}

#[test]
fn other_csr_reads_do_not_split() {
    let mut annotator = builder().build();
    let read = line(
        100,
        10,
        0x1000,
        "csrr a0, mstatus",
        &[("opb_select", 8), ("csr_addr", 0x300), ("opb", 8)],
    );
    let out = annotator.process_line(&read).unwrap().unwrap();
    assert!(out.contains("mstatus = 8"), "{out:?}");
    let unknown = line(
        110,
        11,
        0x1004,
        "csrr a0, 0xfff",
        &[("opb_select", 8), ("csr_addr", 0xFFF), ("opb", 1)],
    );
    let out = annotator.process_line(&unknown).unwrap().unwrap();
    assert!(out.contains("csr@fff = 1"), "{out:?}");
    assert_eq!(annotator.finish().segments.len(), 1);
}

#[test]
fn stall_lines_are_suppressed() {
    let mut annotator = builder().build();
    let first = line(100, 10, 0x1000, "lw a0, 0(a1)", &[("is_load", 1), ("rd", 10)]);
    annotator.process_line(&first).unwrap().unwrap();

    let stalled = line(110, 11, 0x1004, "lw a0, 0(a1)", &[("stall", 1)]);
    assert_eq!(annotator.process_line(&stalled), Ok(None));

    // a retirement during a stall still shows, with pc and insn suppressed
    let retire = line(
        120,
        12,
        0x1004,
        "lw a0, 0(a1)",
        &[("stall", 1), ("retire_load", 1), ("lsu_rd", 10)],
    );
    let out = annotator
        .process_line(&retire)
        .unwrap()
        .expect("retirement carries information");
    assert!(!out.contains("lw a0, 0(a1)"), "{out:?}");
    assert!(out.contains("(lsu) a0  <-- 0"), "{out:?}");
    // suppressed lines do not count issues
    let report = annotator.finish();
    assert_eq!(report.segments[0].issues, 1);
}

#[test]
fn duplicate_time_info_is_blanked() {
    let mut annotator = builder().build();
    let first = line(100, 10, 0x1000, "mv a0, a1", &[]);
    let out = annotator.process_line(&first).unwrap().unwrap();
    assert!(out.starts_with("     100       10"), "{out:?}");

    let second = line(100, 10, 0x1004, "mv a1, a2", &[]);
    let out = annotator.process_line(&second).unwrap().unwrap();
    assert!(out.starts_with(&" ".repeat(18)), "{out:?}");

    let third = line(110, 11, 0x1008, "mv a2, a3", &[]);
    let out = annotator.process_line(&third).unwrap().unwrap();
    assert!(out.starts_with("     110       11"), "{out:?}");
}

#[test]
fn offloads_are_tracked_and_suppressed() {
    let mut annotator = builder().build();
    let offload = line(100, 10, 0x1000, "fadd.d ft0, ft1, ft2", &[("fpu_offload", 1)]);
    assert_eq!(annotator.process_line(&offload), Ok(None));
    let report = annotator.finish();
    assert_eq!(report.segments[0].fseq_offloads, 1);
    assert_eq!(report.segments[0].issues, 0);
    assert_eq!(report.diagnostics, vec![Diagnostic::UnissuedOffloads(1)]);
}

#[test]
fn offload_markers_when_requested() {
    let options = Options {
        offload_annotations: true,
        ..Default::default()
    };
    let mut annotator = builder().with_options(options).build();
    let offload = line(100, 10, 0x1000, "fadd.d ft0, ft1, ft2", &[("fpu_offload", 1)]);
    let out = annotator.process_line(&offload).unwrap().unwrap();
    assert!(out.contains("FPSS <~~ 0x00001000"), "{out:?}");
    // the instruction itself is attributed to the issuing record
    assert!(!out.contains("fadd.d"), "{out:?}");

    let sequenced = line(
        110,
        11,
        0x1004,
        "frep.o t0, 1, 0, 0",
        &[("fpu_offload", 1), ("is_seq_insn", 1)],
    );
    let out = annotator.process_line(&sequenced).unwrap().unwrap();
    assert!(out.contains("FSEQ <~~ 0x00001004"), "{out:?}");

    let report = annotator.finish();
    assert_eq!(report.segments[0].fseq_offloads, 2);
    assert_eq!(
        report.diagnostics,
        vec![
            Diagnostic::UnissuedSequencerInsns(1),
            Diagnostic::UnissuedOffloads(1),
        ],
    );
}

#[test]
fn unknown_event_sources_are_rejected() {
    for source in [1, 2, 7] {
        let mut annotator = builder().build();
        let l = line(100, 10, 0x1000, "fmv.x.w a0, ft0", &[("source", source)]);
        assert_eq!(annotator.process_line(&l), Err(Error::UnknownEventSource(source)));
    }
}

#[test]
fn missing_keys_are_rejected() {
    let mut annotator = builder().build();
    let l = "100 10 3 0x00001000 mv a0, a1 #; {'source': 0x0, 'stall': 0x0}";
    assert_eq!(annotator.process_line(l), Err(Error::MissingKey("exception")));
}

#[test]
fn vanilla_lines_pass_through() {
    let mut annotator = builder().build();
    let out = annotator.process_line("100 10 3 0x1000 ret").unwrap().unwrap();
    assert!(out.ends_with(&format!("{:<30}", "ret")), "{out:?}");
    assert!(!out.contains("#;"), "{out:?}");
    let report = annotator.finish();
    assert_eq!(report.segments[0].issues, 0);
    assert_eq!(report.segments[0].start, 10);
    assert_eq!(report.segments[0].end, 10);
}

#[test]
fn datapath_annotations() {
    let mut annotator = builder().build();
    let l = line(
        100,
        10,
        0x1000,
        "add a2, a1, a0",
        &[
            ("opa_select", 1),
            ("rs1", 11),
            ("opa", 5),
            ("opb_select", 1),
            ("rs2", 10),
            ("opb", 7),
            ("write_rd", 1),
            ("rd", 12),
            ("writeback", 12),
        ],
    );
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(out.contains("a1  = 5, a0  = 7, (wrb) a2  <-- 12"), "{out:?}");
}

#[test]
fn writeback_to_x0_is_silent() {
    let mut annotator = builder().build();
    let l = line(100, 10, 0x1000, "nop", &[("write_rd", 1), ("rd", 0)]);
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(!out.contains("(wrb)"), "{out:?}");
}

#[test]
fn store_annotation() {
    let mut annotator = builder().build();
    let l = line(
        100,
        10,
        0x1000,
        "sd a0, 0(a1)",
        &[
            ("is_store", 1),
            ("ls_size", 3),
            ("gpr_rdata_1", 7),
            ("alu_result", 0x8000),
        ],
    );
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(out.contains("7 ~~> Doub[0x00008000]"), "{out:?}");
    let report = annotator.finish();
    assert_eq!(report.segments[0].stores, 1);
}

#[test]
fn branch_annotations() {
    let mut annotator = builder().build();
    let taken = line(
        100,
        10,
        0x1000,
        "bnez a0, 8",
        &[("is_branch", 1), ("alu_result", 1), ("pc_d", 0x1008)],
    );
    let out = annotator.process_line(&taken).unwrap().unwrap();
    assert!(out.contains("taken, goto 4104"), "{out:?}");

    let not_taken = line(110, 11, 0x1008, "beqz a0, 8", &[("is_branch", 1)]);
    let out = annotator.process_line(&not_taken).unwrap().unwrap();
    assert!(out.contains("not taken"), "{out:?}");
    assert!(!out.contains("goto"), "{out:?}");
}

#[test]
fn exception_annotation() {
    let mut annotator = builder().build();
    let l = line(
        100,
        10,
        0x1000,
        "ecall",
        &[("exception", 1), ("pc_d", 0x0800)],
    );
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(out.contains("exception, goto 2048"), "{out:?}");
}

#[test]
fn decimal_addresses_option() {
    let options = Options {
        decimal_addresses: true,
        ..Default::default()
    };
    let mut annotator = builder().with_options(options).build();
    let l = line(
        100,
        10,
        0x1000,
        "lw a0, 0(a1)",
        &[("is_load", 1), ("rd", 10), ("ls_size", 2), ("alu_result", 0x20)],
    );
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(out.contains("a0  <~~ Word[32]"), "{out:?}");
}

#[test]
fn annotated_lines_keep_the_marker() {
    let mut annotator = builder().build();
    let l = line(100, 10, 0x1000, "mv a0, a1", &[]);
    let out = annotator.process_line(&l).unwrap().unwrap();
    assert!(out.ends_with(" #; "), "{out:?}");
}
