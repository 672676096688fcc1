// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace annotation driver
//!
//!     Usage: annotate [trace-file] [-o] [-s] [-a] [-p] [-d FILE]
//!
//! This program annotates a Snitch core trace read from the given file, or
//! from stdin if no file is specified, and prints per-segment performance
//! metrics after the annotated trace. Malformed input aborts with status 1.
//! An inconsistent final state (in-flight transactions or unissued offloads
//! left at the end of the trace) is reported on stderr and yields status 2,
//! so that automation can detect incomplete traces.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::PathBuf;

use snitch_trace::{Options, annotate};

fn main() {
    let matches = clap::Command::new("annotate")
        .about("Annotate a Snitch core trace and compute performance metrics")
        .arg(
            clap::arg!([trace] "Trace file to annotate (defaults to stdin)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(clap::arg!(-o --offl "Annotate FPSS and sequencer offloads when they happen in core"))
        .arg(clap::arg!(-s --saddr "Use signed decimal (not unsigned hex) for small addresses"))
        .arg(clap::arg!(-a --allkeys "Include performance metrics measured to compute others"))
        .arg(clap::arg!(-p --permissive "Ignore some state-related issues when they occur"))
        .arg(
            clap::arg!(-d --"dump-perf" <FILE> "Dump performance metrics as JSON")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options {
        offload_annotations: matches.get_flag("offl"),
        decimal_addresses: matches.get_flag("saddr"),
        all_counters: matches.get_flag("allkeys"),
        permissive: matches.get_flag("permissive"),
    };
    let mut annotator = annotate::builder().with_options(options).build();

    let input: Box<dyn BufRead> = match matches.get_one::<PathBuf>("trace") {
        Some(path) => Box::new(BufReader::new(
            File::open(path).expect("Could not open trace file"),
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    for line in input.lines() {
        let line = line.expect("Could not read trace line");
        match annotator.process_line(&line) {
            Ok(Some(annotated)) => println!("{annotated}"),
            Ok(None) => (),
            Err(e) => {
                eprintln!("FATAL: {e}");
                std::process::exit(1);
            }
        }
    }

    let report = annotator.finish();
    println!();
    println!("## Performance metrics");
    println!();
    print!("{report}");

    if let Some(path) = matches.get_one::<PathBuf>("dump-perf") {
        let file = File::create(path).expect("Could not create dump file");
        report
            .dump(BufWriter::new(file))
            .expect("Could not dump metrics");
    }

    if !report.is_consistent() {
        for diagnostic in &report.diagnostics {
            eprintln!("WARNING: {diagnostic}.");
        }
        eprintln!("WARNING: Inconsistent final state; performance metrics may be inaccurate.");
        eprintln!("Is this trace complete?");
        std::process::exit(2);
    }
}
