//! Offline driver for code listings.
//!
//! Loads the `[ActionReplay]` and `[ActionReplay_Enabled]` sections of a
//! codes file, runs the engine for a number of ticks against a blank RAM
//! image, then prints the bytes the codes touched.  Handy for checking
//! what a listing actually does before enabling it in an emulator.

use std::fs;
use std::process;

use arcode_parser::{load_codes, sections};
use clap::{App, Arg};
use log::LevelFilter;
use sherbet_core::{CheatEngine, GuestMemory, MainRam, RAM_BASE, RAM_SIZE};
use simple_logger::SimpleLogger;

fn main() {
    let matches = App::new("sherbet")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run Action Replay code listings against a blank RAM image")
        .arg(
            Arg::with_name("codes")
                .help("Codes file holding [ActionReplay] sections")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("ticks")
                .short("t")
                .long("ticks")
                .takes_value(true)
                .default_value("1")
                .help("Number of engine ticks to run"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Show per-write trace output"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    let path = matches.value_of("codes").unwrap();
    let file = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(reason) => {
            eprintln!("cannot read {path}: {reason}");
            process::exit(1);
        }
    };
    let ticks: u32 = match matches.value_of("ticks").unwrap().parse() {
        Ok(count) => count,
        Err(_) => {
            eprintln!("--ticks wants a number");
            process::exit(1);
        }
    };

    let listing =
        sections::find_section(&file, "ActionReplay").unwrap_or_default();
    let enabled = sections::find_section(&file, "ActionReplay_Enabled")
        .unwrap_or_default();

    // A standalone codes file is the user's own listing
    let loaded = load_codes("", &listing, &enabled);
    for warning in &loaded.warnings {
        eprintln!("warning: {warning}");
    }
    for code in &loaded.codes {
        let state = if code.active { "on " } else { "off" };
        println!(
            "[{state}] {} ({} instruction{})",
            code.name,
            code.ops.len(),
            if code.ops.len() == 1 { "" } else { "s" }
        );
    }

    let engine = CheatEngine::new(true);
    engine.enable_self_logging(true);
    engine.apply_codes(&loaded.codes);
    println!("running {} active code(s) for {ticks} tick(s)", engine.active_code_count());

    let mut ram = MainRam::new();
    for _ in 0..ticks {
        engine.run_all_active(&mut ram);
    }

    for line in engine.get_self_log() {
        println!("  {line}");
    }
    dump_touched_bytes(&ram);
}

/// Print the spans of RAM the run left non-zero
fn dump_touched_bytes(ram: &MainRam) {
    const MAX_SPANS: usize = 32;
    const MAX_SPAN_BYTES: u32 = 32;

    let mut spans: Vec<(u32, u32)> = Vec::new();
    let mut addr = RAM_BASE;
    while addr < RAM_BASE + RAM_SIZE {
        if ram.read_u8(addr) != 0 {
            let start = addr;
            while addr < RAM_BASE + RAM_SIZE && ram.read_u8(addr) != 0 {
                addr += 1;
            }
            spans.push((start, addr));
        } else {
            addr += 1;
        }
    }

    if spans.is_empty() {
        println!("no bytes touched");
        return;
    }
    println!("{} touched span(s):", spans.len());
    for (start, end) in spans.iter().take(MAX_SPANS) {
        let shown = (end - start).min(MAX_SPAN_BYTES);
        let bytes: Vec<String> = (0..shown)
            .map(|offset| format!("{:02x}", ram.read_u8(start + offset)))
            .collect();
        let ellipsis = if end - start > shown { " ..." } else { "" };
        println!(
            "  {start:08x}..{end:08x}  {}{ellipsis}",
            bytes.join(" ")
        );
    }
    if spans.len() > MAX_SPANS {
        println!("  ... and {} more", spans.len() - MAX_SPANS);
    }
}
