// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tandem CLI - concurrency scenario runner.
//!
//! Each subcommand is a standalone scenario: it runs a fixed worker group
//! to completion under one scheduling model and exits. `__worker` is the
//! hidden entry the process scenario re-execs for each child.

use std::env;
use std::process;

mod scenarios;

use scenarios::Options;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let code = match args[1].as_str() {
        "threads" => with_options(&args[2..], scenarios::threads),
        "locked" => with_options(&args[2..], scenarios::locked),
        "processes" => with_options(&args[2..], scenarios::processes),
        "coop" => with_options(&args[2..], scenarios::coop),
        "__worker" => scenarios::child_worker(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        "version" | "--version" | "-V" => {
            println!("tandem 0.1.0");
            0
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            1
        }
    };
    process::exit(code);
}

fn with_options(rest: &[String], scenario: fn(&Options) -> i32) -> i32 {
    match Options::parse(rest) {
        Ok(opts) => scenario(&opts),
        Err(msg) => {
            eprintln!("{}", msg);
            1
        }
    }
}

fn print_usage() {
    println!("Tandem 0.1.0 - concurrent task runner scenarios");
    println!();
    println!("Usage: tandem <scenario> [options]");
    println!();
    println!("Scenarios:");
    println!("  threads     Two preemptive thread workers, unguarded log");
    println!("  locked      Three thread workers sharing a critical section");
    println!("  processes   Two isolated child-process workers");
    println!("  coop        Three cooperative tasks on a single thread");
    println!("  help        Show this help");
    println!("  version     Show version");
    println!();
    println!("Options:");
    println!("  --tick-ms <n>  Base delay per iteration in milliseconds (default 1000)");
    println!("  --json         Collect records and print them as JSON lines at the end");
}
