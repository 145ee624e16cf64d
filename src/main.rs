// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use color_eyre::eyre::Result;
use commit_bench::{BenchConfig, BenchmarkResult, Pipeline, Schedule};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "commit-bench")]
#[command(about = "Build and benchmark a list of git commits", long_about = None)]
struct Args {
    /// Configuration listing the remote, the base settings and the commits
    #[arg(short = 'c', long = "config", default_value = "config.json")]
    config: PathBuf,

    /// Directory holding one checkout per commit, kept between invocations
    #[arg(short = 'w', long = "workspace-root", default_value = "build")]
    workspace_root: PathBuf,

    /// Benchmark each commit right after building it instead of building all commits first
    #[arg(short = 'i', long = "interleave")]
    interleave: bool,

    /// More log output, repeat for even more
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "commit_bench=info",
        1 => "commit_bench=debug",
        _ => "commit_bench=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = BenchConfig::load(&args.config)?;
    let schedule = if args.interleave {
        Schedule::Interleaved
    } else {
        Schedule::BuildFirst
    };

    Pipeline::new(&config, &args.workspace_root)
        .with_schedule(schedule)
        .run(print_result)?;
    Ok(())
}

fn print_result(result: &BenchmarkResult) {
    println!("\n{:.8} ({})", result.oid, result.label);
    let runs: Vec<String> = result.samples.iter().map(|r| format!("{:.2}", r)).collect();
    println!("Runtimes (n={}): {{ {} }}", result.samples.len(), runs.join(", "));
    println!(
        "Average runtime: {:.2}ms (σ={:.3})",
        result.mean(),
        result.std_dev()
    );
    println!(
        "  Min/median/max:   {:.2} / {:.2} / {:.2} ms",
        result.summary.min, result.summary.median, result.summary.max
    );
}
