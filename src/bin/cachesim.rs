//! Trace-driven cache simulator.
//!
//! Replays a trace of memory operations against a two-level hierarchy
//! (split L1 instruction/data caches over a shared L2 over a flat memory)
//! and prints per-level statistics.
//!
//! Run with:
//! ```bash
//! cargo run --release -- trace.txt
//! cargo run --release -- --l1-sets 64 --l1-ways 2 -v trace.txt
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;

use cachesim_rs::backing::MainMemory;
use cachesim_rs::debug::dump;
use cachesim_rs::hierarchy::MemorySystem;
use cachesim_rs::params::CacheParams;
use cachesim_rs::trace::{Command, TraceReader};

#[derive(Debug, Parser)]
#[command(version, about = "Trace-driven N-way set-associative cache simulator")]
struct Cli {
    /// Trace file: one `<opcode> <hex-address>` command per line.
    #[arg(value_name = "FILE")]
    trace: PathBuf,

    /// L1 associativity (ways per set, a power of two).
    #[clap(long, value_name = "INT", default_value = "2")]
    l1_ways: usize,

    /// L1 number of sets (a power of two).
    #[clap(long, value_name = "INT", default_value = "16384")]
    l1_sets: usize,

    /// L1 line size in bytes (a power of two).
    #[clap(long, value_name = "INT", default_value = "16")]
    l1_line: usize,

    /// L2 associativity (a power of two).
    #[clap(long, value_name = "INT", default_value = "4")]
    l2_ways: usize,

    /// L2 number of sets (a power of two).
    #[clap(long, value_name = "INT", default_value = "16384")]
    l2_sets: usize,

    /// L2 line size in bytes (a power of two, at least the L1 line size).
    #[clap(long, value_name = "INT", default_value = "32")]
    l2_line: usize,

    /// Main memory size in bytes (a power of two).
    #[clap(long, value_name = "INT", default_value = "16777216")]
    memory: usize,

    /// Increase verbosity (-v: per-miss events, -vv: per-access events).
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = match args.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let l1_params = CacheParams::new(args.l1_ways, args.l1_sets, args.l1_line)?;
    let l2_params = CacheParams::new(args.l2_ways, args.l2_sets, args.l2_line)?;
    let mut system = MemorySystem::new(l1_params, l2_params, MainMemory::new(args.memory))?;

    let file = File::open(&args.trace)?;
    let mut reader = TraceReader::new(BufReader::new(file));

    let mut commands = 0usize;
    let mut rejected = 0usize;
    for command in reader.by_ref() {
        commands += 1;
        // Reads and writes move a single byte; the write payload is the
        // address's low byte, which makes writebacks visible in memory.
        let result = match command {
            Command::Read(address) => {
                let mut byte = [0u8; 1];
                system.read(address, &mut byte)
            }
            Command::Write(address) => system.write(address, &[address as u8]),
            Command::Ifetch(address) => {
                let mut byte = [0u8; 1];
                system.ifetch(address, &mut byte)
            }
            Command::Invalidate(address) => {
                system.invalidate(address);
                Ok(())
            }
            Command::Reset => {
                system.reset();
                Ok(())
            }
            Command::Print => {
                println!("{}", dump(system.l1d()));
                println!("{}", dump(system.l1i()));
                Ok(())
            }
        };
        if let Err(e) = result {
            log::warn!("{:?} rejected: {}", command, e);
            rejected += 1;
        }
    }

    if reader.skipped() > 0 {
        log::warn!("{} malformed trace lines skipped", reader.skipped());
    }
    if rejected > 0 {
        log::warn!("{} accesses rejected", rejected);
    }

    println!("Replayed {} commands from {}", commands, args.trace.display());
    println!("\nL1 Instruction Cache:\n{}", system.l1i().stats());
    println!("\nL1 Data Cache:\n{}", system.l1d().stats());
    println!("\nL2 Cache:\n{}", system.l2_stats());
    println!("\n{}", dump(system.l1d()));

    Ok(())
}
