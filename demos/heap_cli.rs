//! Demonstration driver for `simheap`.
//!
//! This is the "demonstration driver" / "textual heap visualiser" /
//! "statistics reporter": a thin presentation layer that only calls
//! `simheap`'s public API (`Heap`/`Collector`/`RootSet`), narrating
//! allocator state after every step.

use std::io::BufRead;

use clap::{Parser, Subcommand, ValueEnum};
use simheap::{Collector, Heap, HeapError, Strategy};

#[derive(Parser)]
#[command(name = "heap_cli", about = "Drive a simulated heap and watch it work")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one of the worked end-to-end scenarios.
    Scenario {
        #[arg(value_enum)]
        name: ScenarioName,
    },
    /// Drive a heap through a scripted sequence of operations read from
    /// stdin (or `--script <path>`), printing the layout/stats after each.
    ///
    /// Script lines: `alloc <size>`, `free <addr>`, `read <addr>`,
    /// `write <addr> <byte>`, `root-add <addr>`, `root-remove <addr>`,
    /// `collect`. Blank lines and lines starting with `#` are ignored.
    Run {
        #[arg(long, default_value_t = 256)]
        heap_size: usize,
        /// One of `first-fit`, `best-fit`, `worst-fit`, `next-fit`. Not a
        /// `clap` `ValueEnum` on purpose: an unrecognised value is routed
        /// through `HeapError::UnknownStrategy` rather than rejected by the
        /// argument parser, so that error variant has a real caller.
        #[arg(long, default_value = "first-fit")]
        strategy: String,
        #[arg(long)]
        script: Option<std::path::PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    Basic,
    Alignment,
    FirstfitReuse,
    BestfitChoice,
    Coalesce,
    MarkSweepChain,
    CollectAll,
}

/// Parses a `--strategy` value, failing with [`HeapError::UnknownStrategy`]
/// for anything other than the four recognised names.
fn parse_strategy(s: &str) -> Result<Strategy, HeapError> {
    match s {
        "first-fit" => Ok(Strategy::FirstFit),
        "best-fit" => Ok(Strategy::BestFit),
        "worst-fit" => Ok(Strategy::WorstFit),
        "next-fit" => Ok(Strategy::NextFit),
        _ => Err(HeapError::UnknownStrategy),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scenario { name } => run_scenario(name),
        Command::Run {
            heap_size,
            strategy,
            script,
        } => match parse_strategy(&strategy) {
            Ok(strategy) => run_script(heap_size, strategy, script.as_deref()),
            Err(e) => {
                eprintln!("--strategy {strategy:?}: {e}");
                std::process::exit(1);
            }
        },
    }
}

/// Reads operations one per line from `path`, or stdin if `path` is `None`,
/// applying each to a fresh `Heap::new(heap_size)` under `strategy` and
/// printing the layout/stats after every line.
fn run_script(heap_size: usize, strategy: Strategy, path: Option<&std::path::Path>) {
    let mut h = Heap::new(heap_size);
    h.set_strategy(strategy);
    report(&h);

    let lines: Vec<String> = match path {
        Some(p) => std::fs::read_to_string(p)
            .unwrap_or_else(|e| panic!("reading script {p:?}: {e}"))
            .lines()
            .map(str::to_owned)
            .collect(),
        None => std::io::stdin()
            .lock()
            .lines()
            .map(|l| l.expect("reading stdin"))
            .collect(),
    };

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        apply_line(&mut h, line);
        report(&h);
    }
}

fn apply_line(h: &mut Heap, line: &str) {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["alloc", size] => match h.allocate(parse(size)) {
            Some(addr) => println!("alloc {size} -> {addr:#x}"),
            None => println!("alloc {size} -> out of memory"),
        },
        ["free", addr] => print_result(h.free(parse(addr)), &format!("free {addr}")),
        ["read", addr] => match h.read(parse(addr)) {
            Ok(v) => println!("read {addr} -> {v}"),
            Err(e) => println!("read {addr} -> error: {e}"),
        },
        ["write", addr, value] => {
            print_result(h.write(parse(addr), parse(value)), &format!("write {addr} {value}"))
        }
        ["root-add", addr] => {
            h.root_set_mut().add(parse(addr));
            println!("root-add {addr}");
        }
        ["root-remove", addr] => {
            h.root_set_mut().remove(parse(addr));
            println!("root-remove {addr}");
        }
        ["collect"] => {
            Collector::new(h).collect();
            println!("collect");
        }
        _ => println!("ignoring unrecognised script line: {line:?}"),
    }
}

fn print_result(result: Result<(), HeapError>, label: &str) {
    match result {
        Ok(()) => println!("{label} -> ok"),
        Err(e) => println!("{label} -> error: {e}"),
    }
}

fn parse(s: &str) -> usize {
    match s.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).expect("valid hex number"),
        None => s.parse().expect("valid decimal number"),
    }
}

fn run_scenario(name: ScenarioName) {
    match name {
        ScenarioName::Basic => basic(),
        ScenarioName::Alignment => alignment(),
        ScenarioName::FirstfitReuse => firstfit_reuse(),
        ScenarioName::BestfitChoice => bestfit_choice(),
        ScenarioName::Coalesce => coalesce(),
        ScenarioName::MarkSweepChain => mark_sweep_chain(),
        ScenarioName::CollectAll => collect_all(),
    }
}

fn basic() {
    let mut h = Heap::new(64);
    let p = h.allocate(16).expect("fresh heap has room");
    println!("allocate(16) -> {p:#x}");
    h.write(p, 42).unwrap();
    println!("write({p:#x}, 42)");
    println!("read({p:#x}) = {}", h.read(p).unwrap());
    report(&h);
    h.free(p).unwrap();
    println!("free({p:#x})");
    println!("read({p:#x}) = {:?}", h.read(p));
    report(&h);
}

fn alignment() {
    let mut last = Heap::new(128);
    for s in 1..=32usize {
        let mut h = Heap::new(128);
        let p1 = h.allocate(s).unwrap();
        let p2 = h.allocate(1).unwrap();
        println!("size={s:2} -> p1={p1:#x} (expect 0x0), p2={p2:#x} (must be 8-aligned: {})", p2 % 8 == 0);
        last = h;
    }
    report(&last);
}

fn firstfit_reuse() {
    let mut h = Heap::new(128);
    h.set_strategy(Strategy::FirstFit);
    let p1 = h.allocate(32).unwrap();
    let p2 = h.allocate(32).unwrap();
    let p3 = h.allocate(32).unwrap();
    h.free(p1).unwrap();
    h.free(p3).unwrap();
    let p4 = h.allocate(16).unwrap();
    println!("p1={p1:#x} p2={p2:#x} p3={p3:#x} p4={p4:#x} (expect p4 == p1 == 0x0)");
    report(&h);
}

fn bestfit_choice() {
    let mut h = Heap::new(128);
    h.set_strategy(Strategy::BestFit);
    let p1 = h.allocate(16).unwrap();
    let p2 = h.allocate(32).unwrap();
    let p3 = h.allocate(8).unwrap();
    h.free(p1).unwrap();
    h.free(p2).unwrap();
    let p4 = h.allocate(16).unwrap();
    println!("p1={p1:#x} p2={p2:#x} p3={p3:#x} p4={p4:#x} (expect p4 == p1 == 0x0)");
    report(&h);
}

fn coalesce() {
    let mut h = Heap::new(128);
    let p1 = h.allocate(16).unwrap();
    let p2 = h.allocate(16).unwrap();
    let p3 = h.allocate(16).unwrap();
    h.free(p2).unwrap();
    h.free(p1).unwrap();
    h.free(p3).unwrap();
    println!("blocks after full coalesce: {}", h.blocks().len());
    report(&h);
}

fn mark_sweep_chain() {
    let mut h = Heap::new(256);
    let a = h.allocate(16).unwrap();
    let b = h.allocate(16).unwrap();
    let c = h.allocate(16).unwrap();
    let d = h.allocate(16).unwrap();
    h.find_block_mut(a).unwrap().add_reference(b);
    h.find_block_mut(b).unwrap().add_reference(c);
    h.root_set_mut().add(a);
    println!("before collect:");
    report(&h);
    Collector::new(&mut h).collect();
    println!("after collect (a,b,c reachable from root a; d unreachable):");
    report(&h);
    println!(
        "a free? {} b free? {} c free? {} d free? {}",
        h.find_block(a).unwrap().is_free(),
        h.find_block(b).unwrap().is_free(),
        h.find_block(c).unwrap().is_free(),
        h.find_block(d).unwrap().is_free(),
    );
}

fn collect_all() {
    let mut h = Heap::new(256);
    h.allocate(16).unwrap();
    h.allocate(16).unwrap();
    h.allocate(16).unwrap();
    println!("before collect (no roots added):");
    report(&h);
    Collector::new(&mut h).collect();
    println!("after collect: {} live allocations", h.allocation_count());
    report(&h);
}

/// The "textual/ASCII heap visualiser" plus "statistics reporter"
/// collaborators: both are thin read-only views over `Heap::blocks()`.
fn report(h: &Heap) {
    println!("{}", render_layout(h));
    let (live, garbage, free) = stats(h);
    println!(
        "stats: total={} live={} garbage={} free={}",
        h.heap_size(),
        live,
        garbage,
        free
    );
}

fn render_layout(h: &Heap) -> String {
    let mut line = String::new();
    for b in h.blocks() {
        let glyph = if b.is_free() {
            '.'
        } else if b.is_marked() {
            '#'
        } else {
            '+'
        };
        line.push_str(&format!("[{:#x}..{:#x}){}", b.start(), b.end(), glyph));
    }
    line
}

/// `live` = allocated and marked; `garbage` = allocated and unmarked;
/// `free` = free. Meaningful immediately after `Collector::mark` would run,
/// but computed purely from public state so it is safe to call at any time.
fn stats(h: &Heap) -> (usize, usize, usize) {
    let mut live = 0;
    let mut garbage = 0;
    let mut free = 0;
    for b in h.blocks() {
        if b.is_free() {
            free += b.size();
        } else if b.is_marked() {
            live += b.size();
        } else {
            garbage += b.size();
        }
    }
    (live, garbage, free)
}
