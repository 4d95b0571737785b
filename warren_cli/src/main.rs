// CLI entry point for warren world maintenance.
//
// Thin wrapper over `warren_store`: create a world directory, print its
// metadata, audit its node files, or run a flush cycle. Set `RUST_LOG`
// (e.g. `RUST_LOG=warren_store=debug`) to watch the store work.
//
// Usage:
//   warren <COMMAND> <WORLD_DIR> [OPTIONS]
//
// Commands:
//   init      Create a world (or verify an existing one matches)
//   info      Print metadata, node count, and character names
//   verify    Decode every node file and report the corrupt ones
//   flush     Open the world and run a flush cycle
//
// Options:
//   --chunk-size <N>    (init) Chunk edge length in voxels (default: 12)

use std::path::PathBuf;
use std::process::exit;

use warren_store::{StoreError, WorldOptions, WorldStore};

enum Command {
    Init { chunk_size: Option<u16> },
    Info,
    Verify,
    Flush,
}

struct Invocation {
    command: Command,
    root: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let invocation = parse_args();
    if let Err(err) = run(invocation) {
        eprintln!("error: {err}");
        exit(1);
    }
}

fn run(invocation: Invocation) -> Result<(), StoreError> {
    match invocation.command {
        Command::Init { chunk_size } => {
            let options = WorldOptions { chunk_size, ..WorldOptions::default() };
            let store = WorldStore::open_with(&invocation.root, options)?;
            let meta = store.meta();
            println!("world ready at {}", invocation.root.display());
            println!("  chunk_size: {}", meta.chunk_size);
            println!("  format_version: {}", meta.format_version);
            store.close()
        }
        Command::Info => {
            let store = WorldStore::open(&invocation.root)?;
            let meta = store.meta();
            let nodes = store.stored_node_keys()?;
            let characters = store.character_names();
            println!("world: {}", invocation.root.display());
            println!("  chunk_size: {}", meta.chunk_size);
            println!("  format_version: {}", meta.format_version);
            println!("  nodes on disk: {}", nodes.len());
            println!("  characters: {}", characters.len());
            for name in characters {
                println!("    {name}");
            }
            Ok(())
        }
        Command::Verify => {
            let store = WorldStore::open(&invocation.root)?;
            let report = store.verify()?;
            println!("checked {} node file(s)", report.checked);
            if report.is_clean() {
                println!("all nodes decode cleanly");
                Ok(())
            } else {
                for (key, err) in &report.corrupt {
                    eprintln!("  {key}: {err}");
                }
                eprintln!("{} corrupt node(s)", report.corrupt.len());
                exit(1);
            }
        }
        Command::Flush => {
            let store = WorldStore::open(&invocation.root)?;
            let flushed = store.flush()?;
            println!("flushed {flushed} node(s)");
            store.close()
        }
    }
}

/// Parse command-line arguments. Simple `std::env::args()` matching — no
/// clap dependency.
fn parse_args() -> Invocation {
    let args: Vec<String> = std::env::args().collect();

    let command_name = args.get(1).cloned().unwrap_or_else(|| {
        print_usage();
        exit(1);
    });
    if command_name == "--help" || command_name == "-h" {
        print_usage();
        exit(0);
    }

    let root = PathBuf::from(args.get(2).cloned().unwrap_or_else(|| {
        eprintln!("{command_name} requires a world directory");
        print_usage();
        exit(1);
    }));

    let mut chunk_size = None;
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--chunk-size" => {
                if command_name != "init" {
                    eprintln!("--chunk-size only applies to init");
                    exit(1);
                }
                i += 1;
                let value: u16 = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--chunk-size requires a number between 1 and 65535");
                    exit(1);
                });
                chunk_size = Some(value);
            }
            "--help" | "-h" => {
                print_usage();
                exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                exit(1);
            }
        }
        i += 1;
    }

    let command = match command_name.as_str() {
        "init" => Command::Init { chunk_size },
        "info" => Command::Info,
        "verify" => Command::Verify,
        "flush" => Command::Flush,
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            exit(1);
        }
    };

    Invocation { command, root }
}

fn print_usage() {
    println!("Usage: warren <COMMAND> <WORLD_DIR> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  init      Create a world (or verify an existing one matches)");
    println!("  info      Print metadata, node count, and character names");
    println!("  verify    Decode every node file and report the corrupt ones");
    println!("  flush     Open the world and run a flush cycle");
    println!();
    println!("Options:");
    println!("  --chunk-size <N>    (init) Chunk edge length in voxels (default: 12)");
    println!("  --help, -h          Show this help");
}
