// Command-line interface for oxipatch.
//
// Subcommands: `apply` (reconstruct a target from source + patch),
// `info` (print the parsed header of a patch container), and
// `config` (print build details).

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::io::{self, IoError};
use crate::patch::{PatchError, PatchHeader};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// BSDIFF40 binary patch applier.
#[derive(Parser, Debug)]
#[command(
    name = "oxipatch",
    version,
    about = "BSDIFF40 binary patch applier",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file, producing the target file.
    Apply(ApplyArgs),
    /// Print the header fields of a patch container.
    Info(InfoArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Source (old) file.
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Patch container file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Output (new) file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Patch container file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(args: &ApplyArgs, cli: &Cli) -> i32 {
    if args.output.exists() && !cli.force {
        eprintln!(
            "oxipatch: output file exists, use -f to overwrite: {}",
            args.output.display()
        );
        return 1;
    }

    // At -vv, echo progress roughly every 10% of the target.
    let verbose = cli.verbose;
    let mut last_decile = u64::MAX;
    let mut progress = |done: u64, total: u64| {
        if verbose >= 2 && total > 0 {
            let decile = done * 10 / total;
            if decile != last_decile {
                last_decile = decile;
                eprintln!("oxipatch: {done}/{total} bytes ({}%)", decile * 10);
            }
        }
        true
    };

    let stats =
        match io::apply_file_with_progress(&args.source, &args.patch, &args.output, &mut progress) {
            Ok(stats) => stats,
            Err(e) => {
                eprintln!("oxipatch: apply: {e}");
                return exit_code_for(&e);
            }
        };

    if verbose > 0 && !cli.quiet {
        eprintln!(
            "oxipatch: source size: {}, patch size: {}, output size: {}",
            stats.source_size, stats.patch_size, stats.output_size
        );
    }

    if cli.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "output_sha256": stats.output_sha256.map(hex),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    }

    0
}

/// Distinct exit codes per error class, for scripting around the tool.
fn exit_code_for(e: &IoError) -> i32 {
    match e {
        IoError::Io { .. } | IoError::Patch(PatchError::Io(_)) => 1,
        IoError::Patch(PatchError::Format(_)) => 2,
        IoError::Patch(PatchError::Corrupt(_)) => 3,
        IoError::Patch(PatchError::Alloc { .. }) => 4,
        IoError::Patch(PatchError::Cancelled) => 5,
    }
}

fn hex(bytes: [u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(args: &InfoArgs, cli: &Cli) -> i32 {
    let data = match std::fs::read(&args.patch) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("oxipatch: {}: {e}", args.patch.display());
            return 1;
        }
    };

    let header = match PatchHeader::parse(&data) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("oxipatch: {}", e);
            return 2;
        }
    };

    if cli.json_output {
        let json = serde_json::json!({
            "command": "info",
            "container_size": data.len(),
            "ctrl_len": header.ctrl_len,
            "diff_len": header.diff_len,
            "new_size": header.new_size,
            "extra_len": data.len() as u64 - header.extra_offset().min(data.len() as u64),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    } else {
        println!("container size:     {}", data.len());
        println!("control block:      {} bytes at offset {}", header.ctrl_len, header.ctrl_offset());
        println!("diff block:         {} bytes at offset {}", header.diff_len, header.diff_offset());
        println!(
            "extra block:        {} bytes at offset {}",
            data.len() as u64 - header.extra_offset().min(data.len() as u64),
            header.extra_offset()
        );
        println!("target size:        {}", header.new_size);
    }

    if header.extra_offset() > data.len() as u64 && !cli.quiet {
        eprintln!("oxipatch: warning: declared stream lengths exceed the container size");
    }

    0
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxipatch version {version} (Rust), Copyright (C) oxipatch contributors");
    eprintln!("Licensed under the MIT license");

    let file_io = cfg!(feature = "file-io") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("MAGIC={}", String::from_utf8_lossy(&crate::patch::header::MAGIC));
    eprintln!("HEADER_SIZE={}", crate::patch::header::HEADER_SIZE);
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    let exit_code = match &cli.command {
        Cmd::Apply(args) => cmd_apply(args, &cli),
        Cmd::Info(args) => cmd_info(args, &cli),
        Cmd::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
