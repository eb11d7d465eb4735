//! titlekit command line

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::{env, panic, process};
use titlekit::exit_codes::{
    EXIT_ERROR, EXIT_FORGE_ERROR, EXIT_FORMAT_ERROR, EXIT_INVALID_ARGS, EXIT_IO_ERROR,
    EXIT_KEY_ERROR, EXIT_MANAGER_ERROR, EXIT_NEGATIVE, EXIT_PANIC, EXIT_SUCCESS,
};
use titlekit::utils::{env_or, parse_hex_array};
use titlekit::{Console, ConsoleOptions, ContainerKind, TitleError, check_file, forge_file};

const VERSION: &str = titlekit::version::VERSION;
const NAND_ROOT_ENV: &str = "TITLEKIT_NAND_ROOT";
const BOOT2_VERSION_ENV: &str = "TITLEKIT_BOOT2_VERSION";
const DEFAULT_BOOT2_VERSION: u32 = 4;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Inspect and fakesign titles in a NAND dump")]
struct Args {
    /// Extracted NAND root (defaults to $TITLEKIT_NAND_ROOT, then ./nand)
    #[arg(long, global = true)]
    nand: Option<PathBuf>,

    /// OTP dump holding the common key
    #[arg(long, global = true)]
    otp: Option<PathBuf>,

    /// SEEPROM dump holding the Korean key
    #[arg(long, global = true)]
    seeprom: Option<PathBuf>,

    /// Console boot2 version (defaults to $TITLEKIT_BOOT2_VERSION, then 4)
    #[arg(long, global = true)]
    boot2_version: Option<u32>,

    /// Log level (trace, debug, info, warn, error; json:<level> for JSON)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed titles with version and size
    Titles,
    /// Classify every installed IOS
    Ios,
    /// Classify one IOS
    Stub { ios: u8 },
    /// Read the build tag of one IOS
    Cios { ios: u8 },
    /// Fakesign a ticket or TMD file
    Forge {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Check whether a ticket or TMD file is fakesigned
    Check {
        file: PathBuf,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Look up shared content by SHA-1
    Shared { hash: String },
    /// Show common key fingerprints and Korean key presence
    Keys,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Ticket,
    Tmd,
}

impl From<KindArg> for ContainerKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ticket => ContainerKind::Ticket,
            KindArg::Tmd => ContainerKind::Tmd,
        }
    }
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in titlekit");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    // Handle --version before clap
    if env::args().nth(1).as_deref() == Some("--version") {
        println!("titlekit {}", titlekit::version::full_version());
        return EXIT_SUCCESS;
    }

    let args = Args::parse();

    if let Some(ref level) = args.log_level {
        titlekit::logger::JsonLogger::init_with_level(level, "CLI --log-level");
    } else {
        titlekit::logger::JsonLogger::init();
    }

    match dispatch(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(e: &TitleError) -> i32 {
    match e {
        TitleError::Manager(_) | TitleError::Allocation { .. } => EXIT_MANAGER_ERROR,
        TitleError::CorruptContentMap { .. }
        | TitleError::InvalidBuildTag(_)
        | TitleError::UnknownSignatureType(_)
        | TitleError::Malformed(_) => EXIT_FORMAT_ERROR,
        TitleError::ForgeExhausted => EXIT_FORGE_ERROR,
        TitleError::UnsupportedCommonKey(_) => EXIT_KEY_ERROR,
        TitleError::IoError(_) => EXIT_IO_ERROR,
        TitleError::JsonError(_) | TitleError::Generic(_) => EXIT_ERROR,
    }
}

fn open_console(args: &Args) -> titlekit::Result<Console> {
    Console::open(ConsoleOptions {
        nand_root: args
            .nand
            .clone()
            .unwrap_or_else(|| env_or(NAND_ROOT_ENV, PathBuf::from("nand"))),
        otp: args.otp.clone(),
        seeprom: args.seeprom.clone(),
        boot2_version: args
            .boot2_version
            .unwrap_or_else(|| env_or(BOOT2_VERSION_ENV, DEFAULT_BOOT2_VERSION)),
    })
}

fn print_json<T: Serialize>(value: &T) -> titlekit::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn dispatch(args: &Args) -> titlekit::Result<i32> {
    match &args.command {
        Command::Titles => {
            let summaries = open_console(args)?.title_summaries()?;
            if args.json {
                print_json(&summaries)?;
            } else {
                for t in &summaries {
                    println!(
                        "{}  v{:<5}  {:>10} bytes  {} ticket(s)",
                        t.title_id, t.title_version, t.installed_size, t.ticket_views
                    );
                }
            }
            Ok(EXIT_SUCCESS)
        }

        Command::Ios => {
            let mut report = open_console(args)?.ios_report()?;
            report.sort_by_key(|r| r.ios);
            if args.json {
                print_json(&report)?;
            } else {
                for r in &report {
                    let tag = r
                        .build_tag
                        .as_ref()
                        .map(|t| format!("  {} v{} (base {})", t.name(), t.version, t.base))
                        .unwrap_or_default();
                    println!("IOS{:<3}  {:<6}  {:?}{}", r.ios, r.class, r.reason, tag);
                }
            }
            Ok(EXIT_SUCCESS)
        }

        Command::Stub { ios } => {
            let reason = open_console(args)?.classify(*ios);
            if args.json {
                print_json(&serde_json::json!({
                    "ios": ios,
                    "class": reason.class(),
                    "reason": reason,
                }))?;
            } else {
                println!("IOS{}: {} ({:?})", ios, reason.class(), reason);
            }
            Ok(match reason.class() {
                titlekit::IosClass::Stub => EXIT_NEGATIVE,
                titlekit::IosClass::Active => EXIT_SUCCESS,
            })
        }

        Command::Cios { ios } => {
            let tag = open_console(args)?.build_tag(*ios);
            if args.json {
                print_json(&tag)?;
            } else if let Some(ref t) = tag {
                println!(
                    "IOS{}: {} {} v{} (base IOS{})",
                    ios,
                    t.name(),
                    t.version_string(),
                    t.version,
                    t.base
                );
            } else {
                println!("IOS{}: no build tag", ios);
            }
            Ok(if tag.is_some() { EXIT_SUCCESS } else { EXIT_NEGATIVE })
        }

        Command::Forge { file, output, kind } => {
            let outcome = forge_file(file, kind.map(Into::into), output.as_deref())?;
            if args.json {
                print_json(&outcome)?;
            } else {
                println!(
                    "✅ Fakesigned {:?} ({:?}), field {:#06x} -> {}",
                    outcome.kind,
                    outcome.signature,
                    outcome.fill,
                    outcome.output.display()
                );
            }
            Ok(EXIT_SUCCESS)
        }

        Command::Check { file, kind } => {
            let forged = check_file(file, kind.map(Into::into))?;
            if args.json {
                print_json(&serde_json::json!({ "fakesigned": forged }))?;
            } else {
                println!(
                    "{}: {}",
                    file.display(),
                    if forged { "fakesigned" } else { "not fakesigned" }
                );
            }
            Ok(if forged { EXIT_SUCCESS } else { EXIT_NEGATIVE })
        }

        Command::Shared { hash } => {
            let Some(hash) = parse_hex_array::<20>(hash) else {
                eprintln!("Error: expected a 40-digit SHA-1, got {hash:?}");
                return Ok(EXIT_INVALID_ARGS);
            };
            let map = open_console(args)?.shared_content()?;
            let found = map.find(&hash);
            if args.json {
                print_json(&found)?;
            } else if let Some(record) = found {
                println!("{}", record.content_path());
            } else {
                println!("not in shared content map ({} records)", map.len());
            }
            Ok(if found.is_some() { EXIT_SUCCESS } else { EXIT_NEGATIVE })
        }

        Command::Keys => {
            let console = open_console(args)?;
            let (common, vwii) = match console.keys().common_keys() {
                Ok(keys) => keys.fingerprints(),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(EXIT_KEY_ERROR);
                }
            };
            let korean = console.keys().has_korean_key();
            if args.json {
                print_json(&serde_json::json!({
                    "common": common,
                    "vwii": vwii,
                    "korean_key": korean,
                }))?;
            } else {
                println!("common key  sha1:{common}…");
                println!("vWii key    sha1:{vwii}…");
                println!("korean key  {}", if korean { "present" } else { "absent" });
            }
            Ok(EXIT_SUCCESS)
        }
    }
}
