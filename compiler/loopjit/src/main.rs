//! loopjit CLI
//!
//! Specializes a source fragment for the given argument types and prints
//! or runs the result.

use loopjit::commands::{emit_file, run_file, Tier};
use loopjit::signature::{parse_arg_type, TypeSignature};
use loopjit::{init_tracing, JitConfig, LoweringStyle};

struct Options {
    path: String,
    signature: TypeSignature,
    config: JitConfig,
    tier: Tier,
}

fn parse_options(command: &str, rest: &[String]) -> Options {
    let mut path = None;
    let mut args = Vec::new();
    let mut config = JitConfig::from_env();
    let mut tier = Tier::Interp;

    let mut i = 0;
    while i < rest.len() {
        let arg = rest[i].as_str();
        if (arg == "--arg" || arg == "-a") && i + 1 < rest.len() {
            args.push(rest[i + 1].clone());
            i += 2;
            continue;
        }
        if let Some(ty) = arg.strip_prefix("--arg=") {
            args.push(ty.to_string());
        } else if arg == "--inline" {
            config = config.with_style(LoweringStyle::Inline);
        } else if arg == "--outlined" {
            config = config.with_style(LoweringStyle::Outlined);
        } else if arg == "--native" {
            tier = Tier::Native;
        } else if let Some(cc) = arg.strip_prefix("--cc=") {
            config.cc.compiler = cc.to_string();
        } else if !arg.starts_with('-') && path.is_none() {
            path = Some(arg.to_string());
        } else {
            eprintln!("error: unknown option '{arg}'");
            std::process::exit(1);
        }
        i += 1;
    }

    let Some(path) = path else {
        eprintln!("error: missing file path");
        eprintln!("Usage: loopjit {command} <file> --arg <type> ...");
        std::process::exit(1);
    };

    let mut types = Vec::with_capacity(args.len());
    for text in &args {
        match parse_arg_type(text) {
            Ok(ty) => types.push(ty),
            Err(err) => {
                eprintln!("error: --arg {text}: {err}");
                std::process::exit(1);
            }
        }
    }

    Options {
        path,
        signature: TypeSignature::new(types),
        config,
        tier,
    }
}

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "emit" => {
            if args.len() < 3 {
                eprintln!("Usage: loopjit emit <file> --arg <type> ... [--inline]");
                std::process::exit(1);
            }
            let options = parse_options(command, &args[2..]);
            if options.tier == Tier::Native {
                eprintln!("warning: --native has no effect on emit");
            }
            emit_file(&options.path, &options.signature, &options.config);
        }
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: loopjit run <file> --arg <type> ... [--native] [--inline]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --native     Compile with the system C compiler");
                eprintln!("  --cc=<path>  C compiler to use (default: cc, or $LOOPJIT_CC)");
                std::process::exit(1);
            }
            let options = parse_options(command, &args[2..]);
            run_file(&options.path, &options.signature, &options.config, options.tier);
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("loopjit {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("loopjit: specialize array pipelines to C loops");
    println!();
    println!("Usage: loopjit <command> [options]");
    println!();
    println!("Commands:");
    println!("  emit <file>     Print the C translation unit for the given argument types");
    println!("  run <file>      Run on ramp data (0, 1, 2, ...) and print the result");
    println!("  help            Show this help message");
    println!("  version         Show version information");
    println!();
    println!("Options:");
    println!("  --arg <type>    Argument type, repeatable: f64[2x10], i32[8], i64");
    println!("  --inline        Place loops in the entry function (default: outlined)");
    println!("  --native        Run with the system C compiler instead of the interpreter");
    println!();
    println!("Environment:");
    println!("  RUST_LOG=loopjit=debug   Structured logs");
    println!("  LOOPJIT_DEBUG_C=1        Dump every assembled translation unit");
    println!("  LOOPJIT_STYLE, LOOPJIT_CC, LOOPJIT_CFLAGS");
}
