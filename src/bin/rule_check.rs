//! rule-check
//!
//! Validates a raw rule configuration the way the rule editor does before a
//! test or save call.

use std::io::Read;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use eventara_client::rule::{self, RuleDraft, RuleMetadata};
use eventara_client::ValidationResult;

struct Args {
    input: Option<PathBuf>,
    name: Option<String>,
    print: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut out = Args {
        input: None,
        name: None,
        print: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    out.name = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    eprintln!("error: --name requires a value");
                    std::process::exit(2);
                }
            }
            "--print" | "-p" => {
                out.print = true;
                i += 1;
            }
            "--help" | "-h" => {
                println!("rule-check - validate an Eventara rule configuration");
                println!();
                println!("USAGE:");
                println!("    rule-check [OPTIONS] [FILE]");
                println!();
                println!("Reads the rule config JSON from FILE, or stdin when FILE is '-' or absent.");
                println!();
                println!("OPTIONS:");
                println!("    -n, --name <NAME>    Also validate rule metadata with this name");
                println!("    -p, --print          Print the normalized config when valid");
                println!("    -h, --help           Print help information");
                std::process::exit(0);
            }
            "-" => {
                out.input = None;
                i += 1;
            }
            other if other.starts_with('-') => {
                eprintln!("error: unknown option: {other}");
                std::process::exit(2);
            }
            path => {
                out.input = Some(PathBuf::from(path));
                i += 1;
            }
        }
    }
    out
}

fn read_input(input: Option<&PathBuf>) -> std::io::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();

    let text = read_input(args.input.as_ref()).unwrap_or_else(|e| {
        eprintln!("error: failed to read rule config: {e}");
        std::process::exit(2);
    });

    let config = rule::from_json(&text).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(2);
    });

    tracing::debug!(shape = ?config.shape(), "decoded rule config");

    let result = match &args.name {
        Some(name) => RuleDraft::new(RuleMetadata::named(name.clone()), config.clone()).validate(),
        None => rule::validate(&config),
    };

    match result {
        ValidationResult::Valid => {
            println!("valid {:?} rule", config.shape());
            if args.print {
                match rule::to_json_pretty(&config) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("error: {e}");
                        std::process::exit(2);
                    }
                }
            }
        }
        ValidationResult::Invalid(_) => {
            println!("invalid {:?} rule:", config.shape());
            for message in result.messages() {
                println!("- {message}");
            }
            std::process::exit(1);
        }
    }
}
