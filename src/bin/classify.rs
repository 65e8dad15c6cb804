//! rangeguard-classify: check client addresses against a range configuration.

use clap::{Parser, Subcommand};
use rangeguard::ranges::builtin;
use rangeguard::{CheckerConfig, Context, IpChecker, RangeRegistry, Verdict};
use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rangeguard-classify")]
#[command(author = "Kaitu.io")]
#[command(version = "0.1.0")]
#[command(about = "Classify client IP addresses against configured ranges", long_about = None)]
struct Cli {
    /// Checker configuration (YAML, or JSON with a .json extension)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Range group document: {"group": ["cidr", ...]}
    #[arg(short, long, global = true)]
    groups: Option<PathBuf>,

    /// Extra range spec (CIDR or group name); repeatable
    #[arg(short, long = "range", global = true)]
    ranges: Vec<String>,

    /// Extra allow-listed address; repeatable
    #[arg(short, long = "allow", global = true)]
    allow: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Addresses to classify; read from stdin when omitted
    addresses: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Strictly validate the configuration and exit
    Validate,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> rangeguard::Result<()> {
    let mut registry = builtin().clone();
    if let Some(ref path) = cli.groups {
        registry.merge(&RangeRegistry::from_json_reader(File::open(path)?)?);
    }

    let config = load_config(cli.config.as_deref(), cli.ranges, cli.allow)?;

    if let Some(Commands::Validate) = cli.command {
        config.validate(&registry)?;
        println!("Configuration OK");
        return Ok(());
    }

    let checker = IpChecker::from_config(&config, &registry)?;
    let report = checker.build_report();
    if !report.is_clean() {
        eprintln!(
            "Warning: {} invalid ranges, {} unknown groups skipped",
            report.skipped.len(),
            report.unknown_groups.len()
        );
    }

    let ctx = Context::background();
    if cli.addresses.is_empty() {
        for line in io::stdin().lock().lines() {
            let line = line?;
            let line = line.trim();
            if !line.is_empty() {
                print_verdict(&checker, &ctx, line);
            }
        }
    } else {
        for address in &cli.addresses {
            print_verdict(&checker, &ctx, address);
        }
    }

    Ok(())
}

fn load_config(
    path: Option<&Path>,
    ranges: Vec<String>,
    allow: Vec<String>,
) -> rangeguard::Result<CheckerConfig> {
    let mut config = match path {
        Some(path) => CheckerConfig::from_path(path)?,
        None => CheckerConfig::default(),
    };
    config.ranges.extend(ranges);
    config.allowlist.extend(allow);
    Ok(config)
}

fn print_verdict(checker: &IpChecker, ctx: &Context, address: &str) {
    let label = match checker.classify(ctx, address) {
        Ok(Verdict::InRange) => "blocked",
        Ok(Verdict::Allowlisted) | Ok(Verdict::NotInRange) => "allowed",
        Err(_) => "invalid",
    };
    println!("{}\t{}", address, label);
}
