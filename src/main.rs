use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use supabase_dns::{full_dns, read_input, rewrite_document, target_paths, write_output};
use tracing::{error, Level};

const USAGE: &str = "\
Usage:
  supabase-dns <input.yaml> <output.yaml> <lb-dns-prefix>

Example:
  supabase-dns values.yaml updated.yaml lb-0a36988526c6443a947a8927f9190c0a-1

How to find the prefix:
  kubectl get svc demo-supabase-kong \\
    -o jsonpath=\"{.status.loadBalancer.ingress[0].hostname}\"
  # yields lb-xxx.upcloudlb.com; pass only the 'lb-xxx' part";

#[derive(Parser)]
#[command(name = "supabase-dns")]
#[command(about = "Point the URL fields of a Supabase manifest at a load balancer", long_about = None)]
#[command(version, after_help = USAGE)]
struct Cli {
    /// Manifest to read
    input: PathBuf,

    /// Where to write the rewritten manifest (created or replaced)
    output: PathBuf,

    /// Load balancer hostname without the .upcloudlb.com suffix
    dns_prefix: String,

    /// Dry run - print the rewritten manifest instead of writing it
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => {
            println!("{USAGE}");
            std::process::exit(1);
        }
    };

    init_tracing(&cli);

    if let Err(err) = run(&cli) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let dns = full_dns(&cli.dns_prefix);

    let input = read_input(&cli.input)?;
    let report = rewrite_document(&input, &target_paths(), &dns)
        .with_context(|| format!("cannot rewrite {}", cli.input.display()))?;

    if cli.diff {
        display_diff(&cli.input, &input, &report.output);
    }

    if cli.dry_run {
        print!("{}", report.output);
        return Ok(());
    }

    write_output(&cli.output, &report.output)?;

    println!(
        "Updated URLs to http://{} and wrote to {}",
        dns,
        cli.output.display()
    );
    Ok(())
}

/// Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!("{}", format!("--- {} (original)", file.display()).dimmed());
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
