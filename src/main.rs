//! CLI entry point for `eudoraconv`.

use std::path::PathBuf;

use clap::Parser;

use eudoraconv::convert::{convert_mailbox, ConvertOptions};

#[derive(Parser)]
#[command(name = "eudoraconv", version, about = "Convert a Eudora mailbox (.mbx + .toc) to a standard mbox file")]
struct Cli {
    /// Eudora mailbox file to convert
    #[arg(value_name = "MAILBOX")]
    mailbox: PathBuf,

    /// Attachments root directory (Eudora's folder holding attach/,
    /// Attachments Folder/, Embedded/). Without it, attachment lines
    /// are left in the body untouched.
    #[arg(short = 'a', long = "attachments", value_name = "DIR")]
    attachments: Option<PathBuf>,

    /// Output path (defaults to MAILBOX.converted)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    let options = ConvertOptions {
        attachments_root: cli.attachments,
        output: cli.output,
    };
    let summary = convert_mailbox(&cli.mailbox, &options)?;

    println!("{}", summary.report);
    println!("output: {}", summary.output.display());
    if summary.attachments_listed > 0 {
        println!(
            "attachments: {} listed, {} found, {} missing",
            summary.attachments_listed, summary.attachments_found, summary.attachments_missing
        );
    }
    Ok(())
}
