use anyhow::{Context, Result};
use binwrap_core::{BinWrapper, Manifest, ManifestLoader, Platform, ProgressEvent};
use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(name = "binwrap", author, version, about = "Provision platform-specific native binaries")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short, default_value = "binwrap.yaml", help = "Path to the binary manifest")]
    manifest: String,

    #[clap(long, short, default_value = "info")]
    log_level: String,

    #[clap(long, short, help = "Do not print download progress")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install the binary if missing, then verify it
    Install {
        #[clap(
            long = "probe",
            allow_hyphen_values = true,
            help = "Argument passed to the binary when verifying it (repeatable, overrides the manifest)"
        )]
        probe: Vec<String>,
    },
    /// Download and extract every source matching this host
    Download,
    /// Print the path of the installed binary
    Path,
    /// Print the normalized identifiers of this host
    Platform,
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::Started => eprintln!("Downloading..."),
        ProgressEvent::Progress(record) => {
            match record.total_bytes {
                Some(total) if total > 0 => eprint!(
                    "\r{}: {:>3}% ({}/{} bytes)",
                    record.resource_url,
                    record.completed_bytes * 100 / total,
                    record.completed_bytes,
                    total
                ),
                _ => eprint!("\r{}: {} bytes", record.resource_url, record.completed_bytes),
            }
            if record.is_complete() {
                eprintln!();
            }
        }
        ProgressEvent::Error(e) => eprintln!("\nDownload failed: {}", e),
    }
}

async fn load_session(manifest_path: &str, quiet: bool) -> Result<(Manifest, BinWrapper)> {
    let manifest = ManifestLoader::from_file(manifest_path)
        .await
        .with_context(|| format!("Failed to load manifest {}", manifest_path))?;
    let wrapper = manifest.to_builder().build()?;
    log::debug!("Session: {:?}", wrapper);

    if !quiet {
        wrapper.progress().subscribe(print_progress);
    }
    Ok((manifest, wrapper))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Commands::Platform => {
            let platform = Platform::current();
            println!("{} {}", platform.os, platform.arch);
        }
        Commands::Path => {
            let (_, wrapper) = load_session(&cli.manifest, true).await?;
            println!("{}", wrapper.path().display());
        }
        Commands::Download => {
            let (_, wrapper) = load_session(&cli.manifest, cli.quiet).await?;
            wrapper.download().await?;
            println!("{}", wrapper.path().display());
        }
        Commands::Install { probe } => {
            let (manifest, wrapper) = load_session(&cli.manifest, cli.quiet).await?;
            let probe = if probe.is_empty() { manifest.probe } else { probe };
            wrapper.run_with_probe(&probe).await?;
            println!("{}", wrapper.path().display());
        }
    }

    Ok(())
}
