//! Tapedeck CLI

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tapedeck::{Config, Store};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Tapedeck v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: tapedeck <command> <path>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  show <cassette.json>   List recorded interactions");
        eprintln!("  check <config.toml>    Validate a configuration file");
        process::exit(1);
    }

    let path = Path::new(&args[2]);
    let result = match args[1].as_str() {
        "show" => show_cassette(path),
        "check" => check_config(path),
        command => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'tapedeck' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn show_cassette(path: &Path) -> Result<()> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("cassette path has no file name")?;
    let store = Store::load_from(name, path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    println!("Cassette: {} ({} interactions)", path.display(), store.len());
    println!();
    for interaction in store.interactions() {
        println!(
            "{:>4}  {:<7} {}  -> {} ({} bytes)",
            interaction.id,
            interaction.request.method,
            interaction.request.url,
            interaction.response.status_code,
            interaction.response.body.len()
        );
    }
    Ok(())
}

fn check_config(path: &Path) -> Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;

    println!("Configuration OK");
    println!("  mode:         {:?}", config.mode);
    println!("  cassette_dir: {}", config.cassette_dir.display());
    println!("  matcher:      {:?}", config.matcher);
    Ok(())
}
