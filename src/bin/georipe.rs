use clap::{Parser, Subcommand};
use georipe::lens::utils::OutputFormat;
use georipe::GeoripeConfig;
use tracing::Level;

mod commands;

use commands::geoip::GeoipArgs;
use commands::registry::RegistryArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.georipe/georipe.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regional internet registry (WHOIS) netblocks
    Registry(RegistryArgs),

    /// Geolocation netblocks
    Geoip(GeoipArgs),

    /// Show configuration and database status
    Info,
}

fn main() {
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match GeoripeConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Registry(args) => commands::registry::run(&config, args, cli.format),
        Commands::Geoip(args) => commands::geoip::run(&config, args, cli.format),
        Commands::Info => commands::info::run(&config, cli.format),
    }
}
