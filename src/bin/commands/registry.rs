use super::search::{self, SearchArgs};
use super::{finish_ingest, ingest_spinner, open_store};
use clap::{Args, Subcommand};
use georipe::database::DatasetFamily;
use georipe::datasets::RegistrySource;
use georipe::lens::ingest::{IngestLens, RegistryInput};
use georipe::lens::utils::OutputFormat;
use georipe::GeoripeConfig;

/// Arguments for the Registry command
#[derive(Args)]
pub struct RegistryArgs {
    #[clap(subcommand)]
    pub command: RegistryCommands,
}

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Load registry (WHOIS) dumps, replacing each loaded registry's records
    Update {
        /// Dump to load as REGISTRY=PATH (ripe, apnic, afrinic, lacnic, arin); gz/bz2 accepted
        #[clap(long = "file", value_name = "REGISTRY=PATH", required = true)]
        files: Vec<String>,

        /// Only load these registries out of the given files
        #[clap(long)]
        source: Vec<RegistrySource>,
    },

    /// Search registry netblocks
    Search(SearchArgs),

    /// List known registries and their dump locations
    Sources,
}

pub fn run(config: &GeoripeConfig, args: RegistryArgs, output_format: OutputFormat) {
    match args.command {
        RegistryCommands::Update { files, source } => {
            run_update(config, &files, &source, output_format)
        }
        RegistryCommands::Search(search_args) => {
            search::run(config, DatasetFamily::Registry, search_args, output_format)
        }
        RegistryCommands::Sources => run_sources(),
    }
}

fn parse_file_arg(arg: &str) -> Result<RegistryInput, String> {
    let (name, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("invalid --file '{}', expected REGISTRY=PATH", arg))?;
    let registry: RegistrySource = name.trim().parse()?;
    Ok(RegistryInput::new(registry, path.trim()))
}

fn run_update(
    config: &GeoripeConfig,
    files: &[String],
    only: &[RegistrySource],
    output_format: OutputFormat,
) {
    let mut inputs = Vec::new();
    for arg in files {
        match parse_file_arg(arg) {
            Ok(input) if only.is_empty() || only.contains(&input.registry) => inputs.push(input),
            Ok(input) => eprintln!("skipping {} ({})", input.registry, input.path),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        }
    }
    if inputs.is_empty() {
        eprintln!("ERROR: no registry dumps selected");
        std::process::exit(1);
    }

    let db = open_store(config, DatasetFamily::Registry);
    let (pb, callback) = ingest_spinner();
    let lens = IngestLens::new(&db)
        .with_options(config.ingest_options())
        .with_progress(callback);

    match lens.ingest_registries(&inputs) {
        Ok(report) => finish_ingest(pb, &report, output_format),
        Err(e) => {
            pb.finish_and_clear();
            eprintln!("ERROR: Failed to load registry data: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_sources() {
    for registry in RegistrySource::ALL {
        let format = registry.format();
        println!(
            "{:<8} key={:<8} fields={}\n         {}",
            registry.to_string(),
            format.key_field,
            format.fields.join(","),
            registry.dump_url()
        );
    }
}
