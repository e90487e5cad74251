use super::search::{self, SearchArgs};
use super::{finish_ingest, ingest_spinner, open_store};
use clap::{Args, Subcommand};
use georipe::database::DatasetFamily;
use georipe::datasets::{locations_file_name, ASN_BLOCKS_FILE_NAME, BLOCKS_FILE_NAME};
use georipe::lens::ingest::{GeoInput, IngestLens};
use georipe::lens::utils::OutputFormat;
use georipe::GeoripeConfig;
use std::path::Path;

/// Arguments for the Geoip command
#[derive(Args)]
pub struct GeoipArgs {
    #[clap(subcommand)]
    pub command: GeoipCommands,
}

#[derive(Subcommand)]
pub enum GeoipCommands {
    /// Load geolocation CSV tables, replacing the stored geolocation records
    Update {
        /// Directory holding the standard GeoLite2 CSV file names
        #[clap(long, conflicts_with_all = ["blocks", "locations"])]
        dir: Option<String>,

        /// City blocks CSV (network, geoname_id, latitude, longitude)
        #[clap(long, requires = "locations")]
        blocks: Option<String>,

        /// City locations CSV (geoname_id, continent, country, city)
        #[clap(long, requires = "blocks")]
        locations: Option<String>,

        /// ASN blocks CSV (network, asn, organization)
        #[clap(long)]
        asn: Option<String>,
    },

    /// Search geolocation netblocks
    Search(SearchArgs),
}

pub fn run(config: &GeoripeConfig, args: GeoipArgs, output_format: OutputFormat) {
    match args.command {
        GeoipCommands::Update {
            dir,
            blocks,
            locations,
            asn,
        } => {
            let input = match resolve_input(config, dir, blocks, locations, asn) {
                Some(input) => input,
                None => {
                    eprintln!("ERROR: pass either --dir or both --blocks and --locations");
                    std::process::exit(1);
                }
            };
            run_update(config, &input, output_format)
        }
        GeoipCommands::Search(search_args) => search::run(
            config,
            DatasetFamily::Geolocation,
            search_args,
            output_format,
        ),
    }
}

fn resolve_input(
    config: &GeoripeConfig,
    dir: Option<String>,
    blocks: Option<String>,
    locations: Option<String>,
    asn: Option<String>,
) -> Option<GeoInput> {
    match (dir, blocks, locations) {
        (Some(dir), _, _) => {
            let join = |name: &str| Path::new(&dir).join(name).to_string_lossy().to_string();
            let asn_path = Path::new(&dir).join(ASN_BLOCKS_FILE_NAME);
            Some(GeoInput {
                blocks: join(BLOCKS_FILE_NAME),
                locations: join(&locations_file_name(&config.geoip_language)),
                asn: asn.or_else(|| {
                    asn_path
                        .exists()
                        .then(|| asn_path.to_string_lossy().to_string())
                }),
            })
        }
        (None, Some(blocks), Some(locations)) => Some(GeoInput {
            blocks,
            locations,
            asn,
        }),
        _ => None,
    }
}

fn run_update(config: &GeoripeConfig, input: &GeoInput, output_format: OutputFormat) {
    let db = open_store(config, DatasetFamily::Geolocation);
    let (pb, callback) = ingest_spinner();
    let lens = IngestLens::new(&db)
        .with_options(config.ingest_options())
        .with_progress(callback);

    match lens.ingest_geolocation(input) {
        Ok(report) => finish_ingest(pb, &report, output_format),
        Err(e) => {
            pb.finish_and_clear();
            eprintln!("ERROR: Failed to load geolocation data: {}", e);
            std::process::exit(1);
        }
    }
}
