use super::{open_store, print_rows};
use clap::Args;
use georipe::database::DatasetFamily;
use georipe::lens::ancestors::{format_tree, AncestorLens};
use georipe::lens::query::{parse_constraint_arg, NetblockQuery, QueryLens, ADDRESS_ATTRIBUTE};
use georipe::lens::utils::{summarize, OutputFormat};
use georipe::GeoripeConfig;
use tracing::info;

/// Arguments shared by `registry search` and `geoip search`
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Constraint as FIELD=VALUE, repeatable. VALUE may name a file of values, or `-` for stdin
    #[clap(short = 'q', long = "query", value_name = "FIELD=VALUE")]
    pub queries: Vec<String>,

    /// Comma-separated output fields, defaults to the dataset's standard columns
    #[clap(short = 'F', long, value_delimiter = ',')]
    pub fields: Vec<String>,

    /// Print the chain of enclosing blocks for every match
    #[clap(long)]
    pub tree: bool,

    /// Append a summary row (distinct values per field, address count)
    #[clap(long)]
    pub summary: bool,

    /// Addresses to look up, shorthand for `-q ipaddr=ADDRESS`
    #[clap(value_name = "ADDRESS")]
    pub items: Vec<String>,
}

pub fn run(
    config: &GeoripeConfig,
    family: DatasetFamily,
    args: SearchArgs,
    output_format: OutputFormat,
) {
    let query = match build_query(config, &args) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let db = open_store(config, family);
    if db.networks().is_empty() {
        eprintln!(
            "WARNING: the {} database is empty, run `georipe {} update` first",
            family,
            match family {
                DatasetFamily::Registry => "registry",
                DatasetFamily::Geolocation => "geoip",
            }
        );
    }

    let lens = QueryLens::new(&db);
    let projection = query.projection(family);

    if args.tree {
        let records = match lens.records(&query) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        };
        let label = projection
            .iter()
            .find(|f| f.as_str() != family.range_field())
            .cloned()
            .unwrap_or_default();
        let ancestors = AncestorLens::new(&db);
        for record in records {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    std::process::exit(1);
                }
            };
            match ancestors.ancestors(&record) {
                Ok(chain) => print!("{}", format_tree(&record, &chain, &label)),
                Err(e) => eprintln!("ERROR: Failed to find ancestors: {}", e),
            }
        }
        return;
    }

    let mut rows = match lens.search_all(&query) {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };
    info!("{} rows matched", rows.len());

    if args.summary {
        let summary = summarize(&rows, &projection, family.range_field());
        rows.push(summary);
    }
    print_rows(&rows, &projection, output_format);
}

fn build_query(config: &GeoripeConfig, args: &SearchArgs) -> anyhow::Result<NetblockQuery> {
    let mut query = NetblockQuery::new()
        .project(args.fields.iter().map(|f| f.trim().to_string()))
        .address_parsing(config.address_parsing());

    for arg in &args.queries {
        let (field, value) = parse_constraint_arg(arg)?;
        query.add_constraint(&field, [value]);
    }
    if !args.items.is_empty() {
        query.add_constraint(ADDRESS_ATTRIBUTE, args.items.iter().cloned());
    }
    if query.constraints().is_empty() {
        return Err(anyhow::anyhow!(
            "no constraints given, pass -q FIELD=VALUE or an address"
        ));
    }

    let stdin = std::io::stdin();
    query.expand_inputs(&mut stdin.lock())
}
