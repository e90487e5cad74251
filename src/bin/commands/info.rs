use georipe::config::{format_size, get_store_info, StoreInfo};
use georipe::database::DatasetFamily;
use georipe::lens::utils::OutputFormat;
use georipe::GeoripeConfig;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

#[derive(Debug, Serialize)]
struct Info {
    config_file: String,
    data_dir: String,
    stores: Vec<StoreInfo>,
}

pub fn run(config: &GeoripeConfig, output_format: OutputFormat) {
    let mut stores = Vec::new();
    for family in [DatasetFamily::Registry, DatasetFamily::Geolocation] {
        match get_store_info(config, family) {
            Ok(info) => stores.push(info),
            Err(e) => eprintln!("ERROR: Failed to read {} database: {}", family, e),
        }
    }

    let info = Info {
        config_file: GeoripeConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        stores,
    };

    if !output_format.is_json() {
        print_info_table(config, &info, output_format);
        return;
    }
    let serialized = match output_format {
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&info),
        _ => serde_json::to_string(&info),
    };
    match serialized {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing info: {}", e),
    }
}

fn print_info_table(config: &GeoripeConfig, info: &Info, output_format: OutputFormat) {
    println!("Configuration ({})", info.config_file);
    println!("{}", config.summary());

    for store in &info.stores {
        println!();
        let size = store
            .size_bytes
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        println!("{} database: {} ({})", store.family, store.path, size);
        if !store.exists {
            println!("  not created yet");
            continue;
        }
        if let Some(problem) = &store.problem {
            println!("  {}; the next update will rebuild it", problem);
            continue;
        }

        let mut builder = Builder::default();
        builder.push_record(["source", "records", "last load", "updated"]);
        for source in &store.sources {
            builder.push_record([
                source.source.to_string(),
                source.records.to_string(),
                source
                    .last_ingested
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                source
                    .updated_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            ]);
        }
        let mut table = builder.build();
        match output_format {
            OutputFormat::Markdown => table.with(Style::markdown()),
            _ => table.with(Style::rounded()),
        };
        println!("{}", table);
    }
}
