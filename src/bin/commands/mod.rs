pub mod geoip;
pub mod info;
pub mod registry;
pub mod search;

use georipe::database::{DatasetFamily, NetblockDatabase};
use georipe::lens::ingest::{IngestProgress, IngestProgressCallback, IngestReport};
use georipe::lens::query::ResultRow;
use georipe::lens::utils::{render_rows, OutputFormat};
use georipe::GeoripeConfig;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Open a family's store or exit with a diagnostic
pub(crate) fn open_store(config: &GeoripeConfig, family: DatasetFamily) -> NetblockDatabase {
    match NetblockDatabase::open_in_dir(&config.data_dir, family) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to open {} database: {}", family, e);
            std::process::exit(1);
        }
    }
}

/// Spinner plus a progress callback that drives it
pub(crate) fn ingest_spinner() -> (ProgressBar, IngestProgressCallback) {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));

    let pb_for_updates = pb.clone();
    let callback: IngestProgressCallback = Arc::new(move |progress| match progress {
        IngestProgress::Started { source, input } => {
            pb_for_updates.set_message(format!("{}: loading {}", source, input));
        }
        IngestProgress::Update {
            source,
            records,
            elapsed_secs,
        } => {
            pb_for_updates.set_message(format!(
                "{}: {} records ({:.0}s)",
                source, records, elapsed_secs
            ));
        }
        IngestProgress::Completed {
            source,
            records,
            duration_secs,
        } => {
            pb_for_updates.println(format!(
                "{}: {} records in {:.1}s",
                source, records, duration_secs
            ));
        }
        IngestProgress::Failed { source, error } => {
            pb_for_updates.println(format!("{}: FAILED: {}", source, error));
        }
        IngestProgress::AsnApplied { updated } => {
            pb_for_updates.println(format!("asn: {} networks updated", updated));
        }
        IngestProgress::IndexesRebuilt { duration_secs } => {
            pb_for_updates.set_message(format!("indexes rebuilt in {:.1}s", duration_secs));
        }
    });

    (pb, callback)
}

/// Print an ingestion report and exit non-zero if any source failed
pub(crate) fn finish_ingest(pb: ProgressBar, report: &IngestReport, output_format: OutputFormat) {
    pb.finish_and_clear();

    if output_format.is_json() {
        let serialized = match output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report),
            _ => serde_json::to_string(report),
        };
        match serialized {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("ERROR: Failed to serialize report: {}", e),
        }
    } else {
        let mut builder = Builder::default();
        builder.push_record(["source", "input", "records", "replaced", "skipped", "error"]);
        for outcome in &report.outcomes {
            builder.push_record([
                outcome
                    .source
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                outcome.input.clone(),
                outcome.records.to_string(),
                outcome.replaced.to_string(),
                outcome.skipped.to_string(),
                outcome.error.clone().unwrap_or_default(),
            ]);
        }
        if let Some(asn) = &report.asn {
            builder.push_record([
                "asn".to_string(),
                asn.input.clone(),
                asn.updated.to_string(),
                String::new(),
                asn.skipped.to_string(),
                asn.error.clone().unwrap_or_default(),
            ]);
        }
        let mut table = builder.build();
        if output_format == OutputFormat::Markdown {
            table.with(Style::markdown());
        } else {
            table.with(Style::rounded());
        }
        println!("{}", table);
    }

    if !report.is_success() {
        std::process::exit(1);
    }
}

/// Print result rows in the requested format
pub(crate) fn print_rows(rows: &[ResultRow], projection: &[String], output_format: OutputFormat) {
    match render_rows(rows, projection, output_format) {
        Ok(text) if text.is_empty() => {}
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("ERROR: Failed to serialize to JSON: {}", e),
    }
}
