//! End-to-end tests: load dumps from disk, query, reopen, reload

use georipe::database::{DatasetFamily, NetblockDatabase, Source};
use georipe::datasets::RegistrySource;
use georipe::lens::ancestors::{format_tree, AncestorLens};
use georipe::lens::ingest::{GeoInput, IngestLens, RegistryInput};
use georipe::lens::query::{NetblockQuery, QueryLens};
use georipe::lens::utils::summarize;
use georipe::NetblockError;
use std::path::Path;

const RIPE_DUMP: &str = "\
% RIPE test dump

inetnum:        193.0.0.0 - 193.0.255.255
netname:        RIPE-BLOCK
descr:          RIPE allocation
country:        EU

inetnum:        193.0.0.0 - 193.0.7.255
netname:        RIPE-NCC
descr:          RIPE Network Coordination Centre
country:        NL

inetnum:        193.0.6.0 - 193.0.6.255
netname:        RIPE-NCC-SERVICES
descr:          Services network
country:        NL

inetnum:        0.0.0.0 - 0.255.255.255
netname:        NON-RIPE-NCC-MANAGED-ADDRESS-BLOCK

inetnum:        193.0.9.0 - 193.0.9.255
netname:        NEVER-TERMINATED
country:        NL";

const APNIC_DUMP: &str = "\
inetnum:        1.1.1.0 - 1.1.1.255
netname:        APNIC-LABS
descr:          APNIC and Cloudflare DNS Resolver project
country:        AU

";

const LOCATIONS: &str = "\
geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name,city_name
2759794,en,EU,Europe,NL,Netherlands,Amsterdam
2988507,en,EU,Europe,FR,France,Paris
";

const BLOCKS: &str = "\
network,geoname_id,registered_country_geoname_id,latitude,longitude,accuracy_radius
193.0.0.0/21,2759794,2759794,52.3759,4.8975,20
193.0.8.0/24,2759794,2759794,52.3759,4.8975,20
2.0.0.0/16,2988507,2988507,48.8534,2.3488,100
";

const ASN: &str = "\
network,autonomous_system_number,autonomous_system_organization
193.0.0.0/21,3333,Reseaux IP Europeens Network Coordination Centre (RIPE NCC)
2.0.0.0/16,3215,Orange S.A.
";

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

fn netnames(db: &NetblockDatabase, query: NetblockQuery) -> Vec<String> {
    QueryLens::new(db)
        .search_all(&query.project(["netname"]))
        .unwrap()
        .into_iter()
        .map(|row| row.get("netname").unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_registry_load_query_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let data_dir = data_dir.to_str().unwrap();
    let ripe = write(dir.path(), "ripe.db", RIPE_DUMP);
    let apnic = write(dir.path(), "apnic.db", APNIC_DUMP);

    {
        let db = NetblockDatabase::open_in_dir(data_dir, DatasetFamily::Registry).unwrap();
        let report = IngestLens::new(&db)
            .ingest_registries(&[
                RegistryInput::new(RegistrySource::Ripe, ripe.clone()),
                RegistryInput::new(RegistrySource::Apnic, apnic),
            ])
            .unwrap();
        assert!(report.is_success());
        // unallocated block skipped, unterminated trailing block dropped
        assert_eq!(report.outcomes[0].records, 3);
        assert_eq!(report.outcomes[1].records, 1);
        assert_eq!(report.total_records(), 4);
    }

    // reopen from disk
    let db = NetblockDatabase::open_in_dir(data_dir, DatasetFamily::Registry).unwrap();
    assert_eq!(db.networks().count().unwrap(), 4);

    let query = NetblockQuery::new().constraint(
        "ipaddr",
        ["193.0.6.139", "1.1.1.1", "193.0.9.1", "8.8.8.8"],
    );
    assert_eq!(
        netnames(&db, query),
        vec!["RIPE-NCC-SERVICES", "APNIC-LABS", "RIPE-BLOCK"]
    );

    let query = NetblockQuery::new().constraint("inetnums", ["193.0.0.0/16"]);
    assert_eq!(
        netnames(&db, query),
        vec!["RIPE-NCC", "RIPE-BLOCK", "RIPE-NCC-SERVICES"]
    );

    let query = NetblockQuery::new()
        .constraint("country", ["NL", "AU"])
        .constraint("no_descr", ["services"]);
    assert_eq!(netnames(&db, query), vec!["RIPE-NCC", "APNIC-LABS"]);

    // ancestors of the most specific block
    let records: Vec<_> = QueryLens::new(&db)
        .records(&NetblockQuery::new().constraint("netname", ["RIPE-NCC-SERVICES"]))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    let chain = AncestorLens::new(&db).ancestors(&records[0]).unwrap();
    assert_eq!(
        format_tree(&records[0], &chain, "netname"),
        "193.0.6.0/24 RIPE-NCC-SERVICES\n 193.0.0.0/21 RIPE-NCC\n  193.0.0.0/16 RIPE-BLOCK\n"
    );

    // reloading RIPE replaces only RIPE rows
    let smaller = write(
        dir.path(),
        "ripe-small.db",
        "inetnum: 193.0.0.0/16\nnetname: RIPE-ONLY\n\n",
    );
    let report = IngestLens::new(&db)
        .ingest_registries(&[RegistryInput::new(RegistrySource::Ripe, smaller)])
        .unwrap();
    assert_eq!(report.outcomes[0].replaced, 3);
    assert_eq!(db.networks().count_by_source(Source::Ripe).unwrap(), 1);
    assert_eq!(db.networks().count_by_source(Source::Apnic).unwrap(), 1);

    let info = db.source_info().unwrap();
    let ripe_info = info.iter().find(|i| i.source == Source::Ripe).unwrap();
    assert_eq!(ripe_info.last_ingested, Some(1));
    assert!(ripe_info.updated_at.is_some());
    let arin_info = info.iter().find(|i| i.source == Source::Arin).unwrap();
    assert!(arin_info.updated_at.is_none());
}

#[test]
fn test_missing_source_keeps_previous_generation() {
    let dir = tempfile::tempdir().unwrap();
    let ripe = write(dir.path(), "ripe.db", RIPE_DUMP);
    let db = NetblockDatabase::open_in_memory(DatasetFamily::Registry).unwrap();
    let lens = IngestLens::new(&db);

    lens.ingest_registries(&[RegistryInput::new(RegistrySource::Ripe, ripe)])
        .unwrap();

    let missing = dir.path().join("missing.db");
    let apnic = write(dir.path(), "apnic.db", APNIC_DUMP);
    let report = lens
        .ingest_registries(&[
            RegistryInput::new(RegistrySource::Ripe, missing.to_str().unwrap()),
            RegistryInput::new(RegistrySource::Apnic, apnic),
        ])
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].source, Some(Source::Ripe));
    assert_eq!(db.networks().count_by_source(Source::Ripe).unwrap(), 3);
    assert_eq!(db.networks().count_by_source(Source::Apnic).unwrap(), 1);
}

#[test]
fn test_geolocation_load_and_area_queries() {
    let dir = tempfile::tempdir().unwrap();
    let input = GeoInput {
        blocks: write(dir.path(), "blocks.csv", BLOCKS),
        locations: write(dir.path(), "locations.csv", LOCATIONS),
        asn: Some(write(dir.path(), "asn.csv", ASN)),
    };

    let db = NetblockDatabase::open_in_memory(DatasetFamily::Geolocation).unwrap();
    let report = IngestLens::new(&db).ingest_geolocation(&input).unwrap();
    assert!(report.is_success());
    assert_eq!(report.total_records(), 3);
    assert_eq!(report.asn.as_ref().map(|a| a.updated), Some(2));

    let lens = QueryLens::new(&db);
    let query = NetblockQuery::new()
        .constraint("ipaddr", ["193.0.6.139"])
        .project(["network", "asn", "org", "city"]);
    let rows = lens.search_all(&query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].values(),
        vec![
            "193.0.0.0/21",
            "3333",
            "Reseaux IP Europeens Network Coordination Centre (RIPE NCC)",
            "amsterdam"
        ]
    );

    // 50km around Amsterdam excludes Paris
    let query = NetblockQuery::new()
        .constraint("circle", ["52.37N 4.90E 50"])
        .project(["network", "country"]);
    let rows = lens.search_all(&query).unwrap();
    assert_eq!(rows.len(), 2);

    let projection = vec!["network".to_string(), "country".to_string()];
    let summary = summarize(&rows, &projection, "network");
    assert_eq!(summary.get("network"), Some("2304 ip"));
    assert_eq!(summary.get("country"), Some("1"));

    let query = NetblockQuery::new()
        .constraint("square", ["40 0 50 3"])
        .project(["city"]);
    let rows = lens.search_all(&query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("city"), Some("paris"));

    // registry-only constraint names are rejected
    let err = lens
        .search_all(&NetblockQuery::new().constraint("netname", ["x"]))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NetblockError>(),
        Some(NetblockError::UnknownField(_))
    ));
}
