use serde_json::{Value, json};

use provider_search_etl::dataset::{read_dataset, write_dataset};
use provider_search_etl::queries::{QueryParams, synthesize};
use provider_search_etl::record::{ContractSection, EntityType};
use provider_search_etl::settings::Settings;
use provider_search_etl::transform::transform;

fn raw_organization(key: &str, name: &str) -> Value {
    json!({
        "enterpriseProviderId": format!("EPI-{key}"),
        "generatedKey": key,
        "providerData": [{
            "voidedIndicator": "N",
            "cancelDate": "2025-06-01",
            "firstName": "",
            "middleName": "",
            "lastName": name,
            "providerTypeCode": "ORG",
            "organizationTypeCode": "HOSP"
        }],
        "providerTinAddressData": [{
            "addressId": "42",
            "addressLine1": "1 Main St",
            "cityName": "New London",
            "countyName": "New London",
            "stateCode": "CT",
            "zipCode": "6320",
            "latitude": "41.35",
            "longitude": "-72.09"
        }],
        "cspContractData": [{
            "cspProviderId": "C1",
            "ovationLOBTypeCode": "LOB",
            "voidedIndicator": "N",
            "cancelDate": "2026-03-02"
        }],
        "nationalProviderIdData": [],
        "cosmosContractData": [],
        "unetContractData": [],
        "specialtyContractingOrgData": [],
        "addressContractingOrgData": []
    })
}

#[test]
fn raw_json_flows_through_dataset_to_queries() {
    let mut voided = raw_organization("key-2", "Voided Org");
    voided["providerData"][0]["voidedIndicator"] = json!("Y");
    let mut malformed = raw_organization("key-3", "Broken Org");
    malformed["providerTinAddressData"][0]["latitude"] = json!("north");

    let batch = vec![raw_organization("key-1", "Acme Health"), voided, malformed];
    let (rows, summary) = transform(&batch, EntityType::Organization, 20230601);

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.emitted, 1);
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(rows[0].org_name, "acme health");
    assert_eq!(rows[0].zipcode, "06320");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("organization_sample_data.csv");
    write_dataset(&path, &rows).unwrap();
    let reread = read_dataset(&path).unwrap();
    assert_eq!(reread, rows);

    let params = QueryParams {
        entity: EntityType::Organization,
        n_queries: 10,
        hits: 10,
        geo_probability: 1.0,
        filter_probability: 1.0,
        geo_scale: 0.75,
        filter_fields: &ContractSection::ALL,
        cutoff_date: 20230601,
    };
    let queries = synthesize(&reread, &params);
    assert_eq!(queries.len(), 1, "query count capped at dataset size");

    let query = &queries[0];
    assert!(query.starts_with("/search/?yql=select+generated_key+from+sources+organization"));
    assert!(query.contains("ranking.profile=org_geo_filter"));
    assert!(query.contains("geoLocation%28geocode"));
    assert!(query.contains("csp_contract+contains+sameElement"));
    assert!(query.contains("value%3E20230601"));
}

#[test]
fn settings_file_round_trip_and_bad_feed_mode() {
    let dir = tempfile::tempdir().unwrap();

    let good = dir.path().join("settings.toml");
    std::fs::write(
        &good,
        r#"
            cutoff_date = 20230601
            schema = "practitioner"
            feed_mode = "point"
            bench_target = "tutorial"

            [[inputs]]
            entity = "practitioner"
            file = "practitioner_sample_data.json"
        "#,
    )
    .unwrap();
    let settings = Settings::load(&good).unwrap();
    assert_eq!(settings.schema, EntityType::Practitioner);
    assert_eq!(settings.cutoff_date, 20230601);

    let bad = dir.path().join("bad.toml");
    std::fs::write(
        &bad,
        r#"
            cutoff_date = 20230601
            schema = "practitioner"
            feed_mode = "firehose"
            bench_target = "tutorial"

            [[inputs]]
            entity = "practitioner"
            file = "practitioner_sample_data.json"
        "#,
    )
    .unwrap();
    let err = Settings::load(&bad).unwrap_err();
    assert!(format!("{err:#}").contains("unknown feed mode"));
}
