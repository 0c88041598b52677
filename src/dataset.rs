use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transform::{ContractAggregate, FlatRecord, GeoPoint};

/// One CSV row of the tabular dataset. Scalar columns are stored as-is;
/// the geocode and the six aggregate columns hold JSON text so the file
/// round-trips the nested values exactly.
#[derive(Debug, Serialize, Deserialize)]
struct DatasetRow {
    enterprise_provider_id: String,
    generated_key: String,
    doc_expire_date: i64,
    first_name: String,
    middle_name: String,
    last_name: String,
    org_name: String,
    prov_type_code: String,
    organization_type_code: String,
    address_id: i64,
    address_line: String,
    city_name: String,
    county_name: String,
    state_code: String,
    zipcode: String,
    geocode: String,
    csp_contract: String,
    national_taxonomy: String,
    cosmos_contract: String,
    unet_contract: String,
    specialty_org: String,
    contract_org: String,
}

impl DatasetRow {
    fn from_flat(record: &FlatRecord) -> Result<Self> {
        Ok(Self {
            enterprise_provider_id: record.enterprise_provider_id.clone(),
            generated_key: record.generated_key.clone(),
            doc_expire_date: record.doc_expire_date,
            first_name: record.first_name.clone(),
            middle_name: record.middle_name.clone(),
            last_name: record.last_name.clone(),
            org_name: record.org_name.clone(),
            prov_type_code: record.prov_type_code.clone(),
            organization_type_code: record.organization_type_code.clone(),
            address_id: record.address_id,
            address_line: record.address_line.clone(),
            city_name: record.city_name.clone(),
            county_name: record.county_name.clone(),
            state_code: record.state_code.clone(),
            zipcode: record.zipcode.clone(),
            geocode: serde_json::to_string(&record.geocode)
                .context("Failed encoding geocode column")?,
            csp_contract: encode_aggregate(&record.csp_contract)?,
            national_taxonomy: encode_aggregate(&record.national_taxonomy)?,
            cosmos_contract: encode_aggregate(&record.cosmos_contract)?,
            unet_contract: encode_aggregate(&record.unet_contract)?,
            specialty_org: encode_aggregate(&record.specialty_org)?,
            contract_org: encode_aggregate(&record.contract_org)?,
        })
    }

    fn into_flat(self) -> Result<FlatRecord> {
        let geocode: GeoPoint = serde_json::from_str(&self.geocode)
            .with_context(|| format!("Failed decoding geocode column {:?}", self.geocode))?;
        Ok(FlatRecord {
            enterprise_provider_id: self.enterprise_provider_id,
            generated_key: self.generated_key,
            doc_expire_date: self.doc_expire_date,
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            org_name: self.org_name,
            prov_type_code: self.prov_type_code,
            organization_type_code: self.organization_type_code,
            address_id: self.address_id,
            address_line: self.address_line,
            city_name: self.city_name,
            county_name: self.county_name,
            state_code: self.state_code,
            zipcode: self.zipcode,
            geocode,
            csp_contract: decode_aggregate(&self.csp_contract)?,
            national_taxonomy: decode_aggregate(&self.national_taxonomy)?,
            cosmos_contract: decode_aggregate(&self.cosmos_contract)?,
            unet_contract: decode_aggregate(&self.unet_contract)?,
            specialty_org: decode_aggregate(&self.specialty_org)?,
            contract_org: decode_aggregate(&self.contract_org)?,
        })
    }
}

fn encode_aggregate(aggregate: &ContractAggregate) -> Result<String> {
    serde_json::to_string(aggregate).context("Failed encoding aggregate column")
}

fn decode_aggregate(raw: &str) -> Result<ContractAggregate> {
    serde_json::from_str(raw).with_context(|| format!("Failed decoding aggregate column {raw:?}"))
}

/// Write the dataset to a temp file next to `path`, then rename it into
/// place. A fresh run overwrites the previous dataset.
pub fn write_dataset(path: &Path, rows: &[FlatRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed creating {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or("dataset.csv");
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    let mut writer = csv::Writer::from_path(&tmp_path)
        .with_context(|| format!("Failed creating dataset {}", tmp_path.display()))?;
    for record in rows {
        let row = DatasetRow::from_flat(record)?;
        writer
            .serialize(row)
            .with_context(|| format!("Failed writing dataset row {}", record.generated_key))?;
    }
    writer.flush().context("Failed flushing dataset writer")?;
    drop(writer);

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed moving dataset {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Vec<FlatRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed opening dataset {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<DatasetRow>() {
        let row =
            result.with_context(|| format!("Failed reading dataset row from {}", path.display()))?;
        rows.push(row.into_flat()?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(key: &str) -> FlatRecord {
        let mut csp_contract = ContractAggregate::new();
        csp_contract.insert("lob".to_string(), 20260302);
        csp_contract.insert("mco".to_string(), 20240115);
        let mut unet_contract = ContractAggregate::new();
        unet_contract.insert("mk1-off-a".to_string(), 20300101);

        FlatRecord {
            enterprise_provider_id: "EPI-1".to_string(),
            generated_key: key.to_string(),
            doc_expire_date: 1_748_736_000,
            first_name: "jane".to_string(),
            middle_name: "q".to_string(),
            last_name: "doe".to_string(),
            org_name: String::new(),
            prov_type_code: "md".to_string(),
            organization_type_code: "hosp".to_string(),
            address_id: 12345,
            address_line: "1 main st".to_string(),
            city_name: "new london".to_string(),
            county_name: "new london".to_string(),
            state_code: "ct".to_string(),
            zipcode: "06320".to_string(),
            geocode: GeoPoint { lat: 41.35, lng: -72.09 },
            csp_contract,
            national_taxonomy: ContractAggregate::new(),
            cosmos_contract: ContractAggregate::new(),
            unet_contract,
            specialty_org: ContractAggregate::new(),
            contract_org: ContractAggregate::new(),
        }
    }

    #[test]
    fn dataset_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practitioner_sample_data.csv");
        let rows = vec![sample_record("key-1"), sample_record("key-2")];

        write_dataset(&path, &rows).unwrap();
        let reread = read_dataset(&path).unwrap();

        assert_eq!(reread, rows);
    }

    #[test]
    fn zipcode_keeps_leading_zero_through_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_dataset(&path, &[sample_record("key-1")]).unwrap();
        let reread = read_dataset(&path).unwrap();
        assert_eq!(reread[0].zipcode, "06320");
    }

    #[test]
    fn rewrite_overwrites_previous_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        write_dataset(&path, &[sample_record("key-1"), sample_record("key-2")]).unwrap();
        write_dataset(&path, &[sample_record("key-3")]).unwrap();
        let reread = read_dataset(&path).unwrap();
        assert_eq!(reread.len(), 1);
        assert_eq!(reread[0].generated_key, "key-3");
    }
}
