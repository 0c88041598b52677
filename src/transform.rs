use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::record::{ContractSection, EntityType, RawProviderRecord, is_voided};

/// Composite code -> max surviving expiry date (`YYYYMMDD`).
pub type ContractAggregate = BTreeMap<String, u32>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One denormalized row of the tabular dataset, keyed by `generated_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub enterprise_provider_id: String,
    pub generated_key: String,
    /// Profile expiry as unix epoch seconds. Contract aggregates use
    /// `YYYYMMDD` integers instead; the units are intentionally different.
    pub doc_expire_date: i64,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub org_name: String,
    pub prov_type_code: String,
    pub organization_type_code: String,
    pub address_id: i64,
    pub address_line: String,
    pub city_name: String,
    pub county_name: String,
    pub state_code: String,
    pub zipcode: String,
    pub geocode: GeoPoint,
    pub csp_contract: ContractAggregate,
    pub national_taxonomy: ContractAggregate,
    pub cosmos_contract: ContractAggregate,
    pub unet_contract: ContractAggregate,
    pub specialty_org: ContractAggregate,
    pub contract_org: ContractAggregate,
}

impl FlatRecord {
    pub fn aggregate(&self, section: ContractSection) -> &ContractAggregate {
        match section {
            ContractSection::Csp => &self.csp_contract,
            ContractSection::NationalTaxonomy => &self.national_taxonomy,
            ContractSection::Cosmos => &self.cosmos_contract,
            ContractSection::UnetProduct => &self.unet_contract,
            ContractSection::Specialty => &self.specialty_org,
            ContractSection::ContractingOrg => &self.contract_org,
        }
    }

    fn aggregate_mut(&mut self, section: ContractSection) -> &mut ContractAggregate {
        match section {
            ContractSection::Csp => &mut self.csp_contract,
            ContractSection::NationalTaxonomy => &mut self.national_taxonomy,
            ContractSection::Cosmos => &mut self.cosmos_contract,
            ContractSection::UnetProduct => &mut self.unet_contract,
            ContractSection::Specialty => &mut self.specialty_org,
            ContractSection::ContractingOrg => &mut self.contract_org,
        }
    }
}

/// Why a raw record produced no flat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    VoidedIdentity,
    MissingEnterpriseId,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DropReason::VoidedIdentity => "voided identity section",
            DropReason::MissingEnterpriseId => "missing enterprise provider id",
        })
    }
}

/// Outcome of transforming one raw record. Dropping is an expected outcome,
/// not an error, and is distinct from a section that merely aggregated to
/// empty.
#[derive(Debug)]
pub enum Transformed {
    Record(Box<FlatRecord>),
    Dropped(DropReason),
}

/// Flatten one raw record. A voided identity or missing enterprise id drops
/// the whole record before any other section is touched; a malformed field
/// fails this record only.
pub fn transform_one(
    raw: &RawProviderRecord,
    entity: EntityType,
    cutoff_date: u32,
) -> Result<Transformed, PipelineError> {
    if raw.enterprise_provider_id().is_empty() {
        return Ok(Transformed::Dropped(DropReason::MissingEnterpriseId));
    }

    // Identity and address use the first sub-record only; extras are ignored.
    let identity = raw
        .provider_data
        .first()
        .ok_or_else(|| PipelineError::malformed("providerData", "section is empty"))?;
    if is_voided(&identity.voided_indicator) {
        return Ok(Transformed::Dropped(DropReason::VoidedIdentity));
    }

    let doc_expire_date =
        epoch_seconds(parse_calendar_date("cancelDate", &identity.cancel_date)?);

    let mut last_name = identity.last_name.to_lowercase();
    let mut org_name = String::new();
    if entity.is_organization() {
        // The source stores the organization name in the last-name slot.
        org_name = std::mem::take(&mut last_name);
    }

    let address = raw
        .address_data
        .first()
        .ok_or_else(|| PipelineError::malformed("providerTinAddressData", "section is empty"))?;

    let mut record = FlatRecord {
        enterprise_provider_id: raw.enterprise_provider_id().to_string(),
        generated_key: raw.generated_key.clone(),
        doc_expire_date,
        first_name: identity.first_name.to_lowercase(),
        middle_name: identity.middle_name.to_lowercase(),
        last_name,
        org_name,
        prov_type_code: identity.provider_type_code.to_lowercase(),
        organization_type_code: identity.organization_type_code.to_lowercase(),
        address_id: parse_i64("addressId", &address.address_id)?,
        address_line: address.address_line1.to_lowercase(),
        city_name: address.city_name.to_lowercase(),
        county_name: address.county_name.to_lowercase(),
        state_code: address.state_code.to_lowercase(),
        zipcode: pad_zip(&address.zip_code)?,
        geocode: GeoPoint {
            lat: parse_f64("latitude", &address.latitude)?,
            lng: parse_f64("longitude", &address.longitude)?,
        },
        csp_contract: ContractAggregate::new(),
        national_taxonomy: ContractAggregate::new(),
        cosmos_contract: ContractAggregate::new(),
        unet_contract: ContractAggregate::new(),
        specialty_org: ContractAggregate::new(),
        contract_org: ContractAggregate::new(),
    };

    for section in ContractSection::ALL {
        *record.aggregate_mut(section) = aggregate_section(raw, section, cutoff_date)?;
    }

    Ok(Transformed::Record(Box::new(record)))
}

/// Aggregate one contract section: composite code -> max expiry among
/// non-voided sub-records with a non-empty id and an expiry on or past the
/// cutoff. An empty result is valid.
fn aggregate_section(
    raw: &RawProviderRecord,
    section: ContractSection,
    cutoff_date: u32,
) -> Result<ContractAggregate, PipelineError> {
    let mut aggregate = ContractAggregate::new();
    match section {
        ContractSection::Csp => {
            for sub in &raw.csp_contract_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.csp_provider_id,
                    &sub.voided_indicator,
                    &[sub.ovation_lob_type_code.as_str()],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
        ContractSection::NationalTaxonomy => {
            for sub in &raw.national_provider_id_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.national_provider_id,
                    &sub.voided_indicator,
                    &[sub.taxonomy_code.as_str()],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
        ContractSection::Cosmos => {
            for sub in &raw.cosmos_contract_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.cosmos_provider_number,
                    &sub.voided_indicator,
                    &[sub.cosmos_div.as_str(), sub.cosmos_panel_number.as_str()],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
        ContractSection::UnetProduct => {
            for sub in &raw.unet_contract_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.contract_id,
                    &sub.voided_indicator,
                    &[
                        sub.market_number.as_str(),
                        sub.product_offer_id.as_str(),
                        sub.accepting_patient_code.as_str(),
                    ],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
        ContractSection::Specialty => {
            for sub in &raw.specialty_contracting_org_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.specialty_type_code,
                    &sub.voided_indicator,
                    &[
                        sub.specialty_type_code.as_str(),
                        sub.contracting_org_code.as_str(),
                        sub.primary_code.as_str(),
                    ],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
        ContractSection::ContractingOrg => {
            for sub in &raw.address_contracting_org_data {
                fold_sub_record(
                    &mut aggregate,
                    &sub.contracting_org_code,
                    &sub.voided_indicator,
                    &[
                        sub.contracting_org_code.as_str(),
                        sub.primary_code.as_str(),
                        sub.correspondence_indicator.as_str(),
                    ],
                    &sub.cancel_date,
                    cutoff_date,
                )?;
            }
        }
    }
    Ok(aggregate)
}

fn fold_sub_record(
    aggregate: &mut ContractAggregate,
    id: &str,
    voided_indicator: &str,
    code_parts: &[&str],
    cancel_date: &str,
    cutoff_date: u32,
) -> Result<(), PipelineError> {
    if id.is_empty() || is_voided(voided_indicator) {
        return Ok(());
    }
    let code = code_parts
        .iter()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-");
    let expire_date = yyyymmdd(parse_calendar_date("cancelDate", cancel_date)?);
    if expire_date >= cutoff_date {
        aggregate
            .entry(code)
            .and_modify(|existing| *existing = (*existing).max(expire_date))
            .or_insert(expire_date);
    }
    Ok(())
}

fn parse_calendar_date(field: &'static str, raw: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| PipelineError::malformed(field, format!("{raw:?}: {err}")))
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn yyyymmdd(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Zip codes arrive as numeric strings with leading zeros already trimmed
/// upstream; re-pad to the canonical 5 digits (06320, not 6320).
fn pad_zip(raw: &str) -> Result<String, PipelineError> {
    let digits: u32 = raw
        .trim()
        .parse()
        .map_err(|err| PipelineError::malformed("zipCode", format!("{raw:?}: {err}")))?;
    Ok(format!("{digits:05}"))
}

fn parse_i64(field: &'static str, raw: &str) -> Result<i64, PipelineError> {
    raw.trim()
        .parse()
        .map_err(|err| PipelineError::malformed(field, format!("{raw:?}: {err}")))
}

fn parse_f64(field: &'static str, raw: &str) -> Result<f64, PipelineError> {
    raw.trim()
        .parse()
        .map_err(|err| PipelineError::malformed(field, format!("{raw:?}: {err}")))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformSummary {
    pub processed: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub failed: usize,
}

fn apply_transform_progress_style(progress: &ProgressBar) {
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {prefix:.bold} [{elapsed_precise}] [{bar:32.cyan/blue}] \
{pos}/{len} ({percent}%) {msg}",
    ) {
        progress.set_style(style.progress_chars("=> "));
    }
}

/// Flatten a whole extract file. Raw objects are validated at this boundary;
/// a record that fails to decode or transform is logged with its key and
/// skipped, and the batch continues.
pub fn transform(
    raw_records: &[Value],
    entity: EntityType,
    cutoff_date: u32,
) -> (Vec<FlatRecord>, TransformSummary) {
    let progress = ProgressBar::new(raw_records.len() as u64);
    progress.set_prefix(entity.schema_name().to_ascii_uppercase());
    apply_transform_progress_style(&progress);

    let mut rows = Vec::with_capacity(raw_records.len());
    let mut summary = TransformSummary::default();

    for value in raw_records {
        summary.processed += 1;
        progress.inc(1);

        let key = value
            .get("generatedKey")
            .and_then(Value::as_str)
            .unwrap_or("<missing key>")
            .to_string();

        let raw: RawProviderRecord = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(err) => {
                let err = PipelineError::malformed("record", err.to_string());
                summary.failed += 1;
                warn!("skipping record {key}: {err}");
                continue;
            }
        };

        match transform_one(&raw, entity, cutoff_date) {
            Ok(Transformed::Record(record)) => {
                rows.push(*record);
                summary.emitted += 1;
            }
            Ok(Transformed::Dropped(reason)) => {
                summary.dropped += 1;
                info!("dropping record {}: {reason}", raw.generated_key);
            }
            Err(err) => {
                summary.failed += 1;
                warn!("skipping record {}: {err}", raw.generated_key);
            }
        }
    }

    progress.finish_and_clear();
    (rows, summary)
}
