use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity type of a raw extract file. Also names the target schema in the
/// search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Organization,
    Practitioner,
}

impl EntityType {
    pub fn schema_name(self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Practitioner => "practitioner",
        }
    }

    pub fn is_organization(self) -> bool {
        matches!(self, EntityType::Organization)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

/// The six contract/code sections of a raw record. Each produces one
/// aggregate column in the flat record; adding or removing a section is a
/// compile-time change because every dispatch over this enum is an
/// exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractSection {
    #[serde(rename = "csp_contract")]
    Csp,
    #[serde(rename = "national_taxonomy")]
    NationalTaxonomy,
    #[serde(rename = "cosmos_contract")]
    Cosmos,
    #[serde(rename = "unet_contract")]
    UnetProduct,
    #[serde(rename = "specialty_org")]
    Specialty,
    #[serde(rename = "contract_org")]
    ContractingOrg,
}

impl ContractSection {
    pub const ALL: [ContractSection; 6] = [
        ContractSection::Csp,
        ContractSection::NationalTaxonomy,
        ContractSection::Cosmos,
        ContractSection::UnetProduct,
        ContractSection::Specialty,
        ContractSection::ContractingOrg,
    ];

    /// Column name of the aggregate this section produces. Doubles as the
    /// field name in structured-filter clauses.
    pub fn field_name(self) -> &'static str {
        match self {
            ContractSection::Csp => "csp_contract",
            ContractSection::NationalTaxonomy => "national_taxonomy",
            ContractSection::Cosmos => "cosmos_contract",
            ContractSection::UnetProduct => "unet_contract",
            ContractSection::Specialty => "specialty_org",
            ContractSection::ContractingOrg => "contract_org",
        }
    }
}

/// One raw provider/organization object as it arrives from the extract file.
/// Sections are lists of sub-records; a missing section or sub-field is a
/// deserialization error caught at the record boundary, never a mid-pipeline
/// key lookup failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProviderRecord {
    #[serde(default)]
    pub enterprise_provider_id: Option<String>,
    pub generated_key: String,
    pub provider_data: Vec<IdentityRecord>,
    #[serde(rename = "providerTinAddressData")]
    pub address_data: Vec<AddressRecord>,
    pub csp_contract_data: Vec<CspContractRecord>,
    pub national_provider_id_data: Vec<NationalProviderRecord>,
    pub cosmos_contract_data: Vec<CosmosContractRecord>,
    pub unet_contract_data: Vec<UnetContractRecord>,
    pub specialty_contracting_org_data: Vec<SpecialtyContractRecord>,
    pub address_contracting_org_data: Vec<ContractingOrgRecord>,
}

impl RawProviderRecord {
    pub fn enterprise_provider_id(&self) -> &str {
        self.enterprise_provider_id.as_deref().unwrap_or("")
    }
}

/// Marker on every sub-record: `"N"` means live, anything else means the
/// sub-record is logically deleted.
pub fn is_voided(indicator: &str) -> bool {
    indicator != "N"
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub voided_indicator: String,
    pub cancel_date: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub provider_type_code: String,
    pub organization_type_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub address_id: String,
    pub address_line1: String,
    pub city_name: String,
    pub county_name: String,
    pub state_code: String,
    pub zip_code: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspContractRecord {
    pub csp_provider_id: String,
    #[serde(rename = "ovationLOBTypeCode")]
    pub ovation_lob_type_code: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NationalProviderRecord {
    pub national_provider_id: String,
    pub taxonomy_code: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmosContractRecord {
    pub cosmos_provider_number: String,
    pub cosmos_div: String,
    pub cosmos_panel_number: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnetContractRecord {
    pub contract_id: String,
    pub market_number: String,
    pub product_offer_id: String,
    pub accepting_patient_code: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialtyContractRecord {
    pub specialty_type_code: String,
    pub contracting_org_code: String,
    pub primary_code: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractingOrgRecord {
    pub contracting_org_code: String,
    pub primary_code: String,
    pub correspondence_indicator: String,
    pub voided_indicator: String,
    pub cancel_date: String,
}
