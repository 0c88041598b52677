use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};

use crate::error::PipelineError;
use crate::record::{ContractSection, EntityType};

/// How the feed stage pushes the dataset into the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Feed in `batch_size` chunks with a per-batch summary.
    Batch,
    /// Feed one document at a time; `feed_debug` logs each response.
    Point,
    /// Feed the whole dataset as a single pass.
    Frame,
    /// Skip feeding entirely.
    Off,
}

impl FromStr for FeedMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(FeedMode::Batch),
            "point" => Ok(FeedMode::Point),
            "frame" => Ok(FeedMode::Frame),
            "off" => Ok(FeedMode::Off),
            other => Err(PipelineError::UnknownFeedMode(other.to_string())),
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedMode::Batch => "batch",
            FeedMode::Point => "point",
            FeedMode::Frame => "frame",
            FeedMode::Off => "off",
        })
    }
}

impl<'de> Deserialize<'de> for FeedMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One raw extract file and the entity type it contains.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityInput {
    pub entity: EntityType,
    pub file: PathBuf,
}

/// Process-wide settings, loaded once from a TOML file at startup and passed
/// by reference everywhere. There is no runtime mutation and no per-option
/// CLI surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Directory holding raw extract files and the tabular datasets.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for query files and benchmark reports.
    #[serde(default = "default_query_dir")]
    pub query_dir: PathBuf,
    /// Raw extract files to transform, one per entity type.
    pub inputs: Vec<EntityInput>,
    /// Contracts expiring before this `YYYYMMDD` date are excluded.
    pub cutoff_date: u32,
    /// Entity type targeted by the feed, queries, and bench stages.
    pub schema: EntityType,

    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_feed_mode")]
    pub feed_mode: FeedMode,
    /// Log every feed response body in point mode.
    #[serde(default)]
    pub feed_debug: bool,
    /// Unique document id column in the dataset.
    #[serde(default = "default_key_field")]
    pub key_field: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Connection pool size handed to the HTTP client.
    #[serde(default = "default_connections")]
    pub connections: usize,
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,

    #[serde(default = "default_n_queries")]
    pub n_queries: usize,
    /// Hit count requested per query.
    #[serde(default = "default_hits")]
    pub hits: u32,
    #[serde(default = "default_geo_probability")]
    pub geo_probability: f64,
    #[serde(default = "default_filter_probability")]
    pub filter_probability: f64,
    /// Width of the uniform lat/lng perturbation, in degrees.
    #[serde(default = "default_geo_scale")]
    pub geo_scale: f64,
    /// Aggregate columns eligible for structured-filter clauses.
    #[serde(default = "default_filter_fields")]
    pub filter_fields: Vec<ContractSection>,

    #[serde(default = "default_n_clients")]
    pub n_clients: u32,
    #[serde(default = "default_bench_duration_secs")]
    pub bench_duration_secs: u64,
    #[serde(default = "default_bench_template")]
    pub bench_template: PathBuf,
    /// Identifier substituted for the load generator's target (e.g. the
    /// container name hosting the engine).
    pub bench_target: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_query_dir() -> PathBuf {
    PathBuf::from("query")
}

fn default_search_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_feed_mode() -> FeedMode {
    FeedMode::Batch
}

fn default_key_field() -> String {
    "generated_key".to_string()
}

fn default_batch_size() -> usize {
    1000
}

fn default_connections() -> usize {
    5
}

fn default_feed_timeout_secs() -> u64 {
    100
}

fn default_n_queries() -> usize {
    100
}

fn default_hits() -> u32 {
    10
}

fn default_geo_probability() -> f64 {
    0.5
}

fn default_filter_probability() -> f64 {
    0.2
}

fn default_geo_scale() -> f64 {
    0.75
}

fn default_filter_fields() -> Vec<ContractSection> {
    ContractSection::ALL.to_vec()
}

fn default_n_clients() -> u32 {
    5
}

fn default_bench_duration_secs() -> u64 {
    30
}

fn default_bench_template() -> PathBuf {
    PathBuf::from("resources/benchmark_template.sh")
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed reading settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("Failed parsing settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            bail!("settings must list at least one input file");
        }
        if !(0.0..=1.0).contains(&self.geo_probability) {
            bail!("geo_probability must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.filter_probability) {
            bail!("filter_probability must be within [0, 1]");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be positive");
        }
        Ok(())
    }

    /// Dataset path for an input: the raw file's stem under `data_dir`, with
    /// a `.csv` extension.
    pub fn dataset_path(&self, input: &EntityInput) -> PathBuf {
        self.data_dir.join(input.file.with_extension("csv"))
    }

    pub fn input_path(&self, input: &EntityInput) -> PathBuf {
        self.data_dir.join(&input.file)
    }

    /// Inputs matching the configured target schema.
    pub fn schema_inputs(&self) -> impl Iterator<Item = &EntityInput> {
        self.inputs.iter().filter(|input| input.entity == self.schema)
    }

    pub fn query_file(&self) -> PathBuf {
        self.query_dir
            .join(format!("sample_query_{}.txt", self.schema))
    }

    pub fn report_file(&self) -> PathBuf {
        self.query_dir
            .join(format!("performance_report_{}.txt", self.schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        cutoff_date = 20230601
        schema = "organization"
        bench_target = "tutorial"

        [[inputs]]
        entity = "organization"
        file = "organization_sample_data.json"
    "#;

    #[test]
    fn minimal_settings_parse_with_defaults() {
        let settings: Settings = toml::from_str(MINIMAL).unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.feed_mode, FeedMode::Batch);
        assert_eq!(settings.batch_size, 1000);
        assert_eq!(settings.key_field, "generated_key");
        assert_eq!(settings.filter_fields.len(), 6);
        assert_eq!(
            settings.dataset_path(&settings.inputs[0]),
            PathBuf::from("data/organization_sample_data.csv")
        );
        assert_eq!(
            settings.query_file(),
            PathBuf::from("query/sample_query_organization.txt")
        );
    }

    #[test]
    fn unknown_feed_mode_is_fatal_at_parse() {
        let raw = format!("feed_mode = \"stream\"\n{MINIMAL}");
        let err = toml::from_str::<Settings>(&raw).unwrap_err();
        assert!(err.to_string().contains("unknown feed mode"));
    }

    #[test]
    fn feed_mode_strings_round_trip() {
        for mode in [FeedMode::Batch, FeedMode::Point, FeedMode::Frame, FeedMode::Off] {
            assert_eq!(mode.to_string().parse::<FeedMode>().unwrap(), mode);
        }
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let raw = format!("geo_probability = 1.5\n{MINIMAL}");
        let settings: Settings = toml::from_str(&raw).unwrap();
        assert!(settings.validate().is_err());
    }
}
