use std::{
    fs::{self, File},
    io::Write,
};

use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::dataset;
use crate::record::{ContractSection, EntityType};
use crate::settings::Settings;
use crate::transform::{FlatRecord, GeoPoint};

/// Flat-record fields eligible as free-text search terms. City stands in for
/// the whole address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    FirstName,
    LastName,
    OrgName,
    CityName,
}

impl SearchField {
    fn value(self, record: &FlatRecord) -> &str {
        match self {
            SearchField::FirstName => &record.first_name,
            SearchField::LastName => &record.last_name,
            SearchField::OrgName => &record.org_name,
            SearchField::CityName => &record.city_name,
        }
    }
}

const ORG_FIELD_SETS: [&[SearchField]; 3] = [
    &[SearchField::OrgName],
    &[SearchField::CityName],
    &[SearchField::OrgName, SearchField::CityName],
];

const PROV_FIELD_SETS: [&[SearchField]; 5] = [
    &[SearchField::FirstName],
    &[SearchField::LastName],
    &[SearchField::CityName],
    &[SearchField::FirstName, SearchField::LastName],
    &[
        SearchField::FirstName,
        SearchField::LastName,
        SearchField::CityName,
    ],
];

/// Pick the field set for one query's search term: a uniform choice over the
/// entity type's alternatives.
pub fn search_term_fields<R: Rng + ?Sized>(
    rng: &mut R,
    entity: EntityType,
) -> &'static [SearchField] {
    match entity {
        EntityType::Organization => ORG_FIELD_SETS[rng.random_range(0..ORG_FIELD_SETS.len())],
        EntityType::Practitioner => PROV_FIELD_SETS[rng.random_range(0..PROV_FIELD_SETS.len())],
    }
}

/// Independent uniform noise in [-scale/2, +scale/2] degrees on each axis.
pub fn perturbed_geo<R: Rng + ?Sized>(
    rng: &mut R,
    geocode: &GeoPoint,
    scale: f64,
) -> (f64, f64) {
    let lat = geocode.lat + (rng.random::<f64>() - 0.5) * scale;
    let lng = geocode.lng + (rng.random::<f64>() - 0.5) * scale;
    (lat, lng)
}

/// Scan the candidate aggregate fields in a freshly shuffled order and build
/// a containment clause for the first one holding a non-empty key. Returns
/// None when no field qualifies; the caller emits no clause in that case.
pub fn structured_filter_clause<R: Rng + ?Sized>(
    rng: &mut R,
    record: &FlatRecord,
    filter_fields: &[ContractSection],
    cutoff_date: u32,
) -> Option<String> {
    let mut order: Vec<ContractSection> = filter_fields.to_vec();
    order.shuffle(rng);
    for section in order {
        if let Some(key) = record.aggregate(section).keys().next() {
            if !key.is_empty() {
                return Some(format!(
                    " and {} contains sameElement(key contains \"{key}\", value>{cutoff_date})",
                    section.field_name()
                ));
            }
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct QueryParams<'a> {
    pub entity: EntityType,
    pub n_queries: usize,
    pub hits: u32,
    pub geo_probability: f64,
    pub filter_probability: f64,
    pub geo_scale: f64,
    pub filter_fields: &'a [ContractSection],
    pub cutoff_date: u32,
}

impl<'a> QueryParams<'a> {
    pub fn from_settings(settings: &'a Settings) -> Self {
        Self {
            entity: settings.schema,
            n_queries: settings.n_queries,
            hits: settings.hits,
            geo_probability: settings.geo_probability,
            filter_probability: settings.filter_probability,
            geo_scale: settings.geo_scale,
            filter_fields: &settings.filter_fields,
            cutoff_date: settings.cutoff_date,
        }
    }
}

fn synthesize_one<R: Rng + ?Sized>(
    rng: &mut R,
    record: &FlatRecord,
    params: &QueryParams<'_>,
) -> String {
    let term = search_term_fields(rng, params.entity)
        .iter()
        .map(|field| field.value(record))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    let (geo_clause, profile) = if rng.random_bool(params.geo_probability) {
        let (lat, lng) = perturbed_geo(rng, &record.geocode, params.geo_scale);
        let clause = format!(" and geoLocation(geocode, {lat}, {lng}, \"25 miles\")");
        let profile = if params.entity.is_organization() {
            "org_geo_filter"
        } else {
            "prov_geo_filter"
        };
        (clause, profile)
    } else {
        let profile = if params.entity.is_organization() {
            "org_bm25"
        } else {
            "prov_bm25"
        };
        (String::new(), profile)
    };

    // The filter branch can still come up empty when no field qualifies.
    let filter_clause = if rng.random_bool(params.filter_probability) {
        structured_filter_clause(rng, record, params.filter_fields, params.cutoff_date)
            .unwrap_or_default()
    } else {
        String::new()
    };

    let yql = format!(
        "select generated_key from sources {} where(userQuery(){geo_clause}{filter_clause});",
        params.entity.schema_name()
    );

    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("yql", &yql)
        .append_pair("query", &term)
        .append_pair("hits", &params.hits.to_string())
        .append_pair("ranking.profile", profile)
        .append_pair("timeout", "15s")
        .append_pair("ranking.softtimeout.enable", "false")
        .finish();
    format!("/search/?{encoded}")
}

/// Sample records uniformly without replacement and emit one encoded query
/// per sample. When `n_queries` exceeds the dataset size the count is capped
/// at the dataset size.
pub fn synthesize(rows: &[FlatRecord], params: &QueryParams<'_>) -> Vec<String> {
    let mut rng = rand::rng();
    let count = params.n_queries.min(rows.len());
    rand::seq::index::sample(&mut rng, rows.len(), count)
        .iter()
        .map(|idx| synthesize_one(&mut rng, &rows[idx], params))
        .collect()
}

pub fn run(settings: &Settings) -> Result<()> {
    fs::create_dir_all(&settings.query_dir)
        .with_context(|| format!("Failed creating {}", settings.query_dir.display()))?;
    let out_path = settings.query_file();
    let mut out = File::create(&out_path)
        .with_context(|| format!("Failed creating query file {}", out_path.display()))?;

    let params = QueryParams::from_settings(settings);
    let mut total = 0usize;
    for input in settings.schema_inputs() {
        let dataset_path = settings.dataset_path(input);
        info!("selecting records from {}", dataset_path.display());
        let rows = dataset::read_dataset(&dataset_path)?;
        let queries = synthesize(&rows, &params);
        if queries.len() < params.n_queries {
            info!(
                "dataset holds {} records; capping at {} queries",
                rows.len(),
                queries.len()
            );
        }
        for query in &queries {
            writeln!(out, "{query}")
                .with_context(|| format!("Failed writing query file {}", out_path.display()))?;
        }
        total += queries.len();
    }
    info!("wrote {total} queries to {}", out_path.display());
    Ok(())
}
