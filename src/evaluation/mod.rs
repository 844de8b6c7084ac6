//! Ground truth generation and scoring of engine results for the query
//! catalog.
//!
//! Ground truth always comes from the labeled full dataset. For a scale
//! factor, the full tables are restricted to the records present in
//! `sf_<N>` and their car ids translated into that scale factor's id space.

pub mod catalog;
pub mod ground_truth;
pub mod metrics;
pub mod results;

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::dataset::{CarId, Dataset, RecordId};
use crate::errors::{EvaluationError, EvaluationResult};
use crate::table_io::{self, parse_count, ScaledPaths};

pub use catalog::{query, Query, QueryKind, CATALOG};
pub use ground_truth::GroundTruth;
pub use metrics::{AggregationScore, RetrievalScore};
pub use results::ResultTable;

pub const GROUND_TRUTH_DIR: &str = "ground_truth";

/// Seed for sampling the ground truth of LIMIT queries.
pub const LIMIT_SAMPLE_SEED: u64 = 42;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Score {
    Retrieval(RetrievalScore),
    Aggregation(AggregationScore),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryEvaluation {
    pub query: u32,
    pub description: &'static str,
    pub ground_truth_size: usize,
    pub result_rows: usize,
    pub score: Score,
}

pub struct Evaluator {
    dataset: Dataset,
    scale_label: usize,
}

impl Evaluator {
    /// `scale_label` names ground truth files, usually the scale factor.
    pub fn new(dataset: Dataset, scale_label: usize) -> Self {
        Self {
            dataset,
            scale_label,
        }
    }

    /// Loads the full dataset from `data_dir/full_data`, restricted to
    /// `data_dir/sf_<N>` when a scale factor is given.
    pub fn load(data_dir: &Path, scale_factor: Option<usize>) -> EvaluationResult<Self> {
        let full = table_io::read_full_dataset(data_dir)?;
        match scale_factor {
            Some(scale_factor) => {
                let paths = ScaledPaths::new(data_dir, scale_factor);
                let restricted = restrict_to_scale(&full, &paths, scale_factor)?;
                info!(
                    scale_factor,
                    cars = restricted.cars.len(),
                    "restricted ground truth to scale factor"
                );
                Ok(Self::new(restricted, scale_factor))
            }
            None => {
                let cars = full.cars.len();
                Ok(Self::new(full, cars))
            }
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn scale_label(&self) -> usize {
        self.scale_label
    }

    pub fn ground_truth(&self, query_id: u32) -> EvaluationResult<GroundTruth> {
        ground_truth::compute(query(query_id)?, &self.dataset)
    }

    pub fn ground_truth_path(&self, dir: &Path, query_id: u32) -> PathBuf {
        dir.join(format!("Q{}_{}.csv", query_id, self.scale_label))
    }

    /// Writes `Q<k>_<N>.csv` for every query in the catalog.
    pub fn write_ground_truths(&self, dir: &Path) -> EvaluationResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(CATALOG.len());
        for q in CATALOG {
            let truth = ground_truth::compute(q, &self.dataset)?;
            let path = self.ground_truth_path(dir, q.id);
            ground_truth::write_ground_truth(&path, q, &truth)?;
            debug!(query = q.id, rows = truth.len(), "wrote ground truth");
            written.push(path);
        }
        Ok(written)
    }

    pub fn evaluate(&self, query_id: u32, results: &ResultTable) -> EvaluationResult<QueryEvaluation> {
        let q = query(query_id)?;
        let truth = ground_truth::compute(q, &self.dataset)?;

        let score = match (q.kind, &truth) {
            (QueryKind::Retrieval { id_column, limit }, GroundTruth::Ids(expected)) => {
                let returned: HashSet<String> = result_column(q, results, id_column)?
                    .into_iter()
                    .map(|value| normalize_id(id_column, value))
                    .collect();
                let expected = match limit {
                    Some(limit) => metrics::limit_ground_truth(
                        expected,
                        &returned,
                        limit,
                        LIMIT_SAMPLE_SEED,
                    )
                    .ok_or_else(|| EvaluationError::InvalidResult {
                        query: q.id,
                        message: format!("more than {} correct ids for a LIMIT {} query", limit, limit),
                    })?,
                    None => expected.iter().cloned().collect(),
                };
                Score::Retrieval(metrics::retrieval_score(&expected, &returned))
            }
            (QueryKind::Aggregation { column }, GroundTruth::Scalar(expected)) => {
                let actual = aggregation_value(q, results, column)?;
                Score::Aggregation(metrics::aggregation_score(*expected, actual))
            }
            (
                QueryKind::Labeling {
                    id_column,
                    label_column,
                },
                GroundTruth::Labels(expected),
            ) => {
                let ids = result_column(q, results, id_column)?;
                let labels = result_column(q, results, label_column)?;
                let mut predictions: HashMap<CarId, String> = HashMap::new();
                for (id, label) in ids.into_iter().zip(labels) {
                    let car_id = parse_count(id).ok_or_else(|| EvaluationError::InvalidResult {
                        query: q.id,
                        message: format!("'{}' is not a car id", id),
                    })?;
                    predictions
                        .entry(car_id)
                        .or_insert_with(|| metrics::normalize_label(label));
                }
                Score::Retrieval(metrics::macro_label_score(expected, &predictions))
            }
            _ => {
                return Err(EvaluationError::InvalidResult {
                    query: q.id,
                    message: "ground truth does not match the query kind".to_string(),
                })
            }
        };

        Ok(QueryEvaluation {
            query: q.id,
            description: q.description,
            ground_truth_size: truth.len(),
            result_rows: results.len(),
            score,
        })
    }

    /// Scores every `Q<k>.csv` found in `results_dir`. Queries without a
    /// result file are skipped.
    pub fn evaluate_dir(&self, results_dir: &Path) -> EvaluationResult<Vec<QueryEvaluation>> {
        let mut evaluations = Vec::new();
        for q in CATALOG {
            let path = results_dir.join(format!("{}.csv", q.name()));
            if !path.exists() {
                warn!(query = q.id, path = %path.display(), "no result file");
                continue;
            }
            let results = ResultTable::read(&path)?;
            evaluations.push(self.evaluate(q.id, &results)?);
        }
        Ok(evaluations)
    }
}

fn result_column<'t>(
    q: &Query,
    results: &'t ResultTable,
    column: &str,
) -> EvaluationResult<Vec<&'t str>> {
    results
        .column(column)
        .ok_or_else(|| EvaluationError::MissingResultColumn {
            query: q.id,
            column: column.to_string(),
        })
}

/// The first value of the named column, or of the only column when the
/// engine named it differently.
fn aggregation_value(q: &Query, results: &ResultTable, column: &str) -> EvaluationResult<f64> {
    let values = match results.column(column) {
        Some(values) => values,
        None if results.headers().len() == 1 => results
            .column(&results.headers()[0])
            .unwrap_or_default(),
        None => {
            return Err(EvaluationError::MissingResultColumn {
                query: q.id,
                column: column.to_string(),
            })
        }
    };
    let first = values
        .into_iter()
        .find(|v| !v.is_empty())
        .ok_or_else(|| EvaluationError::InvalidResult {
            query: q.id,
            message: "no value returned".to_string(),
        })?;
    first.parse().map_err(|_| EvaluationError::InvalidResult {
        query: q.id,
        message: format!("'{}' is not a number", first),
    })
}

fn record_ids(links: &[(RecordId, CarId)]) -> HashSet<RecordId> {
    links.iter().map(|(id, _)| *id).collect()
}

/// Car ids compare numerically so `3.0` matches `3`.
fn normalize_id(id_column: &str, value: &str) -> String {
    if id_column == "car_id" {
        if let Some(id) = parse_count(value) {
            return id.to_string();
        }
    }
    value.trim().to_string()
}

/// Restricts the labeled full dataset to the records of one scale factor and
/// renumbers cars into the scale factor's id space. The translation is read
/// off the modality files, which carry both the record id and the new car id.
pub fn restrict_to_scale(
    full: &Dataset,
    paths: &ScaledPaths,
    scale_factor: usize,
) -> EvaluationResult<Dataset> {
    let inconsistent = |message: String| EvaluationError::InconsistentScale {
        scale_factor,
        message,
    };

    let scaled_cars: HashSet<CarId> = table_io::read_car_ids(&paths.cars)?.into_iter().collect();
    let image_links = table_io::read_id_links(&paths.images, "images", "image_id")?;
    let audio_links = table_io::read_id_links(&paths.audio, "audio", "audio_id")?;
    let complaint_links = table_io::read_id_links(&paths.complaints, "complaints", "complaint_id")?;

    let full_images: HashMap<RecordId, Option<CarId>> =
        full.images.iter().map(|r| (r.image_id, r.car_id)).collect();
    let full_audio: HashMap<RecordId, Option<CarId>> =
        full.audio.iter().map(|r| (r.audio_id, r.car_id)).collect();
    let full_complaints: HashMap<RecordId, Option<CarId>> = full
        .complaints
        .iter()
        .map(|r| (r.complaint_id, r.car_id))
        .collect();

    let mut old_to_new: HashMap<CarId, CarId> = HashMap::new();
    for (table, links, lookup) in [
        ("images", &image_links, &full_images),
        ("audio", &audio_links, &full_audio),
        ("complaints", &complaint_links, &full_complaints),
    ] {
        for &(record_id, new_car) in links {
            let old_car = lookup
                .get(&record_id)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    inconsistent(format!(
                        "{} record {} is not linked in the full dataset",
                        table, record_id
                    ))
                })?;
            if !scaled_cars.contains(&new_car) {
                return Err(inconsistent(format!(
                    "{} record {} references unknown car {}",
                    table, record_id, new_car
                )));
            }
            match old_to_new.insert(old_car, new_car) {
                Some(previous) if previous != new_car => {
                    return Err(inconsistent(format!(
                        "car {} maps to both {} and {}",
                        old_car, previous, new_car
                    )))
                }
                _ => {}
            }
        }
    }

    let mapped: HashSet<CarId> = old_to_new.values().copied().collect();
    if mapped.len() != old_to_new.len() || mapped.len() != scaled_cars.len() {
        return Err(inconsistent(format!(
            "{} scaled cars but {} could be traced to the full dataset",
            scaled_cars.len(),
            mapped.len()
        )));
    }

    let image_ids = record_ids(&image_links);
    let audio_ids = record_ids(&audio_links);
    let complaint_ids = record_ids(&complaint_links);
    let relink = |car_id: Option<CarId>| car_id.and_then(|id| old_to_new.get(&id).copied());

    let mut cars: Vec<_> = full
        .cars
        .iter()
        .filter_map(|car| {
            old_to_new.get(&car.car_id).map(|&new_id| {
                let mut car = car.clone();
                car.car_id = new_id;
                car
            })
        })
        .collect();
    cars.sort_by_key(|c| c.car_id);

    let images = full
        .images
        .iter()
        .filter(|r| image_ids.contains(&r.image_id))
        .map(|r| {
            let mut r = r.clone();
            r.car_id = relink(r.car_id);
            r
        })
        .collect();
    let audio = full
        .audio
        .iter()
        .filter(|r| audio_ids.contains(&r.audio_id))
        .map(|r| {
            let mut r = r.clone();
            r.car_id = relink(r.car_id);
            r
        })
        .collect();
    let complaints = full
        .complaints
        .iter()
        .filter(|r| complaint_ids.contains(&r.complaint_id))
        .map(|r| {
            let mut r = r.clone();
            r.car_id = relink(r.car_id);
            r
        })
        .collect();

    Ok(Dataset {
        cars,
        images,
        audio,
        complaints,
    })
}
