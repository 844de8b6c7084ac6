//! Reference answers for the query catalog, computed from labeled tables.

use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use super::catalog::{Query, QueryKind};
use crate::dataset::{CarAttributes, CarId, Dataset};
use crate::denormalize::denormalize;
use crate::errors::{EvaluationError, EvaluationResult};
use crate::table_io::{opt_cell, write_table};

/// Reference year used for car age.
pub const AGE_REFERENCE_YEAR: u16 = 2026;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruth {
    /// Distinct identifiers in first-appearance order.
    Ids(Vec<String>),
    /// `None` when the aggregate is undefined, e.g. an average over no rows.
    Scalar(Option<f64>),
    /// `(car_id, label)` pairs ordered by car.
    Labels(Vec<(CarId, String)>),
}

impl GroundTruth {
    pub fn len(&self) -> usize {
        match self {
            GroundTruth::Ids(ids) => ids.len(),
            GroundTruth::Scalar(value) => usize::from(value.is_some()),
            GroundTruth::Labels(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ids<T: ToString>(values: impl IntoIterator<Item = T>) -> GroundTruth {
    let unique: IndexSet<String> = values.into_iter().map(|v| v.to_string()).collect();
    GroundTruth::Ids(unique.into_iter().collect())
}

fn has_tag(damage_status: &str, tag: &str) -> bool {
    damage_status.split(';').any(|t| t == tag)
}

fn cars_where(dataset: &Dataset, predicate: impl Fn(&CarAttributes) -> bool) -> HashSet<CarId> {
    dataset
        .cars
        .iter()
        .filter(|c| predicate(&c.attributes))
        .map(|c| c.car_id)
        .collect()
}

/// Computes the reference answer for `query` over `dataset`.
pub fn compute(query: &Query, dataset: &Dataset) -> EvaluationResult<GroundTruth> {
    let truth = match query.id {
        1 => ids(dataset
            .complaints
            .iter()
            .filter(|r| r.crash == Some(true))
            .filter_map(|r| r.car_id)),
        2 => {
            let electric = cars_where(dataset, |a| a.fuel_type == "Electric");
            ids(dataset
                .audio
                .iter()
                .filter(|r| r.generic_problem == "startup state" && r.detailed_problem == "dead_battery")
                .filter_map(|r| r.car_id)
                .filter(|id| electric.contains(id)))
        }
        3 => {
            let manual = cars_where(dataset, |a| a.transmission == "Manual");
            let intact: HashSet<CarId> = dataset
                .images
                .iter()
                .filter(|r| r.damage_status == "no_damage")
                .filter_map(|r| r.car_id)
                .filter(|id| manual.contains(id))
                .collect();
            ids(dataset
                .cars
                .iter()
                .filter(|c| intact.contains(&c.car_id))
                .map(|c| c.attributes.vin.clone()))
        }
        4 => {
            let engine: HashSet<CarId> = dataset
                .complaints
                .iter()
                .filter(|r| r.component_class == "ENGINE")
                .filter_map(|r| r.car_id)
                .collect();
            let ages: Vec<f64> = dataset
                .cars
                .iter()
                .filter(|c| engine.contains(&c.car_id))
                .map(|c| f64::from(AGE_REFERENCE_YEAR) - f64::from(c.attributes.year))
                .collect();
            if ages.is_empty() {
                GroundTruth::Scalar(None)
            } else {
                GroundTruth::Scalar(Some(ages.iter().sum::<f64>() / ages.len() as f64))
            }
        }
        5 => {
            let damaged_image: HashSet<CarId> = dataset
                .images
                .iter()
                .filter(|r| r.damage_status != "no_damage")
                .filter_map(|r| r.car_id)
                .collect();
            let damaged_audio: HashSet<CarId> = dataset
                .audio
                .iter()
                .filter(|r| !r.detailed_problem.starts_with("normal_"))
                .filter_map(|r| r.car_id)
                .collect();
            let count = dataset
                .cars
                .iter()
                .filter(|c| c.attributes.transmission == "Automatic")
                .filter(|c| damaged_image.contains(&c.car_id) && damaged_audio.contains(&c.car_id))
                .count();
            GroundTruth::Scalar(Some(count as f64))
        }
        6 => ids(denormalize(dataset)
            .into_iter()
            .filter(|row| {
                let verdicts = [
                    row.image.map(|r| r.damage_status != "no_damage"),
                    row.audio.map(|r| !r.detailed_problem.starts_with("normal_")),
                    row.complaint.and_then(|r| r.fire),
                ];
                verdicts.contains(&Some(true)) && verdicts.contains(&Some(false))
            })
            .map(|row| row.car.car_id)),
        7 => {
            let worn_brakes = dataset
                .audio
                .iter()
                .filter(|r| r.detailed_problem == "worn_out_brakes")
                .filter_map(|r| r.car_id);
            let electrical = dataset
                .complaints
                .iter()
                .filter(|r| r.component_class == "ELECTRICAL SYSTEM")
                .filter_map(|r| r.car_id);
            let dented = dataset
                .images
                .iter()
                .filter(|r| r.damage_status.contains("dented"))
                .filter_map(|r| r.car_id);
            ids(worn_brakes.chain(electrical).chain(dented))
        }
        8 => ids(dataset
            .images
            .iter()
            .filter(|r| has_tag(&r.damage_status, "paint_scratches") && has_tag(&r.damage_status, "puncture"))
            .filter_map(|r| r.car_id)),
        9 => {
            let bad_ignition: HashSet<CarId> = dataset
                .audio
                .iter()
                .filter(|r| r.detailed_problem.contains("bad_ignition"))
                .filter_map(|r| r.car_id)
                .collect();
            ids(dataset
                .images
                .iter()
                .filter(|r| has_tag(&r.damage_status, "torn"))
                .filter_map(|r| r.car_id)
                .filter(|id| bad_ignition.contains(id)))
        }
        10 => {
            let cars = dataset.car_ids();
            let mut labels: Vec<(CarId, String)> = dataset
                .complaints
                .iter()
                .filter_map(|r| r.car_id.map(|id| (id, r.component_class.to_lowercase())))
                .filter(|(id, _)| cars.contains(id))
                .collect();
            labels.sort_by_key(|(id, _)| *id);
            GroundTruth::Labels(labels)
        }
        other => return Err(EvaluationError::UnknownQuery(other)),
    };
    Ok(truth)
}

/// Writes a ground truth in the column layout engines answer in.
pub fn write_ground_truth(path: &Path, query: &Query, truth: &GroundTruth) -> EvaluationResult<()> {
    match (query.kind, truth) {
        (QueryKind::Retrieval { id_column, .. }, GroundTruth::Ids(ids)) => {
            write_table(path, ids, &[id_column], |id| vec![id.clone()])?;
        }
        (QueryKind::Aggregation { column }, GroundTruth::Scalar(value)) => {
            write_table(path, [value], &[column], |v| vec![opt_cell(*v)])?;
        }
        (
            QueryKind::Labeling {
                id_column,
                label_column,
            },
            GroundTruth::Labels(labels),
        ) => {
            write_table(path, labels, &[id_column, label_column], |(id, label)| {
                vec![id.to_string(), label.clone()]
            })?;
        }
        _ => {
            return Err(EvaluationError::InvalidResult {
                query: query.id,
                message: "ground truth does not match the query kind".to_string(),
            })
        }
    }
    Ok(())
}
