//! Ratio-preserving scale-down of a linked dataset.
//!
//! Cars are classified by how many modalities reference them. Each class
//! contributes to the smaller dataset in proportion to its share of the full
//! car table, and the surviving cars are renumbered densely by row position.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::dataset::{Car, CarId, Dataset};
use crate::errors::{DatasetError, DatasetResult};

/// Per-class car counts, indexed by modality count.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalityClasses {
    pub three: usize,
    pub two: usize,
    pub one: usize,
}

impl ModalityClasses {
    pub fn of(dataset: &Dataset) -> Self {
        let counts = dataset.modality_counts();
        let mut classes = Self::default();
        for car in &dataset.cars {
            match counts.get(&car.car_id) {
                Some(3) => classes.three += 1,
                Some(2) => classes.two += 1,
                Some(1) => classes.one += 1,
                _ => {}
            }
        }
        classes
    }

    pub fn total(&self) -> usize {
        self.three + self.two + self.one
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScaleReport {
    pub target_size: usize,
    pub input_cars: usize,
    pub input_classes: ModalityClasses,
    pub selected: ModalityClasses,
    /// The input was already small enough and came back unchanged.
    pub identity: bool,
}

#[derive(Debug, Clone)]
pub struct ScaleOutcome {
    pub dataset: Dataset,
    pub report: ScaleReport,
}

/// Shrinks `dataset` to `target_size` cars, keeping the share of 3, 2 and 1
/// modality cars. Datasets with at most `target_size` cars are returned
/// unchanged.
pub fn scale_down<R: Rng + ?Sized>(
    dataset: &Dataset,
    target_size: usize,
    rng: &mut R,
) -> DatasetResult<ScaleOutcome> {
    if target_size < 1 {
        return Err(DatasetError::InvalidScaleFactor(target_size));
    }

    let input_classes = ModalityClasses::of(dataset);
    if dataset.cars.len() <= target_size {
        debug!(
            cars = dataset.cars.len(),
            target_size, "dataset already within scale factor"
        );
        return Ok(ScaleOutcome {
            dataset: dataset.clone(),
            report: ScaleReport {
                target_size,
                input_cars: dataset.cars.len(),
                input_classes,
                selected: input_classes,
                identity: true,
            },
        });
    }

    let counts = dataset.modality_counts();
    let mut by_class: [Vec<CarId>; 3] = Default::default();
    for car in &dataset.cars {
        match counts.get(&car.car_id) {
            Some(3) => by_class[0].push(car.car_id),
            Some(2) => by_class[1].push(car.car_id),
            Some(1) => by_class[2].push(car.car_id),
            _ => {}
        }
    }
    let unlinked = dataset.cars.len() - input_classes.total();
    if unlinked > 0 {
        warn!(unlinked, "cars without any modality are never selected");
    }

    let populations = [by_class[0].len(), by_class[1].len(), by_class[2].len()];
    let targets = class_targets(populations, dataset.cars.len(), target_size);

    let mut selected: HashSet<CarId> = HashSet::with_capacity(target_size);
    for (class, target) in by_class.iter().zip(targets) {
        for position in index::sample(rng, class.len(), target) {
            selected.insert(class[position]);
        }
    }

    let mut remap: HashMap<CarId, CarId> = HashMap::with_capacity(selected.len());
    let cars: Vec<Car> = dataset
        .cars
        .iter()
        .filter(|car| selected.contains(&car.car_id))
        .enumerate()
        .map(|(position, car)| {
            let new_id = position as CarId;
            remap.insert(car.car_id, new_id);
            Car {
                car_id: new_id,
                attributes: car.attributes.clone(),
            }
        })
        .collect();

    let relink = |car_id: Option<CarId>| car_id.and_then(|id| remap.get(&id).copied());
    let images = dataset
        .images
        .iter()
        .filter_map(|r| {
            relink(r.car_id).map(|car_id| {
                let mut r = r.clone();
                r.car_id = Some(car_id);
                r
            })
        })
        .collect();
    let audio = dataset
        .audio
        .iter()
        .filter_map(|r| {
            relink(r.car_id).map(|car_id| {
                let mut r = r.clone();
                r.car_id = Some(car_id);
                r
            })
        })
        .collect();
    let complaints = dataset
        .complaints
        .iter()
        .filter_map(|r| {
            relink(r.car_id).map(|car_id| {
                let mut r = r.clone();
                r.car_id = Some(car_id);
                r
            })
        })
        .collect();

    let scaled = Dataset {
        cars,
        images,
        audio,
        complaints,
    };
    let selected_classes = ModalityClasses::of(&scaled);
    info!(
        target_size,
        cars = scaled.cars.len(),
        three = selected_classes.three,
        two = selected_classes.two,
        one = selected_classes.one,
        "scaled down dataset"
    );

    Ok(ScaleOutcome {
        report: ScaleReport {
            target_size,
            input_cars: dataset.cars.len(),
            input_classes,
            selected: selected_classes,
            identity: false,
        },
        dataset: scaled,
    })
}

/// [`scale_down`] with a ChaCha generator seeded from `seed`.
pub fn scale_down_seeded(
    dataset: &Dataset,
    target_size: usize,
    seed: u64,
) -> DatasetResult<ScaleOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    scale_down(dataset, target_size, &mut rng)
}

/// Number of cars to draw from each class, ordered 3, 2, 1 modalities.
pub fn class_targets(populations: [usize; 3], total_cars: usize, target_size: usize) -> [usize; 3] {
    let mut targets = [0usize; 3];
    if total_cars == 0 {
        return targets;
    }

    for (target, &population) in targets.iter_mut().zip(populations.iter()) {
        if population == 0 {
            continue;
        }
        let share = target_size * population / total_cars;
        *target = share.max(1).min(population);
    }

    // the minimum of one per class can overshoot tiny targets
    let mut overshoot = targets.iter().sum::<usize>().saturating_sub(target_size);
    for target in targets.iter_mut().rev() {
        let cut = overshoot.min(*target);
        *target -= cut;
        overshoot -= cut;
    }

    let mut remaining = target_size.saturating_sub(targets.iter().sum());
    for (target, &population) in targets.iter_mut().zip(populations.iter()) {
        let add = remaining.min(population - *target);
        *target += add;
        remaining -= add;
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::*;

    /// Cars 0..three have all modalities, the next `two` an image and a
    /// complaint, the rest a single image.
    fn dataset_with_classes(three: usize, two: usize, one: usize) -> Dataset {
        let mut dataset = Dataset::default();
        let mut next_image = 0;
        for car_id in 0..(three + two + one) as CarId {
            dataset.cars.push(car(car_id));
            dataset.images.push(image(next_image, Some(car_id), "no_damage"));
            next_image += 1;
            if (car_id as usize) < three + two {
                dataset
                    .complaints
                    .push(complaint(car_id, Some(car_id), "ENGINE"));
            }
            if (car_id as usize) < three {
                dataset
                    .audio
                    .push(audio(car_id, Some(car_id), "braking state", "normal_brakes"));
            }
        }
        dataset
    }

    #[test]
    fn identity_when_target_covers_dataset() {
        let dataset = dataset_with_classes(2, 2, 2);
        let outcome = scale_down_seeded(&dataset, 6, 42).unwrap();
        assert!(outcome.report.identity);
        assert_eq!(outcome.dataset, dataset);

        let outcome = scale_down_seeded(&dataset, 100, 42).unwrap();
        assert_eq!(outcome.dataset, dataset);
    }

    #[test]
    fn rejects_zero_target() {
        let dataset = dataset_with_classes(1, 1, 1);
        assert!(matches!(
            scale_down_seeded(&dataset, 0, 42),
            Err(DatasetError::InvalidScaleFactor(0))
        ));
    }

    #[test]
    fn preserves_class_ratios() {
        let dataset = dataset_with_classes(500, 300, 200);
        let outcome = scale_down_seeded(&dataset, 100, 42).unwrap();
        assert_eq!(outcome.dataset.cars.len(), 100);
        assert_eq!(
            outcome.report.selected,
            ModalityClasses {
                three: 50,
                two: 30,
                one: 20
            }
        );
    }

    #[test]
    fn remaps_foreign_keys_densely() {
        let dataset = dataset_with_classes(40, 30, 30);
        let outcome = scale_down_seeded(&dataset, 17, 9).unwrap();
        let scaled = outcome.dataset;

        scaled.validate_foreign_keys().unwrap();
        let ids: Vec<CarId> = scaled.cars.iter().map(|c| c.car_id).collect();
        assert_eq!(ids, (0..17).collect::<Vec<_>>());
        assert_eq!(scaled.modality_counts().len(), 17);
    }

    #[test]
    fn cars_keep_their_attributes_and_modalities() {
        let mut dataset = dataset_with_classes(10, 10, 10);
        for car in dataset.cars.iter_mut() {
            car.attributes.vin = format!("VIN-{}", car.car_id);
        }
        let outcome = scale_down_seeded(&dataset, 9, 1).unwrap();
        let scaled_counts = outcome.dataset.modality_counts();
        let full_counts = dataset.modality_counts();

        for car in &outcome.dataset.cars {
            let original: CarId = car.attributes.vin[4..].parse().unwrap();
            assert_eq!(scaled_counts[&car.car_id], full_counts[&original]);
            let image = outcome
                .dataset
                .images
                .iter()
                .find(|r| r.car_id == Some(car.car_id))
                .unwrap();
            assert_eq!(image.image_id, original);
        }
    }

    #[test]
    fn small_targets_keep_every_class_when_possible() {
        assert_eq!(class_targets([1, 1, 98], 100, 3), [1, 1, 1]);
        assert_eq!(class_targets([1, 1, 98], 100, 2), [1, 1, 0]);
        assert_eq!(class_targets([0, 10, 10], 20, 5), [0, 3, 2]);
    }

    #[test]
    fn shortfall_fills_from_richest_modality_first() {
        // floors give 3/3/3 for a target of 10
        assert_eq!(class_targets([10, 10, 10], 30, 10), [4, 3, 3]);
    }

    #[test]
    fn scaling_is_deterministic() {
        let dataset = dataset_with_classes(30, 20, 10);
        let first = scale_down_seeded(&dataset, 12, 5).unwrap();
        let second = scale_down_seeded(&dataset, 12, 5).unwrap();
        assert_eq!(first.dataset, second.dataset);
    }
}
