//! Cross-modal linking of independently sourced cars, images, audio clips and
//! complaints into one dataset with controlled per-car modality counts.
//!
//! Assignment runs in three phases over a shuffled car order:
//!
//! 1. every audio clip gets its own car, plus an image and a complaint drawn
//!    from categories compatible with the clip (three modalities);
//! 2. while both images and complaints remain, the next car gets one of each
//!    from independently chosen categories (two modalities);
//! 3. the remaining cars get a single image, or a complaint once images are
//!    exhausted (one modality).
//!
//! Records are drawn from [`CategoryPools`] without replacement, so no record
//! is assigned twice and no car receives two records of the same modality.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::compatibility::{CompatibilityRule, CompatibilityTable, COMPATIBILITY};
use crate::dataset::{
    AudioRecord, Car, CarAttributes, CarId, ComplaintRecord, Dataset, ImageRecord, Modality,
    RecordId,
};
use crate::errors::{DatasetError, DatasetResult};
use crate::pools::{flatten_sorted_groups, CategoryPools};

/// Unlinked input tables. Modality records must not carry a `car_id` yet.
#[derive(Debug, Clone, Default)]
pub struct LinkInput {
    pub cars: Vec<CarAttributes>,
    pub images: Vec<ImageRecord>,
    pub audio: Vec<AudioRecord>,
    pub complaints: Vec<ComplaintRecord>,
}

/// Counts describing how far the pools carried each phase.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub cars_available: usize,
    pub audio_assigned: usize,
    pub audio_unassigned: usize,
    /// Audio-driven cars whose sampled damage state had no image left.
    pub image_shortfalls: usize,
    /// Audio-driven cars whose sampled component class had no complaint left.
    pub complaint_shortfalls: usize,
    /// Audio-driven cars that ended up with fewer than three modalities.
    pub degraded_audio_cars: usize,
    pub paired_cars: usize,
    pub single_cars: usize,
    pub three_modality_cars: usize,
    pub two_modality_cars: usize,
    pub one_modality_cars: usize,
    /// Cars that received nothing and were removed from the car table.
    pub cars_dropped: usize,
    /// Distinct audio categories linked through the fallback tables.
    #[serde(default)]
    pub unmapped_audio_categories: usize,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub dataset: Dataset,
    pub report: LinkReport,
}

pub struct Linker<'a> {
    compatibility: &'a CompatibilityTable,
}

impl<'a> Linker<'a> {
    pub fn new(compatibility: &'a CompatibilityTable) -> Self {
        Self { compatibility }
    }

    pub fn link<R: Rng + ?Sized>(
        &self,
        input: LinkInput,
        rng: &mut R,
    ) -> DatasetResult<LinkOutcome> {
        validate_unlinked(&input)?;

        let LinkInput {
            cars,
            mut images,
            mut audio,
            mut complaints,
        } = input;

        let cars: Vec<Car> = cars
            .into_iter()
            .enumerate()
            .map(|(position, attributes)| Car {
                car_id: position as CarId,
                attributes,
            })
            .collect();

        info!(
            cars = cars.len(),
            images = images.len(),
            audio = audio.len(),
            complaints = complaints.len(),
            "linking modalities"
        );
        if audio.len() > cars.len() {
            warn!(
                audio = audio.len(),
                cars = cars.len(),
                "fewer cars than audio clips, some clips will stay unassigned"
            );
        }

        let mut image_pools =
            CategoryPools::from_labels(images.iter().map(|r| r.damage_status.as_str()));
        let mut complaint_pools =
            CategoryPools::from_labels(complaints.iter().map(|r| r.component_class.as_str()));

        let mut car_order: Vec<CarId> = cars.iter().map(|c| c.car_id).collect();
        car_order.shuffle(rng);

        let mut audio_order = flatten_sorted_groups(
            audio
                .iter()
                .map(|r| (r.generic_problem.as_str(), r.detailed_problem.as_str())),
        );
        audio_order.shuffle(rng);

        let mut report = LinkReport {
            cars_available: cars.len(),
            ..Default::default()
        };
        let mut cursor = 0;
        let mut unmapped: HashSet<(String, String)> = HashSet::new();

        // Phase A: one audio clip per car, with compatible image and complaint
        for audio_index in audio_order {
            let Some(&car_id) = car_order.get(cursor) else {
                break;
            };
            cursor += 1;

            audio[audio_index].car_id = Some(car_id);
            report.audio_assigned += 1;
            let (generic, detailed) = audio[audio_index].category();
            if self.compatibility.rule(generic, detailed) == CompatibilityRule::Unmapped {
                unmapped.insert((generic.to_string(), detailed.to_string()));
            }

            let mut degraded = false;
            let status = self
                .compatibility
                .allowed_images(generic, detailed)
                .choose(rng)
                .copied();
            match status.and_then(|s| image_pools.pop(s)) {
                Some(image_index) => images[image_index].car_id = Some(car_id),
                None => {
                    debug!(car_id, generic, detailed, status, "no compatible image left");
                    report.image_shortfalls += 1;
                    degraded = true;
                }
            }

            let component = self
                .compatibility
                .allowed_complaints(generic, detailed)
                .choose(rng)
                .copied();
            match component.and_then(|c| complaint_pools.pop(c)) {
                Some(complaint_index) => complaints[complaint_index].car_id = Some(car_id),
                None => {
                    debug!(
                        car_id,
                        generic, detailed, component, "no compatible complaint left"
                    );
                    report.complaint_shortfalls += 1;
                    degraded = true;
                }
            }

            if degraded {
                report.degraded_audio_cars += 1;
            }
        }
        report.audio_unassigned = audio.len() - report.audio_assigned;
        report.unmapped_audio_categories = unmapped.len();
        if !unmapped.is_empty() {
            warn!(
                categories = unmapped.len(),
                "audio categories outside the compatibility tables, linked through the fallback"
            );
        }

        // Phase B: image and complaint pairs while both modalities last
        while cursor < car_order.len()
            && image_pools.has_remaining()
            && complaint_pools.has_remaining()
        {
            let car_id = car_order[cursor];
            cursor += 1;

            if let Some(image_index) = image_pools.pop_random(rng) {
                images[image_index].car_id = Some(car_id);
            }
            if let Some(complaint_index) = complaint_pools.pop_random(rng) {
                complaints[complaint_index].car_id = Some(car_id);
            }
            report.paired_cars += 1;
        }

        // Phase C: a single modality per car, images first
        while cursor < car_order.len() {
            let car_id = car_order[cursor];
            cursor += 1;

            if let Some(image_index) = image_pools.pop_random(rng) {
                images[image_index].car_id = Some(car_id);
            } else if let Some(complaint_index) = complaint_pools.pop_random(rng) {
                complaints[complaint_index].car_id = Some(car_id);
            } else {
                break;
            }
            report.single_cars += 1;
        }

        images.retain(|r| r.car_id.is_some());
        audio.retain(|r| r.car_id.is_some());
        complaints.retain(|r| r.car_id.is_some());

        let mut dataset = Dataset {
            cars,
            images,
            audio,
            complaints,
        };
        let counts = dataset.modality_counts();
        dataset.cars.retain(|c| counts.contains_key(&c.car_id));

        report.cars_dropped = report.cars_available - dataset.cars.len();
        for count in counts.values() {
            match count {
                3 => report.three_modality_cars += 1,
                2 => report.two_modality_cars += 1,
                _ => report.one_modality_cars += 1,
            }
        }

        if report.audio_unassigned > 0 {
            warn!(
                unassigned = report.audio_unassigned,
                "audio clips left without a car"
            );
        }
        if report.degraded_audio_cars > 0 {
            warn!(
                cars = report.degraded_audio_cars,
                missing_images = report.image_shortfalls,
                missing_complaints = report.complaint_shortfalls,
                "audio cars linked with fewer than three modalities"
            );
        }
        info!(
            cars = dataset.cars.len(),
            three = report.three_modality_cars,
            two = report.two_modality_cars,
            one = report.one_modality_cars,
            dropped = report.cars_dropped,
            images_left = image_pools.remaining(),
            complaints_left = complaint_pools.remaining(),
            "linking complete"
        );

        Ok(LinkOutcome { dataset, report })
    }
}

/// Links with the builtin compatibility tables and a ChaCha generator seeded
/// from `seed`.
pub fn link(input: LinkInput, seed: u64) -> DatasetResult<LinkOutcome> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Linker::new(&COMPATIBILITY).link(input, &mut rng)
}

fn validate_unlinked(input: &LinkInput) -> DatasetResult<()> {
    check_records(
        Modality::Image,
        "image_id",
        input.images.iter().map(|r| (r.image_id, r.car_id)),
    )?;
    check_records(
        Modality::Audio,
        "audio_id",
        input.audio.iter().map(|r| (r.audio_id, r.car_id)),
    )?;
    check_records(
        Modality::Complaint,
        "complaint_id",
        input.complaints.iter().map(|r| (r.complaint_id, r.car_id)),
    )
}

fn check_records(
    modality: Modality,
    column: &str,
    records: impl Iterator<Item = (RecordId, Option<CarId>)>,
) -> DatasetResult<()> {
    let mut seen = HashSet::new();
    for (id, car_id) in records {
        if let Some(car_id) = car_id {
            return Err(DatasetError::AlreadyLinked {
                table: modality.table_name().to_string(),
                id,
                car_id,
            });
        }
        if !seen.insert(id) {
            return Err(DatasetError::DuplicateId {
                table: modality.table_name().to_string(),
                column: column.to_string(),
                id,
            });
        }
    }
    Ok(())
}
