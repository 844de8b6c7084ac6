//! Cross-modal linker tests
//!
//! Properties of the linked dataset over generated cars and mixed record pools

use anyhow::Result;
use carbench::compatibility::{CompatibilityTable, DAMAGE_COMBINATIONS, NO_DAMAGE};
use carbench::dataset::{AudioRecord, ComplaintRecord, Dataset, ImageRecord};
use carbench::linker::{link, LinkInput};
use carbench::synthetic::generate_cars_seeded;
use std::collections::{HashMap, HashSet};

const AUDIO_CATEGORIES: &[(&str, &str)] = &[
    ("startup state", "dead_battery"),
    ("startup state", "bad_ignition"),
    ("braking state", "normal_brakes"),
    ("braking state", "worn_out_brakes"),
    ("idle state", "serpentine_belt"),
];

const COMPONENT_CLASSES: &[&str] = &[
    "AIR BAGS",
    "BACK OVER PREVENTION",
    "ELECTRICAL SYSTEM",
    "ENGINE",
    "ENGINE AND ENGINE COOLING",
    "EQUIPMENT",
    "EXTERIOR LIGHTING",
    "FORWARD COLLISION AVOIDANCE",
    "FUEL SYSTEM",
    "FUEL/PROPULSION SYSTEM",
    "LANE DEPARTURE",
    "LATCHES/LOCKS/LINKAGES",
    "POWER TRAIN",
    "SEAT BELTS",
    "SEATS",
    "SERVICE BRAKES",
    "STEERING",
    "STRUCTURE",
    "SUSPENSION",
    "TIRES",
    "VEHICLE SPEED CONTROL",
    "VISIBILITY",
    "VISIBILITY/WIPER",
    "WHEELS",
];

fn image(id: u64, status: &str) -> ImageRecord {
    ImageRecord {
        image_id: id,
        car_id: None,
        image_path: format!("images/{}.jpg", id),
        damage_status: status.to_string(),
    }
}

fn audio(id: u64, (generic, detailed): (&str, &str)) -> AudioRecord {
    AudioRecord {
        audio_id: id,
        car_id: None,
        audio_path: format!("audio/{}.wav", id),
        generic_problem: generic.to_string(),
        detailed_problem: detailed.to_string(),
    }
}

fn complaint(id: u64, component: &str) -> ComplaintRecord {
    ComplaintRecord {
        complaint_id: id,
        car_id: None,
        summary: format!("complaint {}", id),
        component_class: component.to_string(),
        crash: Some(id % 7 == 0),
        fire: Some(false),
        number_of_injuries: Some(0),
    }
}

/// `copies` records of every image state and every component class, plus
/// `audio_clips` recordings cycling through the audio categories.
fn pools(cars: usize, audio_clips: usize, copies: usize) -> LinkInput {
    let states: Vec<&str> = std::iter::once(NO_DAMAGE)
        .chain(DAMAGE_COMBINATIONS.iter().copied())
        .collect();
    let images = (0..copies)
        .flat_map(|_| states.iter().copied())
        .enumerate()
        .map(|(id, status)| image(id as u64, status))
        .collect();
    let complaints = (0..copies)
        .flat_map(|_| COMPONENT_CLASSES.iter().copied())
        .enumerate()
        .map(|(id, class)| complaint(id as u64, class))
        .collect();
    let audio = (0..audio_clips)
        .map(|id| audio(id as u64, AUDIO_CATEGORIES[id % AUDIO_CATEGORIES.len()]))
        .collect();

    LinkInput {
        cars: generate_cars_seeded(cars, 7),
        images,
        audio,
        complaints,
    }
}

fn modalities_per_car(dataset: &Dataset) -> HashMap<u64, [usize; 3]> {
    let mut counts: HashMap<u64, [usize; 3]> = HashMap::new();
    for car_id in dataset.images.iter().filter_map(|r| r.car_id) {
        counts.entry(car_id).or_default()[0] += 1;
    }
    for car_id in dataset.audio.iter().filter_map(|r| r.car_id) {
        counts.entry(car_id).or_default()[1] += 1;
    }
    for car_id in dataset.complaints.iter().filter_map(|r| r.car_id) {
        counts.entry(car_id).or_default()[2] += 1;
    }
    counts
}

#[test]
fn test_records_are_assigned_at_most_once() -> Result<()> {
    let input = pools(400, 60, 2);
    let input_cars = input.cars.len() as u64;
    let outcome = link(input, 42)?;
    let dataset = &outcome.dataset;

    let image_ids: HashSet<u64> = dataset.images.iter().map(|r| r.image_id).collect();
    assert_eq!(image_ids.len(), dataset.images.len());
    let audio_ids: HashSet<u64> = dataset.audio.iter().map(|r| r.audio_id).collect();
    assert_eq!(audio_ids.len(), dataset.audio.len());
    let complaint_ids: HashSet<u64> = dataset.complaints.iter().map(|r| r.complaint_id).collect();
    assert_eq!(complaint_ids.len(), dataset.complaints.len());

    assert!(dataset.cars.iter().all(|c| c.car_id < input_cars));
    dataset.validate_foreign_keys()?;
    Ok(())
}

#[test]
fn test_one_record_per_modality_and_no_empty_cars() -> Result<()> {
    let outcome = link(pools(400, 60, 2), 42)?;
    let counts = modalities_per_car(&outcome.dataset);

    for per_modality in counts.values() {
        assert!(per_modality.iter().all(|&n| n <= 1));
    }
    for car in &outcome.dataset.cars {
        let per_modality = counts.get(&car.car_id).copied().unwrap_or_default();
        assert!(per_modality.iter().sum::<usize>() >= 1, "car {} is empty", car.car_id);
    }
    Ok(())
}

#[test]
fn test_every_audio_clip_finds_a_car() -> Result<()> {
    let outcome = link(pools(100, 60, 1), 3)?;
    assert_eq!(outcome.report.audio_assigned, 60);
    assert_eq!(outcome.report.audio_unassigned, 0);
    assert!(outcome.dataset.audio.iter().all(|r| r.car_id.is_some()));
    Ok(())
}

#[test]
fn test_audio_cars_respect_compatibility() -> Result<()> {
    let table = CompatibilityTable::builtin();
    let outcome = link(pools(300, 80, 2), 11)?;
    let dataset = &outcome.dataset;

    for clip in &dataset.audio {
        let car_id = clip.car_id;
        let (generic, detailed) = clip.category();
        for image in dataset.images.iter().filter(|r| r.car_id == car_id) {
            assert!(
                table.allows_image(generic, detailed, &image.damage_status),
                "{}/{} paired with image '{}'",
                generic,
                detailed,
                image.damage_status
            );
        }
        for complaint in dataset.complaints.iter().filter(|r| r.car_id == car_id) {
            assert!(table.allows_complaint(generic, detailed, &complaint.component_class));
        }
    }
    Ok(())
}

#[test]
fn test_linking_is_deterministic() -> Result<()> {
    let first = link(pools(200, 30, 1), 42)?;
    let second = link(pools(200, 30, 1), 42)?;
    assert_eq!(first.dataset, second.dataset);
    assert_eq!(first.report, second.report);

    let other = link(pools(200, 30, 1), 43)?;
    assert_ne!(first.dataset, other.dataset);
    Ok(())
}

#[test]
fn test_five_cars_with_five_audio_categories() -> Result<()> {
    let input = pools(5, 5, 5);
    let first = link(input.clone(), 42)?;

    assert_eq!(first.dataset.cars.len(), 5);
    assert_eq!(first.report.three_modality_cars, 5);
    assert_eq!(first.report.degraded_audio_cars, 0);
    let counts = modalities_per_car(&first.dataset);
    assert!(counts.values().all(|c| *c == [1, 1, 1]));

    let second = link(input, 42)?;
    assert_eq!(first.dataset, second.dataset);
    Ok(())
}
