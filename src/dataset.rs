use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::errors::{DatasetError, DatasetResult};

pub type CarId = u64;
pub type RecordId = u64;

/// Attributes of a synthetic car before it receives an identifier.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CarAttributes {
    pub year: u16,
    pub mileage: u32,
    pub fuel_type: String,
    pub transmission: String,
    pub vin: String,
    pub registration_date: String,
    pub country: String,
    pub number_plate: String,
    pub previous_owners: u8,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Car {
    pub car_id: CarId,
    pub attributes: CarAttributes,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImageRecord {
    pub image_id: RecordId,
    pub car_id: Option<CarId>,
    pub image_path: String,
    pub damage_status: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AudioRecord {
    pub audio_id: RecordId,
    pub car_id: Option<CarId>,
    pub audio_path: String,
    pub generic_problem: String,
    pub detailed_problem: String,
}

impl AudioRecord {
    pub fn category(&self) -> (&str, &str) {
        (&self.generic_problem, &self.detailed_problem)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ComplaintRecord {
    pub complaint_id: RecordId,
    pub car_id: Option<CarId>,
    pub summary: String,
    pub component_class: String,
    pub crash: Option<bool>,
    pub fire: Option<bool>,
    pub number_of_injuries: Option<u32>,
}

/// The three modality kinds a car can be described by.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modality {
    Image,
    Audio,
    Complaint,
}

impl Modality {
    pub fn table_name(&self) -> &'static str {
        match self {
            Modality::Image => "images",
            Modality::Audio => "audio",
            Modality::Complaint => "complaints",
        }
    }
}

/// The four normalized tables joined only through `car_id`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    pub cars: Vec<Car>,
    pub images: Vec<ImageRecord>,
    pub audio: Vec<AudioRecord>,
    pub complaints: Vec<ComplaintRecord>,
}

impl Dataset {
    pub fn car_ids(&self) -> HashSet<CarId> {
        self.cars.iter().map(|c| c.car_id).collect()
    }

    /// Number of distinct modalities referencing each car. Cars without any
    /// assigned record are absent from the map.
    pub fn modality_counts(&self) -> HashMap<CarId, usize> {
        let with_image: HashSet<CarId> = self.images.iter().filter_map(|r| r.car_id).collect();
        let with_audio: HashSet<CarId> = self.audio.iter().filter_map(|r| r.car_id).collect();
        let with_complaint: HashSet<CarId> =
            self.complaints.iter().filter_map(|r| r.car_id).collect();

        let mut counts: HashMap<CarId, usize> = HashMap::new();
        for car_id in with_image
            .iter()
            .chain(with_audio.iter())
            .chain(with_complaint.iter())
        {
            *counts.entry(*car_id).or_insert(0) += 1;
        }
        counts
    }

    /// Checks that every car id is unique and every modality record points at
    /// a car that exists.
    pub fn validate_foreign_keys(&self) -> DatasetResult<()> {
        let mut car_ids = HashSet::with_capacity(self.cars.len());
        for car in &self.cars {
            if !car_ids.insert(car.car_id) {
                return Err(DatasetError::DuplicateId {
                    table: "cars".to_string(),
                    column: "car_id".to_string(),
                    id: car.car_id,
                });
            }
        }

        let check = |table: &str, id: RecordId, car_id: Option<CarId>| match car_id {
            Some(car_id) if !car_ids.contains(&car_id) => Err(DatasetError::DanglingForeignKey {
                table: table.to_string(),
                id,
                car_id,
            }),
            _ => Ok(()),
        };

        for r in &self.images {
            check(Modality::Image.table_name(), r.image_id, r.car_id)?;
        }
        for r in &self.audio {
            check(Modality::Audio.table_name(), r.audio_id, r.car_id)?;
        }
        for r in &self.complaints {
            check(Modality::Complaint.table_name(), r.complaint_id, r.car_id)?;
        }
        Ok(())
    }
}
