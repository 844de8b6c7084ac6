//! Single-table view of a linked dataset: every car joined with its images,
//! audio and complaints.

use std::collections::HashMap;
use std::path::Path;

use crate::dataset::{AudioRecord, Car, CarId, ComplaintRecord, Dataset, ImageRecord};
use crate::errors::DatasetResult;
use crate::table_io::{attribute_cells, flag_cell, opt_cell, write_table, CAR_COLUMNS};

/// One car paired with at most one record of each modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenormalizedRow<'a> {
    pub car: &'a Car,
    pub image: Option<&'a ImageRecord>,
    pub audio: Option<&'a AudioRecord>,
    pub complaint: Option<&'a ComplaintRecord>,
}

pub const MODALITY_COLUMNS: &[&str] = &[
    "image_id",
    "image_path",
    "damage_status",
    "audio_id",
    "audio_path",
    "generic_problem",
    "detailed_problem",
    "complaint_id",
    "summary",
    "component_class",
    "crash",
    "fire",
    "numberOfInjuries",
];

pub fn denormalized_headers() -> Vec<&'static str> {
    let mut headers = vec!["car_id"];
    headers.extend_from_slice(CAR_COLUMNS);
    headers.extend_from_slice(MODALITY_COLUMNS);
    headers
}

fn group_by_car<T>(records: &[T], car_id: impl Fn(&T) -> Option<CarId>) -> HashMap<CarId, Vec<&T>> {
    let mut groups: HashMap<CarId, Vec<&T>> = HashMap::new();
    for record in records {
        if let Some(id) = car_id(record) {
            groups.entry(id).or_default().push(record);
        }
    }
    groups
}

fn options<'a, T>(groups: &HashMap<CarId, Vec<&'a T>>, car_id: CarId) -> Vec<Option<&'a T>> {
    match groups.get(&car_id) {
        Some(records) => records.iter().copied().map(Some).collect(),
        None => vec![None],
    }
}

/// Left-joins the modality tables onto the car table. A car with several
/// records of one modality yields one row per combination; a modality the car
/// lacks leaves its columns empty.
pub fn denormalize(dataset: &Dataset) -> Vec<DenormalizedRow<'_>> {
    let images = group_by_car(&dataset.images, |r| r.car_id);
    let audio = group_by_car(&dataset.audio, |r| r.car_id);
    let complaints = group_by_car(&dataset.complaints, |r| r.car_id);

    let mut rows = Vec::new();
    for car in &dataset.cars {
        let car_images: Vec<Option<&ImageRecord>> = options(&images, car.car_id);
        let car_audio: Vec<Option<&AudioRecord>> = options(&audio, car.car_id);
        let car_complaints: Vec<Option<&ComplaintRecord>> = options(&complaints, car.car_id);

        for image in &car_images {
            for clip in &car_audio {
                for complaint in &car_complaints {
                    rows.push(DenormalizedRow {
                        car,
                        image: *image,
                        audio: *clip,
                        complaint: *complaint,
                    });
                }
            }
        }
    }
    rows
}

fn row_cells(row: DenormalizedRow<'_>) -> Vec<String> {
    let mut cells = vec![row.car.car_id.to_string()];
    cells.extend(attribute_cells(&row.car.attributes));
    cells.extend([
        opt_cell(row.image.map(|r| r.image_id)),
        opt_cell(row.image.map(|r| &r.image_path)),
        opt_cell(row.image.map(|r| &r.damage_status)),
        opt_cell(row.audio.map(|r| r.audio_id)),
        opt_cell(row.audio.map(|r| &r.audio_path)),
        opt_cell(row.audio.map(|r| &r.generic_problem)),
        opt_cell(row.audio.map(|r| &r.detailed_problem)),
        opt_cell(row.complaint.map(|r| r.complaint_id)),
        opt_cell(row.complaint.map(|r| &r.summary)),
        opt_cell(row.complaint.map(|r| &r.component_class)),
        flag_cell(row.complaint.and_then(|r| r.crash)),
        flag_cell(row.complaint.and_then(|r| r.fire)),
        opt_cell(row.complaint.and_then(|r| r.number_of_injuries)),
    ]);
    cells
}

/// Writes the denormalized view and returns the number of rows.
pub fn write_denormalized(path: &Path, dataset: &Dataset) -> DatasetResult<usize> {
    write_table(path, denormalize(dataset), &denormalized_headers(), row_cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::*;

    #[test]
    fn one_row_per_car_with_single_records() {
        let dataset = Dataset {
            cars: vec![car(0), car(1)],
            images: vec![image(0, Some(0), "torn")],
            audio: vec![audio(0, Some(0), "startup state", "bad_ignition")],
            complaints: vec![complaint(0, Some(1), "ENGINE")],
        };

        let rows = denormalize(&dataset);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].car.car_id, 0);
        assert!(rows[0].image.is_some() && rows[0].audio.is_some());
        assert!(rows[0].complaint.is_none());
        assert!(rows[1].image.is_none());
        assert_eq!(rows[1].complaint.map(|c| c.complaint_id), Some(0));
    }

    #[test]
    fn multiple_records_multiply_rows() {
        let dataset = Dataset {
            cars: vec![car(0)],
            images: vec![image(0, Some(0), "torn"), image(1, Some(0), "dented")],
            complaints: vec![
                complaint(0, Some(0), "ENGINE"),
                complaint(1, Some(0), "TIRES"),
                complaint(2, Some(0), "WHEELS"),
            ],
            ..Default::default()
        };
        assert_eq!(denormalize(&dataset).len(), 6);
    }

    #[test]
    fn empty_modalities_leave_blank_cells() {
        let dataset = Dataset {
            cars: vec![car(3)],
            ..Default::default()
        };
        let rows = denormalize(&dataset);
        let cells = row_cells(rows[0]);
        assert_eq!(cells.len(), denormalized_headers().len());
        assert_eq!(cells[0], "3");
        assert!(cells[CAR_COLUMNS.len() + 1..].iter().all(String::is_empty));
    }
}
