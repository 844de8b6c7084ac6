//! CSV reading and writing for raw pools, the cached full dataset and the
//! scale-factor projections.
//!
//! Readers look columns up by header name, so column order in the input does
//! not matter. A missing required column fails before any row is parsed.

use csv::{ReaderBuilder, StringRecord, Writer};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::dataset::{
    AudioRecord, Car, CarAttributes, CarId, ComplaintRecord, Dataset, ImageRecord, RecordId,
};
use crate::errors::{DatasetError, DatasetResult};

pub const CAR_COLUMNS: &[&str] = &[
    "year",
    "mileage",
    "fuel_type",
    "transmission",
    "vin",
    "registration_date",
    "country",
    "number_plate",
    "previous_owners",
];

pub const IMAGE_COLUMNS: &[&str] = &["image_id", "car_id", "image_path", "damage_status"];
pub const AUDIO_COLUMNS: &[&str] = &[
    "audio_id",
    "car_id",
    "audio_path",
    "generic_problem",
    "detailed_problem",
];
pub const COMPLAINT_COLUMNS: &[&str] = &[
    "complaint_id",
    "car_id",
    "summary",
    "component_class",
    "crash",
    "fire",
    "numberOfInjuries",
];

pub const FULL_DATA_DIR: &str = "full_data";
pub const CARS_FULL_FILE: &str = "car_data_full.csv";
pub const IMAGES_FULL_FILE: &str = "image_data_full.csv";
pub const AUDIO_FULL_FILE: &str = "audio_data_full.csv";
pub const COMPLAINTS_FULL_FILE: &str = "text_complaints_data_full.csv";
pub const DENORMALIZED_FILE: &str = "car_data_denormalized.csv";

/// Files making up one scale factor's tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaledPaths {
    pub dir: PathBuf,
    pub cars: PathBuf,
    pub images: PathBuf,
    pub audio: PathBuf,
    pub complaints: PathBuf,
}

impl ScaledPaths {
    pub fn new(output_dir: &Path, scale_factor: usize) -> Self {
        let dir = output_dir.join(format!("sf_{}", scale_factor));
        Self {
            cars: dir.join(format!("car_data_{}.csv", scale_factor)),
            images: dir.join(format!("image_car_data_{}.csv", scale_factor)),
            audio: dir.join(format!("audio_car_data_{}.csv", scale_factor)),
            complaints: dir.join(format!("text_complaints_data_{}.csv", scale_factor)),
            dir,
        }
    }
}

pub fn full_data_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(FULL_DATA_DIR)
}

fn full_data_files(output_dir: &Path) -> [PathBuf; 4] {
    let dir = full_data_dir(output_dir);
    [
        dir.join(CARS_FULL_FILE),
        dir.join(IMAGES_FULL_FILE),
        dir.join(AUDIO_FULL_FILE),
        dir.join(COMPLAINTS_FULL_FILE),
    ]
}

/// True when all four cached full tables exist.
pub fn full_data_exists(output_dir: &Path) -> bool {
    full_data_files(output_dir).iter().all(|p| p.exists())
}

//
// Column lookup
//

struct Columns {
    table: String,
    positions: HashMap<String, usize>,
}

impl Columns {
    fn new(table: &str, headers: &StringRecord, required: &[&str]) -> DatasetResult<Self> {
        let positions: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        for column in required {
            if !positions.contains_key(*column) {
                return Err(DatasetError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(Self {
            table: table.to_string(),
            positions,
        })
    }

    fn text<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
    }

    fn invalid(&self, row: usize, column: &str, value: &str, expected: impl Display) -> DatasetError {
        DatasetError::InvalidValue {
            table: self.table.clone(),
            row,
            message: format!("column '{}' value '{}': {}", column, value, expected),
        }
    }

    fn parse<T>(&self, record: &StringRecord, row: usize, column: &str) -> DatasetResult<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.text(record, column).trim();
        value
            .parse()
            .map_err(|e| self.invalid(row, column, value, e))
    }

    fn count(&self, record: &StringRecord, row: usize, column: &str) -> DatasetResult<u64> {
        let value = self.text(record, column);
        parse_count(value).ok_or_else(|| self.invalid(row, column, value, "expected a whole number"))
    }

    fn optional_count(
        &self,
        record: &StringRecord,
        row: usize,
        column: &str,
    ) -> DatasetResult<Option<u64>> {
        let value = self.text(record, column);
        if value.trim().is_empty() {
            return Ok(None);
        }
        self.count(record, row, column).map(Some)
    }

    fn optional_flag(
        &self,
        record: &StringRecord,
        row: usize,
        column: &str,
    ) -> DatasetResult<Option<bool>> {
        let value = self.text(record, column);
        if value.trim().is_empty() {
            return Ok(None);
        }
        parse_flag(value)
            .map(Some)
            .ok_or_else(|| self.invalid(row, column, value, "expected a boolean"))
    }
}

/// Whole numbers, also in the `3.0` form float-typed columns are written in.
pub fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u64>() {
        return Some(n);
    }
    match value.parse::<f64>() {
        Ok(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Some(f as u64),
        _ => None,
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "True" | "TRUE" | "1" | "1.0" => Some(true),
        "false" | "False" | "FALSE" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

fn open(path: &Path) -> DatasetResult<File> {
    if !path.exists() {
        return Err(DatasetError::FileNotFound(path.display().to_string()));
    }
    Ok(File::open(path)?)
}

fn table_reader<R: Read>(source: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .from_reader(source)
}

fn car_attributes(columns: &Columns, record: &StringRecord, row: usize) -> DatasetResult<CarAttributes> {
    Ok(CarAttributes {
        year: columns.parse(record, row, "year")?,
        mileage: columns.parse(record, row, "mileage")?,
        fuel_type: columns.text(record, "fuel_type").to_string(),
        transmission: columns.text(record, "transmission").to_string(),
        vin: columns.text(record, "vin").to_string(),
        registration_date: columns.text(record, "registration_date").to_string(),
        country: columns.text(record, "country").to_string(),
        number_plate: columns.text(record, "number_plate").to_string(),
        previous_owners: columns.parse(record, row, "previous_owners")?,
    })
}

//
// Raw sources
//

/// Reads the synthetic car table. A `car_id` column, if present, is ignored;
/// ids are assigned by the linker.
pub fn read_car_source_from<R: Read>(source: R) -> DatasetResult<Vec<CarAttributes>> {
    let mut reader = table_reader(source);
    let columns = Columns::new("cars", reader.headers()?, CAR_COLUMNS)?;
    let mut cars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        cars.push(car_attributes(&columns, &record?, row)?);
    }
    Ok(cars)
}

pub fn read_car_source(path: &Path) -> DatasetResult<Vec<CarAttributes>> {
    let cars = read_car_source_from(open(path)?)?;
    debug!(path = %path.display(), rows = cars.len(), "read car source");
    Ok(cars)
}

pub fn read_image_pool_from<R: Read>(source: R) -> DatasetResult<Vec<ImageRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new("images", reader.headers()?, &["image_path", "damage_status"])?;
    let mut images = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        images.push(ImageRecord {
            image_id: row as RecordId,
            car_id: None,
            image_path: columns.text(&record, "image_path").to_string(),
            damage_status: columns.text(&record, "damage_status").to_string(),
        });
    }
    Ok(images)
}

pub fn read_image_pool(path: &Path) -> DatasetResult<Vec<ImageRecord>> {
    read_image_pool_from(open(path)?)
}

pub fn read_audio_pool_from<R: Read>(source: R) -> DatasetResult<Vec<AudioRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new(
        "audio",
        reader.headers()?,
        &["audio_path", "generic_problem", "detailed_problem"],
    )?;
    let mut audio = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        audio.push(AudioRecord {
            audio_id: row as RecordId,
            car_id: None,
            audio_path: columns.text(&record, "audio_path").to_string(),
            generic_problem: columns.text(&record, "generic_problem").to_string(),
            detailed_problem: columns.text(&record, "detailed_problem").to_string(),
        });
    }
    Ok(audio)
}

pub fn read_audio_pool(path: &Path) -> DatasetResult<Vec<AudioRecord>> {
    read_audio_pool_from(open(path)?)
}

pub fn read_complaint_pool_from<R: Read>(source: R) -> DatasetResult<Vec<ComplaintRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new("complaints", reader.headers()?, &["summary", "component_class"])?;
    let mut complaints = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        complaints.push(complaint_record(&columns, &record, row, row as RecordId, None)?);
    }
    Ok(complaints)
}

pub fn read_complaint_pool(path: &Path) -> DatasetResult<Vec<ComplaintRecord>> {
    read_complaint_pool_from(open(path)?)
}

fn complaint_record(
    columns: &Columns,
    record: &StringRecord,
    row: usize,
    complaint_id: RecordId,
    car_id: Option<CarId>,
) -> DatasetResult<ComplaintRecord> {
    let injuries = columns.optional_count(record, row, "numberOfInjuries")?;
    Ok(ComplaintRecord {
        complaint_id,
        car_id,
        summary: columns.text(record, "summary").to_string(),
        component_class: columns.text(record, "component_class").to_string(),
        crash: columns.optional_flag(record, row, "crash")?,
        fire: columns.optional_flag(record, row, "fire")?,
        number_of_injuries: injuries.map(|n| n.min(u64::from(u32::MAX)) as u32),
    })
}

//
// Linked tables
//

fn read_linked_cars<R: Read>(source: R) -> DatasetResult<Vec<Car>> {
    let mut reader = table_reader(source);
    let mut required = vec!["car_id"];
    required.extend_from_slice(CAR_COLUMNS);
    let columns = Columns::new("cars", reader.headers()?, &required)?;
    let mut cars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        cars.push(Car {
            car_id: columns.count(&record, row, "car_id")?,
            attributes: car_attributes(&columns, &record, row)?,
        });
    }
    Ok(cars)
}

fn read_linked_images<R: Read>(source: R) -> DatasetResult<Vec<ImageRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new("images", reader.headers()?, IMAGE_COLUMNS)?;
    let mut images = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        images.push(ImageRecord {
            image_id: columns.count(&record, row, "image_id")?,
            car_id: columns.optional_count(&record, row, "car_id")?,
            image_path: columns.text(&record, "image_path").to_string(),
            damage_status: columns.text(&record, "damage_status").to_string(),
        });
    }
    Ok(images)
}

fn read_linked_audio<R: Read>(source: R) -> DatasetResult<Vec<AudioRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new("audio", reader.headers()?, AUDIO_COLUMNS)?;
    let mut audio = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        audio.push(AudioRecord {
            audio_id: columns.count(&record, row, "audio_id")?,
            car_id: columns.optional_count(&record, row, "car_id")?,
            audio_path: columns.text(&record, "audio_path").to_string(),
            generic_problem: columns.text(&record, "generic_problem").to_string(),
            detailed_problem: columns.text(&record, "detailed_problem").to_string(),
        });
    }
    Ok(audio)
}

fn read_linked_complaints<R: Read>(source: R) -> DatasetResult<Vec<ComplaintRecord>> {
    let mut reader = table_reader(source);
    let columns = Columns::new(
        "complaints",
        reader.headers()?,
        &["complaint_id", "car_id", "summary", "component_class"],
    )?;
    let mut complaints = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let complaint_id = columns.count(&record, row, "complaint_id")?;
        let car_id = columns.optional_count(&record, row, "car_id")?;
        complaints.push(complaint_record(&columns, &record, row, complaint_id, car_id)?);
    }
    Ok(complaints)
}

/// Reads a linked dataset from four table files and checks its foreign keys.
pub fn read_dataset(
    cars: &Path,
    images: &Path,
    audio: &Path,
    complaints: &Path,
) -> DatasetResult<Dataset> {
    let dataset = Dataset {
        cars: read_linked_cars(open(cars)?)?,
        images: read_linked_images(open(images)?)?,
        audio: read_linked_audio(open(audio)?)?,
        complaints: read_linked_complaints(open(complaints)?)?,
    };
    dataset.validate_foreign_keys()?;
    Ok(dataset)
}

/// Reads the cached full dataset under `output_dir/full_data`.
pub fn read_full_dataset(output_dir: &Path) -> DatasetResult<Dataset> {
    let [cars, images, audio, complaints] = full_data_files(output_dir);
    let dataset = read_dataset(&cars, &images, &audio, &complaints)?;
    info!(
        cars = dataset.cars.len(),
        images = dataset.images.len(),
        audio = dataset.audio.len(),
        complaints = dataset.complaints.len(),
        "loaded cached full dataset"
    );
    Ok(dataset)
}

/// `(record id, car id)` pairs of a scale-factor projection file.
pub fn read_id_links(path: &Path, table: &str, id_column: &str) -> DatasetResult<Vec<(RecordId, CarId)>> {
    let mut reader = table_reader(open(path)?);
    let columns = Columns::new(table, reader.headers()?, &[id_column, "car_id"])?;
    let mut links = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        links.push((
            columns.count(&record, row, id_column)?,
            columns.count(&record, row, "car_id")?,
        ));
    }
    Ok(links)
}

/// Car ids listed in a scale-factor car file.
pub fn read_car_ids(path: &Path) -> DatasetResult<Vec<CarId>> {
    let mut reader = table_reader(open(path)?);
    let columns = Columns::new("cars", reader.headers()?, &["car_id"])?;
    let mut ids = Vec::new();
    for (row, record) in reader.records().enumerate() {
        ids.push(columns.count(&record?, row, "car_id")?);
    }
    Ok(ids)
}

//
// Writers
//

/// Writes a header row followed by one row per item.
pub fn write_table<T, F>(
    path: &Path,
    items: impl IntoIterator<Item = T>,
    headers: &[&str],
    row_fn: F,
) -> DatasetResult<usize>
where
    F: Fn(T) -> Vec<String>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(headers)?;

    let mut rows = 0;
    for item in items {
        wtr.write_record(&row_fn(item))?;
        rows += 1;
    }
    wtr.flush()?;
    debug!(path = %path.display(), rows, "wrote table");
    Ok(rows)
}

pub(crate) fn opt_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn flag_cell(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => String::new(),
    }
}

pub(crate) fn attribute_cells(attributes: &CarAttributes) -> Vec<String> {
    vec![
        attributes.year.to_string(),
        attributes.mileage.to_string(),
        attributes.fuel_type.clone(),
        attributes.transmission.clone(),
        attributes.vin.clone(),
        attributes.registration_date.clone(),
        attributes.country.clone(),
        attributes.number_plate.clone(),
        attributes.previous_owners.to_string(),
    ]
}

fn car_cells(car: &Car) -> Vec<String> {
    let mut cells = vec![car.car_id.to_string()];
    cells.extend(attribute_cells(&car.attributes));
    cells
}

fn car_headers() -> Vec<&'static str> {
    let mut headers = vec!["car_id"];
    headers.extend_from_slice(CAR_COLUMNS);
    headers
}

pub fn write_car_source(path: &Path, cars: &[CarAttributes]) -> DatasetResult<usize> {
    write_table(path, cars, CAR_COLUMNS, attribute_cells)
}

/// Writes the four linked tables with every column.
pub fn write_dataset(
    dir: &Path,
    names: [&str; 4],
    dataset: &Dataset,
) -> DatasetResult<()> {
    let [cars, images, audio, complaints] = names;
    write_table(&dir.join(cars), &dataset.cars, &car_headers(), car_cells)?;
    write_table(&dir.join(images), &dataset.images, IMAGE_COLUMNS, |r| {
        vec![
            r.image_id.to_string(),
            opt_cell(r.car_id),
            r.image_path.clone(),
            r.damage_status.clone(),
        ]
    })?;
    write_table(&dir.join(audio), &dataset.audio, AUDIO_COLUMNS, |r| {
        vec![
            r.audio_id.to_string(),
            opt_cell(r.car_id),
            r.audio_path.clone(),
            r.generic_problem.clone(),
            r.detailed_problem.clone(),
        ]
    })?;
    write_table(&dir.join(complaints), &dataset.complaints, COMPLAINT_COLUMNS, |r| {
        vec![
            r.complaint_id.to_string(),
            opt_cell(r.car_id),
            r.summary.clone(),
            r.component_class.clone(),
            flag_cell(r.crash),
            flag_cell(r.fire),
            opt_cell(r.number_of_injuries),
        ]
    })?;
    Ok(())
}

pub fn write_full_dataset(output_dir: &Path, dataset: &Dataset) -> DatasetResult<()> {
    write_dataset(
        &full_data_dir(output_dir),
        [
            CARS_FULL_FILE,
            IMAGES_FULL_FILE,
            AUDIO_FULL_FILE,
            COMPLAINTS_FULL_FILE,
        ],
        dataset,
    )?;
    info!(dir = %full_data_dir(output_dir).display(), "wrote full dataset");
    Ok(())
}

/// Writes one scale factor's tables. Modality files only carry the payload
/// column, the record id and the car id.
pub fn write_scaled_dataset(
    output_dir: &Path,
    scale_factor: usize,
    dataset: &Dataset,
) -> DatasetResult<ScaledPaths> {
    let paths = ScaledPaths::new(output_dir, scale_factor);
    write_table(&paths.cars, &dataset.cars, &car_headers(), car_cells)?;
    write_table(
        &paths.images,
        &dataset.images,
        &["image_path", "image_id", "car_id"],
        |r| vec![r.image_path.clone(), r.image_id.to_string(), opt_cell(r.car_id)],
    )?;
    write_table(
        &paths.audio,
        &dataset.audio,
        &["audio_path", "audio_id", "car_id"],
        |r| vec![r.audio_path.clone(), r.audio_id.to_string(), opt_cell(r.car_id)],
    )?;
    write_table(
        &paths.complaints,
        &dataset.complaints,
        &["summary", "complaint_id", "car_id"],
        |r| vec![r.summary.clone(), r.complaint_id.to_string(), opt_cell(r.car_id)],
    )?;
    info!(dir = %paths.dir.display(), cars = dataset.cars.len(), "wrote scale factor");
    Ok(paths)
}

/// Returns the dataset with every table's rows in a random order. Ids and
/// links are untouched.
pub fn shuffle_rows<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Dataset {
    let mut shuffled = dataset.clone();
    shuffled.cars.shuffle(rng);
    shuffled.images.shuffle(rng);
    shuffled.audio.shuffle(rng);
    shuffled.complaints.shuffle(rng);
    shuffled
}
