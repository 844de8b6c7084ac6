use serde::{Deserialize, Serialize};

/// ## Structure
/// The preparation plan describes where the raw tables live and which scaled
/// datasets to produce.
///
/// ```text
/// PreparationPlan
///   ├── seed: u64
///   ├── num_cars: usize
///   ├── sources: SourcePaths
///   │   ├── cars
///   │   ├── images
///   │   ├── audio
///   │   └── complaints
///   ├── output_dir: String
///   └── scale_factors: Vec<usize>
/// ```
///
/// Relative paths resolve against the directory containing the plan file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PreparationPlan {
    pub seed: u64,
    /// Cars to generate when the car source file does not exist yet.
    pub num_cars: usize,
    pub sources: SourcePaths,
    pub output_dir: String,
    pub scale_factors: Vec<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SourcePaths {
    pub cars: String,
    pub images: String,
    pub audio: String,
    pub complaints: String,
}

impl Default for PreparationPlan {
    fn default() -> Self {
        Self {
            seed: 42,
            num_cars: 300_000,
            sources: SourcePaths::default(),
            output_dir: "data".to_string(),
            scale_factors: vec![157_376],
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            cars: "source_data/car_data.csv".to_string(),
            images: "source_data/all_images.csv".to_string(),
            audio: "source_data/all_audio.csv".to_string(),
            complaints: "source_data/all_complaints.csv".to_string(),
        }
    }
}
