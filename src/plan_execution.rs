use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use anyhow::Result;

use crate::common::{resolve_path, write_string_to_file};
use crate::dataset::Dataset;
use crate::denormalize::write_denormalized;
use crate::errors::{DatasetError, DatasetResult};
use crate::linker::{link, LinkInput, LinkReport};
use crate::plan::PreparationPlan;
use crate::scale::{scale_down_seeded, ScaleReport};
use crate::synthetic::generate_cars_seeded;
use crate::table_io::{self, ScaledPaths, DENORMALIZED_FILE};

pub const LINK_REPORT_FILE: &str = "link_report.json";

/// What one pipeline run produced.
#[derive(Serialize, Debug, Clone)]
pub struct PipelineSummary {
    /// Present when the full dataset was linked in this run rather than
    /// loaded from the cache.
    pub link_report: Option<LinkReport>,
    pub full_cars: usize,
    pub scaled: Vec<ScaledSummary>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ScaledSummary {
    pub dir: PathBuf,
    /// Cars actually written, below the directory's N when the dataset is
    /// smaller than the requested scale factor.
    pub cars: usize,
    pub report: ScaleReport,
}

pub fn execute_plan(plan: String) -> Result<PipelineSummary> {
    info!("Executing plan");

    let plan_file_path = Path::new(&plan);
    let path_content = std::fs::read_to_string(plan_file_path)?;
    let plan: PreparationPlan = serde_yaml::from_str(&path_content)?;

    debug!("Executing plan: {:?}", plan);

    let base_dir = plan_file_path.parent().unwrap_or_else(|| Path::new("."));
    let summary = run_pipeline(&plan, base_dir)?;
    Ok(summary)
}

/// Runs every preparation step of `plan`, resolving its paths against
/// `base_dir`.
pub fn run_pipeline(plan: &PreparationPlan, base_dir: &Path) -> DatasetResult<PipelineSummary> {
    if let Some(&invalid) = plan.scale_factors.iter().find(|&&sf| sf < 1) {
        return Err(DatasetError::InvalidScaleFactor(invalid));
    }

    let output_dir = resolve_path(base_dir, &plan.output_dir);

    let (full, link_report) = if table_io::full_data_exists(&output_dir) {
        info!(dir = %output_dir.display(), "reusing cached full dataset");
        (table_io::read_full_dataset(&output_dir)?, None)
    } else {
        let (full, report) = build_full_dataset(plan, base_dir, &output_dir)?;
        (full, Some(report))
    };

    let mut scaled = Vec::with_capacity(plan.scale_factors.len());
    for &scale_factor in &plan.scale_factors {
        info!("Scaling down to {} cars", scale_factor);
        let outcome = scale_down_seeded(&full, scale_factor, plan.seed)?;
        let cars = outcome.dataset.cars.len();
        if cars < scale_factor {
            warn!(
                requested = scale_factor,
                cars, "dataset is smaller than the scale factor, writing every car"
            );
        }
        let ScaledPaths { dir, .. } =
            table_io::write_scaled_dataset(&output_dir, scale_factor, &outcome.dataset)?;
        scaled.push(ScaledSummary {
            dir,
            cars,
            report: outcome.report,
        });
    }

    Ok(PipelineSummary {
        link_report,
        full_cars: full.cars.len(),
        scaled,
    })
}

/// Loads or generates the car table, links the raw pools and writes the
/// full tables. Returns the dataset in the shuffled row order it was written
/// in, so scaling sees the same order as a later cached run.
fn build_full_dataset(
    plan: &PreparationPlan,
    base_dir: &Path,
    output_dir: &Path,
) -> DatasetResult<(Dataset, LinkReport)> {
    let cars_path = resolve_path(base_dir, &plan.sources.cars);
    let cars = if cars_path.exists() {
        table_io::read_car_source(&cars_path)?
    } else {
        info!("Generating {} synthetic cars", plan.num_cars);
        let cars = generate_cars_seeded(plan.num_cars, plan.seed);
        table_io::write_car_source(&cars_path, &cars)?;
        cars
    };

    let input = LinkInput {
        cars,
        images: table_io::read_image_pool(&resolve_path(base_dir, &plan.sources.images))?,
        audio: table_io::read_audio_pool(&resolve_path(base_dir, &plan.sources.audio))?,
        complaints: table_io::read_complaint_pool(&resolve_path(
            base_dir,
            &plan.sources.complaints,
        ))?,
    };

    link_full_dataset(input, plan.seed, output_dir)
}

/// Links `input` and writes everything under `output_dir/full_data`: the
/// denormalized view, the link report and the shuffled full tables.
pub fn link_full_dataset(
    input: LinkInput,
    seed: u64,
    output_dir: &Path,
) -> DatasetResult<(Dataset, LinkReport)> {
    let outcome = link(input, seed)?;
    let full_dir = table_io::full_data_dir(output_dir);

    let rows = write_denormalized(&full_dir.join(DENORMALIZED_FILE), &outcome.dataset)?;
    debug!(rows, "wrote denormalized view");

    let report_json = serde_json::to_string_pretty(&outcome.report)?;
    write_string_to_file(&full_dir.join(LINK_REPORT_FILE), &report_json)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let shuffled = table_io::shuffle_rows(&outcome.dataset, &mut rng);
    table_io::write_full_dataset(output_dir, &shuffled)?;

    Ok((shuffled, outcome.report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SourcePaths;
    use tempfile::TempDir;

    fn write_pools(dir: &Path) {
        std::fs::write(
            dir.join("images.csv"),
            "image_path,damage_status\na.jpg,no_damage\nb.jpg,torn\nc.jpg,dented\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("audio.csv"),
            "audio_path,generic_problem,detailed_problem\nx.wav,startup state,dead_battery\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("complaints.csv"),
            "summary,component_class,crash,fire,numberOfInjuries\n\
             dead,ELECTRICAL SYSTEM,False,False,0\n\
             loud,ENGINE,True,False,1.0\n",
        )
        .unwrap();
    }

    fn plan() -> PreparationPlan {
        PreparationPlan {
            seed: 42,
            num_cars: 10,
            sources: SourcePaths {
                cars: "cars.csv".to_string(),
                images: "images.csv".to_string(),
                audio: "audio.csv".to_string(),
                complaints: "complaints.csv".to_string(),
            },
            output_dir: "out".to_string(),
            scale_factors: vec![2],
        }
    }

    #[test]
    fn pipeline_generates_links_and_scales() {
        let tmp = TempDir::new().unwrap();
        write_pools(tmp.path());

        let summary = run_pipeline(&plan(), tmp.path()).unwrap();
        let report = summary.link_report.unwrap();
        assert_eq!(report.audio_assigned, 1);
        assert_eq!(summary.full_cars, 3);
        assert_eq!(summary.scaled.len(), 1);

        assert!(tmp.path().join("cars.csv").exists());
        assert!(tmp.path().join("out/full_data/car_data_denormalized.csv").exists());
        assert!(tmp.path().join("out/full_data/link_report.json").exists());
        assert!(tmp.path().join("out/sf_2/car_data_2.csv").exists());
        assert!(tmp.path().join("out/sf_2/text_complaints_data_2.csv").exists());
    }

    #[test]
    fn second_run_reuses_cache() {
        let tmp = TempDir::new().unwrap();
        write_pools(tmp.path());

        run_pipeline(&plan(), tmp.path()).unwrap();
        let first = std::fs::read_to_string(tmp.path().join("out/sf_2/car_data_2.csv")).unwrap();

        let summary = run_pipeline(&plan(), tmp.path()).unwrap();
        assert!(summary.link_report.is_none());
        let second = std::fs::read_to_string(tmp.path().join("out/sf_2/car_data_2.csv")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_zero_scale_factor_before_any_work() {
        let tmp = TempDir::new().unwrap();
        let mut plan = plan();
        plan.scale_factors = vec![5, 0];
        assert!(matches!(
            run_pipeline(&plan, tmp.path()),
            Err(DatasetError::InvalidScaleFactor(0))
        ));
        assert!(!tmp.path().join("cars.csv").exists());
    }

    #[test]
    fn execute_plan_resolves_paths_next_to_plan() {
        let tmp = TempDir::new().unwrap();
        write_pools(tmp.path());
        let plan_path = tmp.path().join("plan.yaml");
        std::fs::write(&plan_path, serde_yaml::to_string(&plan()).unwrap()).unwrap();

        let summary = execute_plan(plan_path.to_string_lossy().to_string()).unwrap();
        assert_eq!(summary.scaled[0].report.target_size, 2);
        assert!(tmp.path().join("out/full_data/car_data_full.csv").exists());
    }
}
