//! End-to-end pipeline tests
//!
//! Runs a plan over small raw pools, then generates ground truth for a scale
//! factor and scores answers against it

use anyhow::Result;
use carbench::compatibility::{DAMAGE_COMBINATIONS, NO_DAMAGE};
use carbench::evaluation::ground_truth::write_ground_truth;
use carbench::evaluation::{query, Evaluator, GroundTruth, QueryKind, Score, CATALOG};
use carbench::plan::{PreparationPlan, SourcePaths};
use carbench::plan_execution::{execute_plan, LINK_REPORT_FILE};
use carbench::table_io;
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

const AUDIO_CATEGORIES: &[&str] = &[
    "startup state,dead_battery",
    "startup state,bad_ignition",
    "braking state,normal_brakes",
    "braking state,worn_out_brakes",
    "idle state,normal_engine_idle",
];

const COMPONENTS: &[&str] = &["ENGINE", "ELECTRICAL SYSTEM", "TIRES", "SERVICE BRAKES", "STEERING"];

fn write_pools(dir: &Path) -> Result<()> {
    let mut images = String::from("image_path,damage_status\n");
    for i in 0..240 {
        let status = if i % 4 == 0 {
            NO_DAMAGE
        } else {
            DAMAGE_COMBINATIONS[i % DAMAGE_COMBINATIONS.len()]
        };
        writeln!(images, "images/{}.jpg,{}", i, status)?;
    }

    let mut audio = String::from("audio_path,generic_problem,detailed_problem\n");
    for i in 0..40 {
        writeln!(audio, "audio/{}.wav,{}", i, AUDIO_CATEGORIES[i % AUDIO_CATEGORIES.len()])?;
    }

    let mut complaints = String::from("summary,component_class,crash,fire,numberOfInjuries\n");
    for i in 0..150 {
        let crash = if i % 5 == 0 { "True" } else { "False" };
        let fire = if i % 11 == 0 { "true" } else { "false" };
        writeln!(
            complaints,
            "complaint {},{},{},{},{}.0",
            i,
            COMPONENTS[i % COMPONENTS.len()],
            crash,
            fire,
            i % 3
        )?;
    }

    std::fs::create_dir_all(dir.join("raw"))?;
    std::fs::write(dir.join("raw/images.csv"), images)?;
    std::fs::write(dir.join("raw/audio.csv"), audio)?;
    std::fs::write(dir.join("raw/complaints.csv"), complaints)?;
    Ok(())
}

fn write_plan(dir: &Path) -> Result<String> {
    let plan = PreparationPlan {
        seed: 42,
        num_cars: 200,
        sources: SourcePaths {
            cars: "raw/cars.csv".to_string(),
            images: "raw/images.csv".to_string(),
            audio: "raw/audio.csv".to_string(),
            complaints: "raw/complaints.csv".to_string(),
        },
        output_dir: "data".to_string(),
        scale_factors: vec![50, 1_000],
    };
    let path = dir.join("plan.yaml");
    std::fs::write(&path, serde_yaml::to_string(&plan)?)?;
    Ok(path.to_string_lossy().to_string())
}

#[test]
fn test_pipeline_writes_every_output() -> Result<()> {
    let tmp = TempDir::new()?;
    write_pools(tmp.path())?;
    let summary = execute_plan(write_plan(tmp.path())?)?;

    let report = summary
        .link_report
        .ok_or_else(|| anyhow::anyhow!("fresh run must link"))?;
    assert_eq!(report.audio_assigned, 40);
    assert_eq!(summary.full_cars, 200);

    let data = tmp.path().join("data");
    assert!(tmp.path().join("raw/cars.csv").exists());
    assert!(data.join("full_data").join(LINK_REPORT_FILE).exists());
    assert!(data.join("full_data/car_data_denormalized.csv").exists());
    for name in [
        "car_data_50.csv",
        "image_car_data_50.csv",
        "audio_car_data_50.csv",
        "text_complaints_data_50.csv",
    ] {
        assert!(data.join("sf_50").join(name).exists(), "missing {}", name);
    }
    // larger than the dataset, written unchanged
    assert!(summary.scaled[1].report.identity);
    assert_eq!(summary.scaled[0].cars, 50);
    assert_eq!(summary.scaled[1].cars, 200);
    assert!(data.join("sf_1000/car_data_1000.csv").exists());

    let full = table_io::read_full_dataset(&data)?;
    assert_eq!(full.cars.len(), 200);
    assert_eq!(full.audio.len(), 40);
    assert!(full.images.len() <= 240 && full.complaints.len() <= 150);
    Ok(())
}

#[test]
fn test_cached_run_reproduces_scaled_tables() -> Result<()> {
    let tmp = TempDir::new()?;
    write_pools(tmp.path())?;
    let plan = write_plan(tmp.path())?;
    let car_file = tmp.path().join("data/sf_50/car_data_50.csv");
    let audio_file = tmp.path().join("data/sf_50/audio_car_data_50.csv");

    execute_plan(plan.clone())?;
    let cars = std::fs::read_to_string(&car_file)?;
    let audio = std::fs::read_to_string(&audio_file)?;

    let summary = execute_plan(plan)?;
    assert!(summary.link_report.is_none());
    assert_eq!(std::fs::read_to_string(&car_file)?, cars);
    assert_eq!(std::fs::read_to_string(&audio_file)?, audio);
    Ok(())
}

#[test]
fn test_ground_truth_answers_score_perfectly() -> Result<()> {
    let tmp = TempDir::new()?;
    write_pools(tmp.path())?;
    execute_plan(write_plan(tmp.path())?)?;
    let data = tmp.path().join("data");

    let evaluator = Evaluator::load(&data, Some(50))?;
    assert_eq!(evaluator.dataset().cars.len(), 50);
    let written = evaluator.write_ground_truths(&data.join("ground_truth"))?;
    assert_eq!(written.len(), CATALOG.len());
    assert!(data.join("ground_truth/Q1_50.csv").exists());

    // answer every query with its own ground truth, cut to the LIMIT
    let results = tmp.path().join("results");
    for q in CATALOG {
        let truth = match evaluator.ground_truth(q.id)? {
            GroundTruth::Scalar(None) => continue,
            GroundTruth::Ids(mut ids) => {
                if let QueryKind::Retrieval {
                    limit: Some(limit), ..
                } = q.kind
                {
                    ids.truncate(limit);
                }
                GroundTruth::Ids(ids)
            }
            other => other,
        };
        write_ground_truth(&results.join(format!("{}.csv", q.name())), q, &truth)?;
    }

    let evaluations = evaluator.evaluate_dir(&results)?;
    assert!(!evaluations.is_empty());
    for evaluation in evaluations {
        match evaluation.score {
            Score::Retrieval(score) => {
                assert_eq!(score.precision, 1.0, "Q{}", evaluation.query);
                assert_eq!(score.recall, 1.0, "Q{}", evaluation.query);
            }
            Score::Aggregation(score) => {
                assert_eq!(score.error, Some(0.0), "Q{}", evaluation.query);
            }
        }
    }
    Ok(())
}

#[test]
fn test_partial_answer_loses_recall() -> Result<()> {
    let tmp = TempDir::new()?;
    write_pools(tmp.path())?;
    execute_plan(write_plan(tmp.path())?)?;
    let data = tmp.path().join("data");

    let evaluator = Evaluator::load(&data, None)?;
    let q7 = query(7)?;
    let ids = match evaluator.ground_truth(7)? {
        GroundTruth::Ids(ids) => ids,
        other => anyhow::bail!("unexpected ground truth {:?}", other),
    };
    assert!(ids.len() >= 2);

    let half = ids.len() / 2;
    let answer = tmp.path().join("Q7.csv");
    write_ground_truth(&answer, q7, &GroundTruth::Ids(ids[..half].to_vec()))?;

    let table = carbench::evaluation::ResultTable::read(&answer)?;
    let evaluation = evaluator.evaluate(7, &table)?;
    match evaluation.score {
        Score::Retrieval(score) => {
            assert_eq!(score.precision, 1.0);
            assert!((score.recall - half as f64 / ids.len() as f64).abs() < 1e-9);
        }
        other => anyhow::bail!("unexpected score {:?}", other),
    }
    Ok(())
}
