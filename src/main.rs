use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use carbench::common;
use carbench::denormalize::write_denormalized;
use carbench::evaluation::{self, Evaluator, QueryEvaluation, ResultTable, Score, CATALOG};
use carbench::linker::LinkInput;
use carbench::plan;
use carbench::plan_execution;
use carbench::scale::scale_down_seeded;
use carbench::synthetic::generate_cars_seeded;
use carbench::table_io::{self, DENORMALIZED_FILE};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every step of a preparation plan
    Run {
        #[clap(short, long)]
        plan: String,
    },
    /// Write the default preparation plan
    Init {
        #[clap(short, long)]
        plan: String,
    },
    /// Generate a synthetic car table
    GenerateCars {
        #[clap(short, long, default_value = "300000")]
        count: usize,
        #[clap(short, long, default_value = "42")]
        seed: u64,
        #[clap(short, long, default_value = "source_data/car_data.csv")]
        output: PathBuf,
    },
    /// Link cars with the image, audio and complaint pools
    Link {
        #[clap(long)]
        cars: PathBuf,
        #[clap(long)]
        images: PathBuf,
        #[clap(long)]
        audio: PathBuf,
        #[clap(long)]
        complaints: PathBuf,
        #[clap(short, long, default_value = "42")]
        seed: u64,
        #[clap(short, long, default_value = "data")]
        output_dir: PathBuf,
    },
    /// Scale the full dataset down to a number of cars
    Scale {
        #[clap(short, long, default_value = "data")]
        data_dir: PathBuf,
        #[clap(short = 'n', long)]
        scale_factor: usize,
        #[clap(short, long, default_value = "42")]
        seed: u64,
    },
    /// Write the one-row-per-combination view of the full dataset
    Denormalize {
        #[clap(short, long, default_value = "data")]
        data_dir: PathBuf,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Write ground truth files for every query
    GroundTruth {
        #[clap(short, long, default_value = "data")]
        data_dir: PathBuf,
        #[clap(short = 'n', long)]
        scale_factor: Option<usize>,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Score engine results against the ground truth
    Evaluate {
        #[clap(short, long, default_value = "data")]
        data_dir: PathBuf,
        #[clap(short, long)]
        results: PathBuf,
        #[clap(short = 'n', long)]
        scale_factor: Option<usize>,
        /// Score a single query instead of every Q<k>.csv in the results directory
        #[clap(short, long)]
        query: Option<u32>,
        /// Also write the scores as JSON
        #[clap(long)]
        json: Option<PathBuf>,
    },
    /// List the benchmark queries
    Queries,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Run { plan } => {
            info!("Running plan: {}", plan);
            let summary = plan_execution::execute_plan(plan)?;
            info!(
                full_cars = summary.full_cars,
                scale_factors = summary.scaled.len(),
                "plan finished"
            );
        }
        Commands::Init { plan } => {
            info!("Initializing plan: {}", plan);
            let plan_file_path = plan;
            let plan = plan::PreparationPlan::default();
            let serialized_plan = serde_yaml::to_string(&plan)?;
            common::write_string_to_file(Path::new(&plan_file_path), &serialized_plan)?;
        }
        Commands::GenerateCars {
            count,
            seed,
            output,
        } => {
            info!("Generating {} cars into {}", count, output.display());
            let cars = generate_cars_seeded(count, seed);
            table_io::write_car_source(&output, &cars)?;
        }
        Commands::Link {
            cars,
            images,
            audio,
            complaints,
            seed,
            output_dir,
        } => {
            let input = LinkInput {
                cars: table_io::read_car_source(&cars)?,
                images: table_io::read_image_pool(&images)?,
                audio: table_io::read_audio_pool(&audio)?,
                complaints: table_io::read_complaint_pool(&complaints)?,
            };
            let (dataset, report) = plan_execution::link_full_dataset(input, seed, &output_dir)?;
            info!(
                cars = dataset.cars.len(),
                three = report.three_modality_cars,
                two = report.two_modality_cars,
                one = report.one_modality_cars,
                "linked full dataset"
            );
        }
        Commands::Scale {
            data_dir,
            scale_factor,
            seed,
        } => {
            info!("Scaling {} down to {} cars", data_dir.display(), scale_factor);
            let full = table_io::read_full_dataset(&data_dir)?;
            let outcome = scale_down_seeded(&full, scale_factor, seed)?;
            table_io::write_scaled_dataset(&data_dir, scale_factor, &outcome.dataset)?;
        }
        Commands::Denormalize { data_dir, output } => {
            let output = output
                .unwrap_or_else(|| table_io::full_data_dir(&data_dir).join(DENORMALIZED_FILE));
            let full = table_io::read_full_dataset(&data_dir)?;
            let rows = write_denormalized(&output, &full)?;
            info!(rows, "wrote {}", output.display());
        }
        Commands::GroundTruth {
            data_dir,
            scale_factor,
            output,
        } => {
            let output = output.unwrap_or_else(|| data_dir.join(evaluation::GROUND_TRUTH_DIR));
            let evaluator = Evaluator::load(&data_dir, scale_factor)?;
            let written = evaluator.write_ground_truths(&output)?;
            info!(files = written.len(), "wrote ground truth to {}", output.display());
        }
        Commands::Evaluate {
            data_dir,
            results,
            scale_factor,
            query,
            json,
        } => {
            let evaluator = Evaluator::load(&data_dir, scale_factor)?;
            let evaluations = match query {
                Some(query) => {
                    let table = ResultTable::read(&results)?;
                    vec![evaluator.evaluate(query, &table)?]
                }
                None => evaluator.evaluate_dir(&results)?,
            };
            for evaluation in &evaluations {
                print_evaluation(evaluation);
            }
            if let Some(json) = json {
                let serialized = serde_json::to_string_pretty(&evaluations)?;
                common::write_string_to_file(&json, &serialized)?;
            }
        }
        Commands::Queries => {
            for query in CATALOG {
                println!("{:<5}{}", query.name(), query.description);
            }
        }
    }

    Ok(())
}

fn print_evaluation(evaluation: &QueryEvaluation) {
    let name = format!("Q{}", evaluation.query).bold();
    match &evaluation.score {
        Score::Retrieval(score) => {
            let f1 = format!("{:.3}", score.f1);
            let f1 = if score.f1 >= 0.999 { f1.green() } else { f1.yellow() };
            println!(
                "{}  precision {:.3}  recall {:.3}  f1 {}  ({} expected, {} returned)",
                name,
                score.precision,
                score.recall,
                f1,
                evaluation.ground_truth_size,
                evaluation.result_rows
            );
        }
        Score::Aggregation(score) => {
            let expected = score
                .expected
                .map(|g| format!("{:.3}", g))
                .unwrap_or_else(|| "undefined".to_string());
            let error = match score.error {
                Some(error) if error < 1e-9 => format!("{:.4}", error).green(),
                Some(error) => format!("{:.4}", error).yellow(),
                None => "n/a".red(),
            };
            println!(
                "{}  expected {}  actual {:.3}  error {}",
                name, expected, score.actual, error
            );
        }
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .without_time()
        .init();
}
