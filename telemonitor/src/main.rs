use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use telemonitor::{
    add_note, doctor_overview, history, patient_stats, patients_for_doctor, process_visit,
    register_patient, Config, JsonStore, NewPatient, PatientId, Sex,
};
use voice_severity::{analyze, AcousticExtractor, Analysis, Feature, ScoringModel, VoiceSample};

/// Voice telemonitoring: motor-severity scores from voice recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.telemonitor/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score WAV recordings without storing anything
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a patient under a physician
    Register {
        /// 16-character fiscal code
        codice_fiscale: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        age: u32,
        /// M or F
        #[arg(long)]
        sex: Sex,
        /// Responsible physician
        #[arg(long)]
        doctor: String,
    },

    /// Analyze a recording and store it for a patient
    Visit {
        codice_fiscale: String,
        file: PathBuf,
    },

    /// Annotate a stored measurement
    Note {
        codice_fiscale: String,
        /// Measurement timestamp as shown by `history` (RFC 3339)
        timestamp: DateTime<Utc>,
        note: String,
        #[arg(long)]
        doctor: String,
    },

    /// Show a patient's measurements, newest first
    History { codice_fiscale: String },

    /// Show a patient's score trend
    Stats { codice_fiscale: String },

    /// Show a physician's patients and the critical ones
    Overview { doctor: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    let config = Config::load(&config_path)?;
    let model = config.scoring_model()?;
    let extractor = AcousticExtractor::new(config.extraction.clone());

    match args.command {
        Command::Analyze { files, json } => analyze_files(&files, &extractor, &model, json),
        Command::Register {
            codice_fiscale,
            first_name,
            last_name,
            age,
            sex,
            doctor,
        } => {
            let mut store = open_store(&config)?;
            let patient = register_patient(
                &mut store,
                NewPatient {
                    id: codice_fiscale,
                    first_name,
                    last_name,
                    age,
                    sex,
                    doctor,
                },
            )?;
            println!("Registered {} ({})", patient.full_name(), patient.codice_fiscale);
            Ok(())
        }
        Command::Visit { codice_fiscale, file } => {
            let mut store = open_store(&config)?;
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let outcome = process_visit(&mut store, &extractor, &model, &codice_fiscale, &bytes)?;
            print_analysis(&file, &outcome.analysis());
            println!("Recorded at {}", outcome.record.timestamp.to_rfc3339());
            if outcome.baseline_set {
                println!("Baseline set to {}", outcome.record.score);
            }
            Ok(())
        }
        Command::Note {
            codice_fiscale,
            timestamp,
            note,
            doctor,
        } => {
            let mut store = open_store(&config)?;
            add_note(&mut store, &doctor, &codice_fiscale, timestamp, &note)?;
            println!("Note saved");
            Ok(())
        }
        Command::History { codice_fiscale } => {
            let store = open_store(&config)?;
            let id = PatientId::parse(&codice_fiscale)?;
            let (patient, measurements) =
                history(&store, &id)?.with_context(|| format!("Patient {} not found", id))?;

            println!("{} ({}), {} years, {:?}", patient.full_name(), id, patient.age, patient.sex);
            match patient.baseline_score {
                Some(baseline) => println!("Baseline: {:.2}", baseline),
                None => println!("Baseline: not set"),
            }
            for m in measurements {
                println!(
                    "{}  {:>6}  {}",
                    m.timestamp.to_rfc3339(),
                    m.score.to_string(),
                    m.note.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
        Command::Stats { codice_fiscale } => {
            let store = open_store(&config)?;
            let id = PatientId::parse(&codice_fiscale)?;
            let (_, mut measurements) =
                history(&store, &id)?.with_context(|| format!("Patient {} not found", id))?;
            measurements.reverse();

            let stats = patient_stats(&measurements);
            println!("Measurements: {}", stats.count);
            if let (Some(first), Some(last), Some(change), Some(trend)) =
                (stats.first, stats.last, stats.change, stats.trend)
            {
                println!("First: {:.2}", first);
                println!("Last: {:.2}", last);
                println!("Change: {:+.2} ({})", change, trend);
            }
            Ok(())
        }
        Command::Overview { doctor } => {
            let store = open_store(&config)?;
            let overview = doctor_overview(&store, &doctor, &config.critical)?;
            println!("Patients: {}", overview.patient_count);
            for patient in patients_for_doctor(&store, &doctor)? {
                println!("  {}  {}", patient.codice_fiscale, patient.full_name());
            }
            match overview.mean_trend {
                Some(trend) => println!("Mean trend: {:+.2}", trend),
                None => println!("Mean trend: n/a"),
            }
            if overview.critical.is_empty() {
                println!("No critical patients");
            } else {
                println!("Critical patients:");
                for c in &overview.critical {
                    println!(
                        "  {}  {}  last {:.2}  change {:+.2}",
                        c.patient.codice_fiscale,
                        c.patient.full_name(),
                        c.last,
                        c.change
                    );
                }
            }
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<JsonStore> {
    let path = config.get_store_path()?;
    JsonStore::load_from_path(&path).with_context(|| format!("Failed to open store {:?}", path))
}

/// Analyze every file on its own thread and print the results in argument order
fn analyze_files(files: &[PathBuf], extractor: &AcousticExtractor, model: &ScoringModel, json: bool) -> Result<()> {
    info!("Analyzing {} recordings", files.len());

    let results: Vec<Result<Analysis>> = std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| scope.spawn(move || analyze_file(file, extractor, model)))
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("Analysis thread panicked")),
            })
            .collect()
    });

    let mut failures = 0;
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(analysis) if json => {
                let line = serde_json::json!({ "file": file, "analysis": analysis });
                println!("{}", line);
            }
            Ok(analysis) => print_analysis(file, &analysis),
            Err(e) => {
                error!("{:?}: {:#}", file, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} recordings could not be analyzed", failures, files.len());
    }
    Ok(())
}

fn analyze_file(file: &Path, extractor: &AcousticExtractor, model: &ScoringModel) -> Result<Analysis> {
    let sample = VoiceSample::from_wav_file(file).with_context(|| format!("Failed to decode {:?}", file))?;
    let analysis = analyze(&sample, extractor, model)?;
    Ok(analysis)
}

fn print_analysis(file: &Path, analysis: &Analysis) {
    println!("{}", file.display());
    for feature in Feature::ALL {
        println!("  {:<14} {:.6}", feature.name(), analysis.features.get(feature));
    }
    println!("  {:<14} {}", "score", analysis.score);
}
