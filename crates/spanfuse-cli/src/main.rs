//! spanfuse CLI - Command-line interface
//!
//! Usage:
//!   spanfuse analyze <file>
//!   spanfuse validate <text> --label NAICS
//!   spanfuse train --dataset naics-psc --out ./naics_psc_model
//!   spanfuse codes psc
//!   spanfuse template <path>

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use spanfuse_core::{AppConfig, LoggingConfig};
use spanfuse_extractor::metrics::Evaluator;
use spanfuse_extractor::report::{EntityReport, ValidationSummary};
use spanfuse_extractor::validator::DEFAULT_PATTERNS;
use spanfuse_extractor::{
    CodeCatalog, CodeFormatValidator, GazetteerAnnotator, HybridPipeline, ModelMetadata,
    PatternMatcher, SpanMergeResolver, TrainingSet,
};

#[derive(Parser)]
#[command(name = "spanfuse")]
#[command(about = "Merge model and rule-based entity spans")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a text file ("-" for stdin) and report its entities
    Analyze {
        path: String,
        /// Model directory written by `train`
        #[arg(long)]
        model: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a code against its label's format
    Validate {
        text: String,
        #[arg(long)]
        label: String,
    },
    /// Build a dictionary model from training examples
    Train {
        /// "custom", "naics-psc", or a JSON file of examples
        #[arg(long, default_value = "custom")]
        dataset: String,
        /// Output model directory
        #[arg(long)]
        out: PathBuf,
    },
    /// List reference codes
    Codes {
        #[arg(value_enum)]
        system: Option<CodeSystem>,
    },
    /// Write an editable training data template
    Template { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum CodeSystem {
    Naics,
    Psc,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Analyze { path, model, json } => analyze(&config, &path, model.as_deref(), json),
        Commands::Validate { text, label } => {
            let validator = CodeFormatValidator::from_config(&config.validation)?;
            let valid = validator.validate(&text, &label);
            let catalog = CodeCatalog::builtin();
            match catalog.describe(&label, &text) {
                Some(description) => println!("{label} '{text}': {} ({description})", verdict(valid)),
                None => println!("{label} '{text}': {}", verdict(valid)),
            }
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Train { dataset, out } => train(&dataset, &out),
        Commands::Codes { system } => {
            let catalog = CodeCatalog::builtin();
            let tables = match system {
                Some(CodeSystem::Naics) => vec![("NAICS", &catalog.naics)],
                Some(CodeSystem::Psc) => vec![("PSC", &catalog.psc)],
                None => vec![("NAICS", &catalog.naics), ("PSC", &catalog.psc)],
            };
            for (name, table) in tables {
                println!("{name}:");
                for (code, description) in table {
                    println!("  {code}  {description}");
                }
            }
            Ok(())
        }
        Commands::Template { path } => {
            TrainingSet::write_template(&path)?;
            println!("Created {}", path.display());
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn verdict(valid: bool) -> &'static str {
    if valid {
        "valid"
    } else {
        "invalid"
    }
}

fn load_dataset(dataset: &str, catalog: &CodeCatalog) -> anyhow::Result<TrainingSet> {
    let set = match dataset {
        "custom" => TrainingSet::custom_entities()?,
        "naics-psc" => TrainingSet::naics_psc(catalog)?,
        path => TrainingSet::load_json(path)?,
    };
    Ok(set)
}

fn default_annotator(catalog: &CodeCatalog) -> anyhow::Result<GazetteerAnnotator> {
    let mut set = TrainingSet::custom_entities()?;
    set.extend(TrainingSet::naics_psc(catalog)?);
    Ok(GazetteerAnnotator::from_training(&set))
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
    }
}

fn analyze(config: &AppConfig, path: &str, model: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let text = read_input(path)?;

    let mut catalog = CodeCatalog::builtin();
    let annotator = match model {
        Some(dir) => {
            let (annotator, metadata) = GazetteerAnnotator::load(dir)?;
            if let Some(metadata) = metadata {
                tracing::info!("Loaded {} model from {}", metadata.model_type, dir.display());
                if !metadata.naics_codes.is_empty() || !metadata.psc_codes.is_empty() {
                    catalog.naics = metadata.naics_codes;
                    catalog.psc = metadata.psc_codes;
                }
            }
            annotator
        }
        None => default_annotator(&catalog)?,
    };

    let validator = CodeFormatValidator::from_config(&config.validation)?;
    let pipeline = HybridPipeline::new(
        Box::new(annotator),
        Box::new(PatternMatcher::products_and_events()),
    )
    .with_resolver(SpanMergeResolver::from_config(&config.merge));

    let result = pipeline.run(&text)?;
    let report = EntityReport::from_spans(&result.document, &result.spans, &config.report.custom_labels)
        .with_title(path);

    let coded: Vec<_> = result
        .spans
        .iter()
        .filter(|s| validator.has_pattern(&s.label))
        .cloned()
        .collect();
    let validation = ValidationSummary::build(&result.document, &coded, &validator, &catalog);

    if json {
        let value = serde_json::json!({
            "report": report,
            "validation": validation,
            "dropped": result.dropped.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let words = text.split_whitespace().count();
    let sentences = text.split('.').filter(|s| !s.trim().is_empty()).count();
    println!("Article statistics:");
    println!("   • Word count: {words}");
    println!("   • Sentence count: {sentences}");
    println!("   • Rule matches discarded: {}", result.dropped.len());
    println!();
    print!("{report}");

    if validation.total() > 0 {
        println!("\nDETECTED CODES:");
        print!("{validation}");
    }

    Ok(())
}

fn train(dataset: &str, out: &Path) -> anyhow::Result<()> {
    let catalog = CodeCatalog::builtin();
    let set = load_dataset(dataset, &catalog)?;
    println!(
        "Prepared {} training examples ({} entities, labels: {})",
        set.len(),
        set.entity_count(),
        set.labels().join(", ")
    );

    let annotator = GazetteerAnnotator::from_training(&set);
    let metrics = Evaluator::new().strict().evaluate_set(&annotator, &set)?;
    println!(
        "Training-set precision {:.3}, recall {:.3}, F1 {:.3}",
        metrics.precision(),
        metrics.recall(),
        metrics.f1_score()
    );

    let labels = set.labels();
    let mut metadata = ModelMetadata::new(model_type(dataset), labels.clone());
    if labels.iter().any(|l| catalog.table(l).is_some()) {
        metadata.naics_codes = catalog.naics.clone();
        metadata.psc_codes = catalog.psc.clone();
    }
    metadata.validation_patterns = DEFAULT_PATTERNS
        .iter()
        .filter(|(label, _, _)| labels.iter().any(|l| l == label))
        .map(|(label, _, description)| (label.to_string(), description.to_string()))
        .collect();

    annotator.save(out, &metadata)?;
    println!("Model saved to {}", out.display());
    Ok(())
}

fn model_type(dataset: &str) -> &'static str {
    match dataset {
        "naics-psc" => "NAICS_PSC_Recognition",
        "custom" => "Custom_Entity_Recognition",
        _ => "User_Entity_Recognition",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train() {
        let cli = Cli::parse_from(["spanfuse", "train", "--dataset", "naics-psc", "--out", "m"]);
        match cli.command {
            Commands::Train { dataset, out } => {
                assert_eq!(dataset, "naics-psc");
                assert_eq!(out, PathBuf::from("m"));
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_model_type() {
        assert_eq!(model_type("naics-psc"), "NAICS_PSC_Recognition");
        assert_eq!(model_type("mine.json"), "User_Entity_Recognition");
    }
}
