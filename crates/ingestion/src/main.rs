//! QuizForge Ingestion CLI
//!
//! Runs the extraction pipeline outside the gateway:
//! - `ingestion process <pdf> [title]` registers the textbook and stores results
//! - `ingestion extract <pdf>` runs the pipeline in memory and prints the questions
//! - `ingestion outline <pdf>` prints the recovered outline as JSON

use anyhow::Context;
use clap::{Parser, Subcommand};
use quizforge_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    telemetry::init_tracing,
    VERSION,
};
use quizforge_ingestion::{
    bound_outline, recover_outline, textbook_record, IngestionError, LopdfSource, MemoryStore,
    OutlineEntry, PageSource, Pipeline,
};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ingestion", version, about = "Extract study questions from PDF textbooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a textbook and store its outline and questions
    Process {
        /// PDF file, absolute or relative to the library directory
        pdf: PathBuf,
        /// Display title (defaults to the file stem)
        title: Option<String>,
    },
    /// Run the pipeline in memory and print every question
    Extract {
        /// PDF file, absolute or relative to the library directory
        pdf: PathBuf,
    },
    /// Print the recovered outline as JSON
    Outline {
        /// PDF file, absolute or relative to the library directory
        pdf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting QuizForge Ingestion v{}", VERSION);

    match cli.command {
        Commands::Process { pdf, title } => {
            let path = config.ingestion.resolve_path(&pdf);

            info!("Connecting to database...");
            let db = DbPool::new(&config.database).await?;
            let repository = Repository::new(db);

            let textbook = repository
                .create_textbook(textbook_record(&path, title)?)
                .await?;
            info!(textbook_id = %textbook.id, title = %textbook.title, "Textbook registered");

            let pipeline = Pipeline::from_config(repository, &config.ingestion);
            let report = pipeline
                .process_file(textbook.id, &path)
                .await
                .with_context(|| format!("processing {} failed", path.display()))?;

            println!("Textbook {} processed", textbook.id);
            println!("  Pages: {}", report.page_count);
            println!("  Outline entries: {}", report.outline.len());
            println!("  Questions saved: {}", report.questions_saved());
            println!("  Page failures: {}", report.page_failures());
        }
        Commands::Extract { pdf } => {
            let path = config.ingestion.resolve_path(&pdf);

            let store = MemoryStore::new();
            let textbook_id = Uuid::new_v4();
            store.register(textbook_id);

            let pipeline = Pipeline::from_config(store.clone(), &config.ingestion);
            let report = pipeline.process_file(textbook_id, &path).await?;

            let stored = store.get(textbook_id).unwrap_or_default();
            for question in &stored.questions {
                println!("[p.{}] ({}) {}", question.page_number, question.kind, question.text);
            }
            println!(
                "{} questions on {} pages, {} outline entries",
                report.questions_saved(),
                report.page_count,
                report.outline.len()
            );
        }
        Commands::Outline { pdf } => {
            let path = config.ingestion.resolve_path(&pdf);
            let outline = outline_of(&path).await?;
            println!("{}", serde_json::to_string_pretty(&outline)?);
        }
    }

    Ok(())
}

async fn outline_of(path: &Path) -> Result<Vec<OutlineEntry>, IngestionError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let source = LopdfSource::open(&path)?;
        let page_count = source.page_count()?;

        let mut outline = recover_outline(&source, page_count);
        bound_outline(&mut outline, page_count);
        Ok(outline)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_process_takes_optional_title() {
        let cli = Cli::try_parse_from(["ingestion", "process", "physics.pdf", "Physics I"]).unwrap();
        match cli.command {
            Commands::Process { pdf, title } => {
                assert_eq!(pdf, PathBuf::from("physics.pdf"));
                assert_eq!(title.as_deref(), Some("Physics I"));
            }
            _ => panic!("expected process"),
        }

        let cli = Cli::try_parse_from(["ingestion", "process", "physics.pdf"]).unwrap();
        assert!(matches!(cli.command, Commands::Process { title: None, .. }));
    }

    #[test]
    fn test_commands_require_a_pdf() {
        for command in ["process", "extract", "outline"] {
            let err = Cli::try_parse_from(["ingestion", command]).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        let err = Cli::try_parse_from(["ingestion", "index", "a.pdf"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_outline_and_extract_parse() {
        let cli = Cli::try_parse_from(["ingestion", "outline", "/srv/books/bio.pdf"]).unwrap();
        assert!(matches!(cli.command, Commands::Outline { .. }));

        let cli = Cli::try_parse_from(["ingestion", "extract", "bio.pdf"]).unwrap();
        assert!(matches!(cli.command, Commands::Extract { .. }));
    }
}
