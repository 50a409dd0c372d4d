//! asset-namer command-line entry point
//!
//! ```bash
//! # Preview names for a folder using the default template
//! asset-namer ~/Footage
//!
//! # Use a named template and rename for real (originals copied to backup/)
//! asset-namer ~/Footage --pattern documentary --project Alps --apply
//!
//! # One-off template, JSON output
//! asset-namer ~/Footage --template "{location}_{date}_{sequence}" --json
//! ```
//!
//! The API key is read from `OPENAI_API_KEY` (a `.env` file is honored).
//! Without one, names are built from the existing filenames.

use asset_namer::ai::MediaAnalyzer;
use asset_namer::config::{NamerConfig, DEFAULT_PATTERN};
use asset_namer::models::{ApplyResult, BatchResult};
use asset_namer::processing::ProgressSink;
use asset_namer::{init_tracing, AssetNamer, TemplateChoice};
use clap::Parser;
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "asset-namer", version, about = "Rename images and videos from their content")]
struct Cli {
    /// Directory containing the media files
    dir: PathBuf,

    /// Named template from the config
    #[arg(short, long, default_value = DEFAULT_PATTERN, conflicts_with = "template")]
    pattern: String,

    /// Literal template, e.g. "{date}_{description}_{sequence}"
    #[arg(short, long)]
    template: Option<String>,

    /// Store --template in the config under this name
    #[arg(long, requires = "template", value_name = "NAME")]
    save_as: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Value for {project}
    #[arg(long)]
    project: Option<String>,

    /// Rename files instead of only printing suggestions
    #[arg(long)]
    apply: bool,

    /// Skip backup copies when applying
    #[arg(long)]
    no_backup: bool,

    /// Do not call the vision API
    #[arg(long)]
    offline: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

/// Single-line progress on stderr
fn stderr_progress(label: &'static str) -> impl ProgressSink {
    move |current: usize, total: usize| {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r{} {}/{}", label, current, total);
        if current == total {
            let _ = writeln!(err);
        }
    }
}

fn print_suggestions(batch: &BatchResult) {
    for suggestion in &batch.suggestions {
        let marker = if suggestion.analysis.analyzed { "" } else { "  (fallback)" };
        if suggestion.is_noop() {
            println!("{}  (unchanged){}", suggestion.original_name, marker);
        } else {
            println!("{} -> {}{}", suggestion.original_name, suggestion.new_name, marker);
        }
    }
    for failure in &batch.failures {
        println!("! {}: {}", failure.path.display(), failure.error);
    }
    println!(
        "{} suggested, {} failed, {} from filename only",
        batch.succeeded,
        batch.failed,
        batch.degraded_count()
    );
}

fn print_applied(applied: &ApplyResult) {
    for failure in &applied.failures {
        println!("! {}: {}", failure.path.display(), failure.error);
    }
    println!(
        "{} renamed, {} failed, {} unchanged",
        applied.renamed_count, applied.failed_count, applied.skipped_count
    );
    if let Some(dir) = &applied.backup_dir {
        println!("Originals backed up to {}", dir.display());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }
    init_tracing();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => NamerConfig::default_path()?,
    };
    let mut config = NamerConfig::load(&config_path)?;

    if let (Some(name), Some(template)) = (&cli.save_as, &cli.template) {
        config.add_naming_pattern(name, template, &config_path)?;
        tracing::info!(pattern = %name, path = %config_path.display(), "Saved naming pattern");
    }
    if let Some(project) = &cli.project {
        config.output.project = Some(project.clone());
    }

    let api_key = if cli.offline {
        None
    } else {
        std::env::var("OPENAI_API_KEY").ok()
    };
    let analyzer = MediaAnalyzer::from_settings(api_key.as_deref(), &config.ai_settings)?;

    let choice = match &cli.template {
        Some(template) => TemplateChoice::Custom(template.clone()),
        None => TemplateChoice::Named(cli.pattern.clone()),
    };

    let namer = AssetNamer::new(config, Arc::new(analyzer));

    let files = namer.scan(&cli.dir).await?;
    if files.is_empty() {
        eprintln!("No supported media files in {}", cli.dir.display());
        return Ok(());
    }

    let batch = namer
        .process(&files, &choice, Arc::new(stderr_progress("Analyzing")))
        .await?;

    let applied = if cli.apply {
        let backup = namer.config().processing.backup_originals && !cli.no_backup;
        Some(
            namer
                .apply_with_backup(&batch.suggestions, backup, &stderr_progress("Renaming"))
                .await,
        )
    } else {
        None
    };

    if cli.json {
        let output = serde_json::json!({
            "suggestions": batch,
            "applied": applied,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_suggestions(&batch);
        if let Some(applied) = &applied {
            print_applied(applied);
        }
    }

    Ok(())
}
