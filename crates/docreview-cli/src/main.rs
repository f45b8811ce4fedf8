mod display;
mod interactive;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use docreview_core::ReviewConfig;
use docreview_store::{DocumentStore, DuckStore, InsertOutcome};
use docreview_viewer::{OpenDocument, PageRenderer, PdfiumRenderer, ViewerError};
use docreview_workflow::{Notice, ReviewEvent, ReviewState, ReviewWorkflow, Step};

#[derive(Parser)]
#[command(name = "docreview", version, about = "Human review of AI-extracted document fields")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true, env = "DOCREVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// DuckDB database file (overrides the config).
    #[arg(long, global = true, env = "DOCREVIEW_DB")]
    db: Option<PathBuf>,

    /// Directory holding the source PDFs (overrides the config).
    #[arg(long, global = true, env = "DOCREVIEW_STAGE")]
    stage: Option<PathBuf>,

    /// Score threshold; scores at or below it need review.
    #[arg(long, global = true, env = "DOCREVIEW_THRESHOLD")]
    threshold: Option<f64>,

    /// Directory to look for the pdfium shared library in.
    #[arg(long, global = true, env = "DOCREVIEW_PDFIUM_DIR", default_value = "./")]
    pdfium_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the source and verification tables if missing.
    Init,
    /// Replace the source table with a Parquet or CSV file.
    Import {
        /// Path to a .parquet or .csv file.
        file: PathBuf,
    },
    /// Totals and per-field counts of documents needing review.
    Summary(JsonFlag),
    /// Documents needing review.
    List(JsonFlag),
    /// Field card for one document.
    Show {
        file: String,
    },
    /// Render one page of a document to PNG.
    Render {
        file: String,
        /// Page number (1-based).
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Render scale factor (defaults to the config).
        #[arg(long)]
        scale: Option<f32>,
        /// Output PNG path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Approve flagged fields and record the verification.
    Approve {
        file: String,
        /// Flagged field to approve (repeatable).
        #[arg(long = "field", required_unless_present = "all", conflicts_with = "all")]
        fields: Vec<String>,
        /// Approve every flagged field.
        #[arg(long)]
        all: bool,
    },
    /// Interactive review session.
    Review,
}

#[derive(Args)]
struct JsonFlag {
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// pdfium when the library can be bound; otherwise every open fails and
/// reviews proceed without a page viewer.
enum Renderer {
    Pdfium(PdfiumRenderer),
    Unavailable(String),
}

impl Renderer {
    fn bind(dir: &Path) -> Self {
        match PdfiumRenderer::bind(dir) {
            Ok(r) => Renderer::Pdfium(r),
            Err(e) => {
                tracing::warn!(error = %e, "pdfium unavailable, pages will not render");
                Renderer::Unavailable(e.to_string())
            }
        }
    }
}

impl PageRenderer for Renderer {
    fn open<'a>(&'a self, bytes: Vec<u8>) -> Result<Box<dyn OpenDocument + 'a>, ViewerError> {
        match self {
            Renderer::Pdfium(r) => r.open(bytes),
            Renderer::Unavailable(reason) => Err(ViewerError::Library(reason.clone())),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(
        database = ?config.database,
        stage = %config.stage_dir.display(),
        threshold = config.threshold,
        fields = config.fields.len(),
        "config resolved"
    );

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Import { file } => cmd_import(&config, &file),
        Commands::Summary(JsonFlag { json }) => cmd_summary(&config, json),
        Commands::List(JsonFlag { json }) => cmd_list(&config, json),
        Commands::Show { file } => cmd_show(&config, &cli.pdfium_dir, file),
        Commands::Render {
            file,
            page,
            scale,
            out,
        } => cmd_render(&config, &cli.pdfium_dir, &file, page, scale, &out),
        Commands::Approve { file, fields, all } => cmd_approve(&config, file, fields, all),
        Commands::Review => cmd_review(&config, &cli.pdfium_dir),
    }
}

/// Flag > env (both via clap) > config file > defaults.
fn resolve_config(cli: &Cli) -> anyhow::Result<ReviewConfig> {
    let mut config = match &cli.config {
        Some(path) => ReviewConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReviewConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.database = Some(db.clone());
    }
    if let Some(stage) = &cli.stage {
        config.stage_dir = stage.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn open_store(config: &ReviewConfig) -> anyhow::Result<DuckStore> {
    let store = DuckStore::open(config).context("opening database")?;
    if !store.has_tables().context("reading the table catalog")? {
        bail!(
            "tables {} / {} not found; run `docreview init` or `docreview import <file>` first",
            config.source_table,
            config.verify_table
        );
    }
    Ok(store)
}

fn cmd_init(config: &ReviewConfig) -> anyhow::Result<()> {
    let store = DuckStore::open(config).context("opening database")?;
    store.ensure_schema()?;
    println!(
        "Ready: {} and {} with {} field(s).",
        config.source_table,
        config.verify_table,
        config.fields.len()
    );
    Ok(())
}

fn cmd_import(config: &ReviewConfig, file: &Path) -> anyhow::Result<()> {
    let store = DuckStore::open(config).context("opening database")?;
    store.ensure_schema()?;
    let count = store
        .import_source(file)
        .with_context(|| format!("importing {}", file.display()))?;
    println!("Imported {count} document(s) into {}.", config.source_table);
    Ok(())
}

fn cmd_summary(config: &ReviewConfig, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let renderer = Renderer::Unavailable("not needed".into());
    let dash = ReviewWorkflow::new(&store, &renderer, config).dashboard()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dash)?);
    } else {
        display::print_dashboard(&dash, config.threshold);
        display::print_worklist(&dash.worklist);
    }
    Ok(())
}

fn cmd_list(config: &ReviewConfig, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let renderer = Renderer::Unavailable("not needed".into());
    let worklist = ReviewWorkflow::new(&store, &renderer, config).worklist()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&worklist)?);
    } else {
        display::print_worklist(&worklist);
    }
    Ok(())
}

fn cmd_show(config: &ReviewConfig, pdfium_dir: &Path, file: String) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let renderer = Renderer::bind(pdfium_dir);
    let workflow = ReviewWorkflow::new(&store, &renderer, config);
    let step = workflow.apply(ReviewState::Idle, ReviewEvent::Select(file));
    step.result?;
    if let Some(review) = step.state.loaded() {
        display::print_review_card(review);
    }
    Ok(())
}

fn cmd_render(
    config: &ReviewConfig,
    pdfium_dir: &Path,
    file: &str,
    page: usize,
    scale: Option<f32>,
    out: &Path,
) -> anyhow::Result<()> {
    let Some(index) = page.checked_sub(1) else {
        bail!("pages are numbered from 1");
    };
    let store = open_store(config)?;
    let renderer = PdfiumRenderer::bind(pdfium_dir)?;
    let bytes = store.fetch_document_blob(file)?;
    let document = renderer.open(bytes)?;
    let image = document.render_page(index, scale.unwrap_or(config.render_scale))?;
    image.save_png(out)?;
    println!(
        "Wrote {} ({}x{}, {}).",
        out.display(),
        image.width(),
        image.height(),
        docreview_viewer::page_label(index, document.page_count())
    );
    Ok(())
}

fn cmd_approve(
    config: &ReviewConfig,
    file: String,
    fields: Vec<String>,
    all: bool,
) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let renderer = Renderer::Unavailable("not needed".into());
    let workflow = ReviewWorkflow::new(&store, &renderer, config);

    let step = approve_and_submit(&workflow, file, fields, all);
    match step.result {
        Ok(Notice::Committed { file_name, outcome }) => match outcome {
            InsertOutcome::Inserted => println!("Verified {file_name}."),
            InsertOutcome::AlreadyVerified => println!("{file_name} was already verified."),
        },
        Ok(_) => {}
        Err(e) => {
            if let Some(review) = step.state.loaded() {
                display::print_review_card(review);
            }
            return Err(e.into());
        }
    }
    Ok(())
}

/// Select `file`, tick each requested check once, then submit. Stops at the
/// first rejected event.
fn approve_and_submit<'r, S, R>(
    workflow: &ReviewWorkflow<'r, S, R>,
    file: String,
    fields: Vec<String>,
    all: bool,
) -> Step<'r>
where
    S: DocumentStore + ?Sized,
    R: PageRenderer + ?Sized,
{
    let step = workflow.apply(ReviewState::Idle, ReviewEvent::Select(file));
    if step.result.is_err() {
        return step;
    }
    let mut state = step.state;

    let targets: Vec<String> = match (all, state.loaded()) {
        (true, Some(review)) => review.approvals().iter().map(|a| a.field.clone()).collect(),
        _ => fields,
    };
    for field in targets {
        if state.loaded().is_some_and(|r| r.is_approved(&field)) {
            continue;
        }
        let step = workflow.apply(state, ReviewEvent::ToggleApproval(field));
        if step.result.is_err() {
            return step;
        }
        state = step.state;
    }

    workflow.apply(state, ReviewEvent::Submit)
}

fn cmd_review(config: &ReviewConfig, pdfium_dir: &Path) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let renderer = Renderer::bind(pdfium_dir);
    let workflow = ReviewWorkflow::new(&store, &renderer, config);
    interactive::run(&workflow, config.render_scale, std::io::stdin().lock())
}
