use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::{
    decode_container, encode_container, AnnotatedDocument, ImportReport, SavedAnnotations,
    ViewerSettings,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use storage::{load_settings_file, Storage, StorageError};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "Inspect, flatten and build annotated PDF containers")]
pub struct Cli {
    /// Viewer settings file (defaults to the per-user settings).
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a machine-readable summary of a container.
    Inspect {
        #[arg(value_name = "CONTAINER")]
        file: PathBuf,
    },
    /// Write a PDF with every annotation drawn into its page.
    Flatten {
        #[arg(value_name = "CONTAINER")]
        file: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Combine a PDF and a JSON annotation record block into a container.
    Pack {
        #[arg(value_name = "PDF")]
        pdf: PathBuf,
        #[arg(value_name = "RECORDS_JSON")]
        records: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Split a container into its PDF and its JSON record block.
    Unpack {
        #[arg(value_name = "CONTAINER")]
        file: PathBuf,
        #[arg(long)]
        pdf: Option<PathBuf>,
        #[arg(long)]
        records: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

// Fields stay alphabetical so the JSON contract reads the same in snapshots.
#[derive(Debug, Serialize)]
struct InspectOutput {
    annotations: usize,
    comment_links: usize,
    notations: usize,
    page_count: u32,
    pages: Vec<PageSummary>,
    skipped: usize,
}

#[derive(Debug, Serialize)]
struct PageSummary {
    comments: usize,
    highlights: usize,
    page: u32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Inspect { file } => run_inspect(&file, cli.settings.as_deref()),
        Commands::Flatten { file, output } => {
            run_flatten(&file, output.as_deref(), cli.settings.as_deref())
        }
        Commands::Pack { pdf, records, output } => {
            run_pack(&pdf, &records, output.as_deref(), cli.settings.as_deref())
        }
        Commands::Unpack { file, pdf, records } => {
            run_unpack(&file, pdf.as_deref(), records.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_inspect(file: &Path, settings: Option<&Path>) -> Result<()> {
    let bytes = read_input(file)?;
    let saved =
        decode_container(&bytes).context("failed to read annotation container")?.annotations;
    let (document, report) = open_container(&bytes, settings)?;

    let pages = document
        .pages()
        .filter(|page| !page.is_empty())
        .map(|page| PageSummary {
            comments: page.comments().count(),
            highlights: page.len() - page.comments().count(),
            page: page.page_index(),
        })
        .collect();

    let payload = InspectOutput {
        annotations: saved.annotations.len(),
        comment_links: saved.comments.len(),
        notations: saved.notations.len(),
        page_count: document.page_count()?,
        pages,
        skipped: report.skipped(),
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_flatten(file: &Path, output: Option<&Path>, settings: Option<&Path>) -> Result<()> {
    let bytes = read_input(file)?;
    let (document, _) = open_container(&bytes, settings)?;

    let flattened = document.export_flattened().context("failed to flatten annotations")?;
    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| sibling(file, "-annotated", "pdf"));
    write_output(&output, &flattened)?;

    println!("{}", output.display());
    Ok(())
}

fn run_pack(
    pdf: &Path,
    records: &Path,
    output: Option<&Path>,
    settings: Option<&Path>,
) -> Result<()> {
    let document = read_input(pdf)?;
    let records_json = read_input(records)?;
    let saved: SavedAnnotations =
        serde_json::from_slice(&records_json).context("failed to parse annotation records")?;

    let container = encode_container(&saved, &document).context("failed to encode container")?;
    let (_, report) = open_container(&container, settings)?;
    if report.skipped() > 0 {
        tracing::warn!(skipped = report.skipped(), "some records will not load");
    }

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| sibling(pdf, "", "annot"));
    write_output(&output, &container)?;

    println!("{}", output.display());
    Ok(())
}

fn run_unpack(file: &Path, pdf: Option<&Path>, records: Option<&Path>) -> Result<()> {
    let bytes = read_input(file)?;
    let container = decode_container(&bytes).context("failed to read annotation container")?;

    let pdf = pdf.map(ToOwned::to_owned).unwrap_or_else(|| sibling(file, "-original", "pdf"));
    let records = records
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| sibling(file, "-annotations", "json"));

    write_output(&pdf, container.document)?;
    write_output(&records, &serde_json::to_vec_pretty(&container.annotations)?)?;

    println!("{}", pdf.display());
    println!("{}", records.display());
    Ok(())
}

fn open_container(
    bytes: &[u8],
    settings: Option<&Path>,
) -> Result<(AnnotatedDocument, ImportReport)> {
    let settings = resolve_settings(settings)?;
    let mut document =
        AnnotatedDocument::with_default_engine(settings).context("invalid viewer settings")?;
    let report = document.load_container(bytes).context("failed to open annotated PDF")?;
    Ok((document, report))
}

fn resolve_settings(path: Option<&Path>) -> Result<ViewerSettings> {
    if let Some(path) = path {
        return load_settings_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()));
    }

    match Storage::from_default_project() {
        Ok(store) => store.load_settings().context("failed to load stored settings"),
        Err(StorageError::NoConfigDirectory) => Ok(ViewerSettings::default()),
        Err(err) => Err(err.into()),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn sibling(file: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}{suffix}.{extension}"))
}
