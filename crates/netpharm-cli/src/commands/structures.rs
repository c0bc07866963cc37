//! `netpharm structures` command implementation
//!
//! Downloads AlphaFold models for a gene list, usually the hub genes of a
//! finished run, ahead of docking. Each gene is resolved to its reviewed
//! UniProt accession first. A gene that fails is logged and skipped, and
//! `fetch_log.csv` records the outcome of every gene.

use crate::error::Result;
use crate::progress;
use crate::stages::network;
use crate::stages::targets::GENE_ALIASES;
use crate::stages::{clean_header, delimiter_for, write_csv, DATA_DIR};
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use netpharm_common::{GeneSymbol, NetpharmError};
use netpharm_ingest::alphafold::{self, AlphaFoldClient};
use netpharm_ingest::endpoints::alphafold_model_file;
use netpharm_ingest::http::{DEFAULT_TIMEOUT_SECS, RetryPolicy, ServiceClient};
use netpharm_ingest::StructureSource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const FETCH_LOG: &str = "fetch_log.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "data/alphafold_pdbs";
const RUN_OUTPUT_DIR: &str = "alphafold_pdbs";

/// Gene columns accepted in a gene table, on top of the target export aliases
const TABLE_GENE_COLUMNS: &[&str] = &["gene", "Protein"];
const DEGREE_COLUMNS: &[&str] = &["degree", "Degree"];

/// Outcome for one gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Downloaded,
    /// The model file was already in the output directory
    AlreadyPresent,
    NoAccession,
    NoModel,
    Failed,
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchStatus::Downloaded => "downloaded",
            FetchStatus::AlreadyPresent => "already present",
            FetchStatus::NoAccession => "no UniProt entry",
            FetchStatus::NoModel => "no AlphaFold model",
            FetchStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One row of the fetch log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecord {
    pub gene: GeneSymbol,
    pub uniprot: Option<String>,
    pub file: Option<String>,
    pub status: FetchStatus,
}

/// Where the genes come from
#[derive(Debug, Clone, Default)]
pub struct GeneSelection {
    pub genes: Vec<String>,
    /// One symbol per line, or a CSV/TSV table with a gene column
    pub file: Option<PathBuf>,
    /// Run directory whose hub genes are added
    pub hubs_of: Option<PathBuf>,
    /// Keep only the first N genes of the file
    pub top: Option<usize>,
}

/// Arguments of `netpharm structures`
#[derive(Debug, Clone)]
pub struct StructuresArgs {
    pub selection: GeneSelection,
    pub output: Option<PathBuf>,
    pub uniprot_url: String,
    pub alphafold_url: String,
    /// Pause between genes
    pub delay: Duration,
}

// ============================================================================
// Gene Lists
// ============================================================================

/// Read genes from a plain list or a table.
///
/// A `.csv`/`.tsv` file is read as a table. When it also has a degree column
/// (a `network_metrics.csv`) and `top` is set, rows are ranked by degree
/// before the cut.
pub fn read_gene_file(path: &Path, top: Option<usize>) -> Result<Vec<GeneSymbol>> {
    let content = std::fs::read_to_string(path)?;
    let is_table = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv") || e.eq_ignore_ascii_case("tsv"));

    let mut genes = if is_table {
        read_gene_table(&content, path, top.is_some())?
    } else {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| GeneSymbol::new(line).ok())
            .collect()
    };

    if let Some(n) = top {
        genes.truncate(n);
    }
    Ok(genes)
}

fn read_gene_table(content: &str, path: &Path, rank_by_degree: bool) -> Result<Vec<GeneSymbol>> {
    let header = content.lines().next().unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(header))
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| clean_header(h) == *name))
    };
    let gene_idx = column(TABLE_GENE_COLUMNS)
        .or_else(|| column(GENE_ALIASES))
        .ok_or_else(|| {
            NetpharmError::data_format(path.display().to_string(), "no gene column (gene, gene_name, Protein)")
        })?;
    let degree_idx = column(DEGREE_COLUMNS);

    let mut rows: Vec<(GeneSymbol, usize)> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(Ok(gene)) = record.get(gene_idx).map(GeneSymbol::new) else {
            continue;
        };
        let degree = degree_idx
            .and_then(|i| record.get(i))
            .and_then(|cell| cell.trim().parse::<usize>().ok())
            .unwrap_or(0);
        rows.push((gene, degree));
    }

    if rank_by_degree && degree_idx.is_some() {
        // stable, so ties keep file order
        rows.sort_by(|a, b| b.1.cmp(&a.1));
    }
    Ok(rows.into_iter().map(|(gene, _)| gene).collect())
}

/// Command-line genes, then the file, then run hubs, without repeats
pub fn collect_genes(selection: &GeneSelection) -> Result<Vec<GeneSymbol>> {
    let mut all = Vec::new();
    for raw in &selection.genes {
        all.push(GeneSymbol::new(raw)?);
    }
    if let Some(file) = &selection.file {
        all.extend(read_gene_file(file, selection.top)?);
    }
    if let Some(run_dir) = &selection.hubs_of {
        let network = network::load(run_dir)?;
        all.extend(network.hubs().map(|node| node.gene.clone()));
    }

    let mut seen = HashSet::new();
    all.retain(|gene| seen.insert(gene.clone()));
    if all.is_empty() {
        return Err(NetpharmError::invalid_input("no genes to fetch; pass --genes, --file or --hubs").into());
    }
    Ok(all)
}

// ============================================================================
// Fetching
// ============================================================================

async fn fetch_one(source: &dyn StructureSource, gene: &GeneSymbol, output: &Path) -> Result<FetchRecord> {
    let mut record = FetchRecord {
        gene: gene.clone(),
        uniprot: None,
        file: None,
        status: FetchStatus::Failed,
    };

    let accession = match source.accession(gene).await {
        Ok(accession) => accession,
        Err(NetpharmError::NotFound(message)) => {
            warn!(gene = %gene, %message, "No reviewed UniProt entry");
            record.status = FetchStatus::NoAccession;
            return Ok(record);
        },
        Err(e) => {
            warn!(gene = %gene, error = %e, "UniProt lookup failed");
            return Ok(record);
        },
    };

    let file_name = alphafold_model_file(&accession);
    let path = output.join(&file_name);
    record.uniprot = Some(accession.clone());

    if path.exists() {
        info!(gene = %gene, file = %file_name, "Model already downloaded");
        record.file = Some(file_name);
        record.status = FetchStatus::AlreadyPresent;
        return Ok(record);
    }

    match source.model(&accession).await {
        Ok(model) => {
            std::fs::write(&path, model)?;
            info!(gene = %gene, accession = %accession, file = %file_name, "Model saved");
            record.file = Some(file_name);
            record.status = FetchStatus::Downloaded;
        },
        Err(NetpharmError::NotFound(_)) => {
            warn!(gene = %gene, accession = %accession, "AlphaFold DB has no model");
            record.status = FetchStatus::NoModel;
        },
        Err(e) => warn!(gene = %gene, accession = %accession, error = %e, "Model download failed"),
    }
    Ok(record)
}

/// Fetch a model for every gene into `output` and write the fetch log
pub async fn fetch_structures(
    source: &dyn StructureSource,
    genes: &[GeneSymbol],
    output: &Path,
    delay: Duration,
) -> Result<Vec<FetchRecord>> {
    std::fs::create_dir_all(output)?;

    let pb = progress::create_progress_bar(genes.len() as u64, "Fetching AlphaFold models");
    let mut records = Vec::with_capacity(genes.len());
    for (i, gene) in genes.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        pb.set_message(format!("Fetching {}", gene));
        records.push(fetch_one(source, gene, output).await?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    write_csv(&output.join(FETCH_LOG), &records)?;
    Ok(records)
}

fn default_output(selection: &GeneSelection) -> PathBuf {
    match &selection.hubs_of {
        Some(run_dir) => run_dir.join(DATA_DIR).join(RUN_OUTPUT_DIR),
        None => PathBuf::from(DEFAULT_OUTPUT_DIR),
    }
}

/// Run the structure download
pub async fn run(args: StructuresArgs) -> Result<()> {
    let genes = collect_genes(&args.selection)?;
    let output = args.output.clone().unwrap_or_else(|| default_output(&args.selection));

    let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
    let uniprot = ServiceClient::new(alphafold::UNIPROT_SERVICE, timeout, RetryPolicy::default())?;
    let models = ServiceClient::new(alphafold::SERVICE, timeout, RetryPolicy::default())?;
    let source = AlphaFoldClient::new(uniprot, &args.uniprot_url, models, &args.alphafold_url);

    println!("{} Fetching models for {} genes into {}", "→".cyan(), genes.len(), output.display());
    let records = fetch_structures(&source, &genes, &output, args.delay).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(vec!["Gene", "UniProt", "File", "Status"]);
    for record in &records {
        table.add_row(vec![
            record.gene.to_string(),
            record.uniprot.clone().unwrap_or_else(|| "-".to_string()),
            record.file.clone().unwrap_or_else(|| "-".to_string()),
            record.status.to_string(),
        ]);
    }
    println!("{}", table);

    let saved = records
        .iter()
        .filter(|r| matches!(r.status, FetchStatus::Downloaded | FetchStatus::AlreadyPresent))
        .count();
    let mark = if saved == records.len() { "✓".green() } else { "!".yellow() };
    println!(
        "{} {} of {} models available. Log: {}",
        mark,
        saved,
        records.len(),
        output.join(FETCH_LOG).display()
    );
    Ok(())
}
