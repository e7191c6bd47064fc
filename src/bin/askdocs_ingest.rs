use std::path::PathBuf;

use anyhow::{Context, Result};
use askdocs::corpus::{write_embeddings, write_sections};
use askdocs::ingest::{count_section_tokens, embed_sections, prepare_sections, read_dataset};
use askdocs::settings::{ApiArgs, DEFAULT_TOKENIZER};
use askdocs::telemetry::init_tracing;
use askdocs::{OpenAiEmbedder, PretrainedTokenizer};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "askdocs-ingest",
    about = "Build the section and embedding tables from a raw dataset"
)]
struct IngestCli {
    /// Dataset JSON with a top-level `data` array of title/heading/content rows.
    #[arg(long, env = "ASKDOCS_DATASET", default_value = "data.json")]
    dataset: PathBuf,

    /// Output path for the section table.
    #[arg(long, default_value = "sections.csv")]
    sections_out: PathBuf,

    /// Output path for the embedding table; embeddings are skipped when omitted.
    #[arg(long)]
    embeddings_out: Option<PathBuf>,

    /// Path to a tokenizer.json, or a pretrained tokenizer identifier.
    #[arg(long, env = "ASKDOCS_TOKENIZER", default_value = DEFAULT_TOKENIZER)]
    tokenizer: String,

    /// Number of sections per embeddings request.
    #[arg(long, env = "ASKDOCS_OPENAI_BATCH", default_value_t = 16)]
    batch_size: usize,

    #[command(flatten)]
    api: ApiArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = IngestCli::parse();
    let tokenizer = PretrainedTokenizer::load(&cli.tokenizer)
        .with_context(|| format!("failed to load tokenizer '{}'", cli.tokenizer))?;

    let raw = read_dataset(&cli.dataset)
        .with_context(|| format!("failed to read dataset {:?}", cli.dataset))?;
    let counted = count_section_tokens(raw, &tokenizer)?;
    let sections = prepare_sections(counted);
    write_sections(&cli.sections_out, &sections)
        .with_context(|| format!("failed to write {:?}", cli.sections_out))?;
    tracing::info!(count = sections.len(), path = ?cli.sections_out, "wrote section table");

    let Some(embeddings_out) = &cli.embeddings_out else {
        return Ok(());
    };
    let settings = cli
        .api
        .api_settings()
        .context("remote service settings are incomplete")?;
    let embedder = OpenAiEmbedder::new(&settings, cli.api.model_family.clone(), cli.batch_size.max(1))?;
    let embedded = embed_sections(&sections, &embedder)?;
    write_embeddings(embeddings_out, embedded.iter().map(|(key, vector)| (key, vector)))
        .with_context(|| format!("failed to write {embeddings_out:?}"))?;
    tracing::info!(count = embedded.len(), path = ?embeddings_out, "wrote embedding table");
    Ok(())
}
