use anyhow::{Context, Result};
use askdocs::settings::{ApiArgs, CorpusArgs};
use askdocs::telemetry::init_tracing;
use askdocs::QueryEngine;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "askdocs",
    about = "Answer a question from the pre-embedded section corpus"
)]
struct AskCli {
    /// Question to answer using the section corpus.
    #[arg(long, alias = "query")]
    question: String,

    #[command(flatten)]
    api: ApiArgs,

    #[command(flatten)]
    corpus: CorpusArgs,

    /// Print the prompt sent to the completion model.
    #[arg(long, default_value_t = false)]
    show_prompt: bool,

    /// Only print the assembled prompt (skip completion call).
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = AskCli::parse();
    let engine = QueryEngine::from_args(&cli.api, &cli.corpus)?;

    if cli.dry_run {
        let prompt = engine
            .construct_prompt(&cli.question)
            .context("failed to assemble prompt")?;
        println!("--- Prompt ---\n{}\n", prompt.text);
        println!("dry-run enabled; skipping completion call.");
        return Ok(());
    }

    let answer = engine
        .answer(&cli.question)
        .context("failed to answer question")?;
    if cli.show_prompt {
        println!("--- Prompt ---\n{}\n", answer.prompt);
    }
    println!("\nQ: {}\nA: {}", cli.question, answer.text);
    Ok(())
}
