//! `tally ingest`: statements -> classified CSV.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::Path;

use tally_classify::{classify_table, CategoryClassifier, ClassifyMode};
use tally_core::{format_currency, write_classified, ClassifiedTransaction};
use tally_ingest::{ingest_dir, FileStatus, ScanError};

use crate::config::Config;
use crate::llm::{ChatGenerator, LlmConfig};

/// Nothing is written when the directory is missing or holds no transactions.
pub fn run_ingest(cfg: &Config, source_dir: &Path, output: &Path, mode: ClassifyMode) -> Result<()> {
    println!("Lendo arquivos da pasta: {}...", source_dir.display());

    let report = match ingest_dir(source_dir) {
        Ok(r) => r,
        Err(ScanError::MissingDir(dir)) => {
            log::warn!("statement directory {} not found", dir.display());
            println!("A pasta '{}' não foi encontrada.", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e).context("scanning statement directory"),
    };

    for f in &report.files {
        match f {
            FileStatus::Parsed { file, count } => {
                println!("Arquivo '{}' processado ({} transações).", file_name(file), count);
            }
            FileStatus::Failed { file, reason } => {
                println!("Erro ao processar o arquivo '{}': {}", file_name(file), reason);
            }
        }
    }
    println!("Total de transações importadas: {}", report.table.len());
    if report.failed_count() > 0 {
        println!("{} arquivo(s) ignorado(s) por erro.", report.failed_count());
    }

    if report.table.is_empty() {
        println!("Nenhuma transação foi processada.");
        return Ok(());
    }

    let mut classifier = build_classifier(cfg, mode)?;
    println!(
        "Classificando no modo {} (isso pode demorar um pouco)...",
        classifier.mode()
    );

    let outcome = classify_table(&report.table, &mut classifier, |p| {
        let prefix: String = p.description.chars().take(20).collect();
        print!("\rProcessando item {}/{}: {:<20}...", p.index, p.total, prefix);
        io::stdout().flush().ok();
    });

    println!("\n\n--- Classificação Finalizada ---");
    if outcome.failures > 0 {
        println!(
            "{} de {} transações não puderam ser classificadas.",
            outcome.failures,
            outcome.rows.len()
        );
    }
    print_head(&outcome.rows, &cfg.view.currency_symbol);

    write_classified(output, &outcome.rows)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "\nSucesso! {} linhas salvas em '{}'",
        outcome.rows.len(),
        output.display()
    );

    Ok(())
}

fn build_classifier(cfg: &Config, mode: ClassifyMode) -> Result<CategoryClassifier> {
    if !mode.needs_generator() {
        return Ok(CategoryClassifier::offline());
    }
    let llm = LlmConfig::from_section(&cfg.llm)?;
    log::info!("classifier: {:?} model {}", llm.provider, llm.model);
    let generator = ChatGenerator::new(llm)?;
    Ok(CategoryClassifier::new(mode, Box::new(generator)))
}

fn file_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.display().to_string())
}

fn print_head(rows: &[ClassifiedTransaction], currency: &str) {
    println!(
        "{:<10}  {:>14}  {:<32}  {:<12}  Categoria",
        "Data", "Valor", "Descrição", "ID"
    );
    for r in rows.iter().take(5) {
        let desc: String = r.description().chars().take(32).collect();
        println!(
            "{:<10}  {:>14}  {:<32}  {:<12}  {}",
            r.date().format("%Y-%m-%d").to_string(),
            format_currency(r.amount(), currency),
            desc,
            r.transaction.external_id,
            r.category
        );
    }
}
