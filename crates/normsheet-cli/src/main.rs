//! Normsheet CLI - recalculate, inspect and edit workbook documents

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use normsheet::prelude::*;
use normsheet::{DEFAULT_COLS, DEFAULT_ROWS};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "normsheet")]
#[command(author, version, about = "Workbook recalculation tool")]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOptions {
    /// Function service endpoint; without it custom functions evaluate to #ERROR
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Bearer token for the function service
    #[arg(long, global = true)]
    token: Option<String>,

    /// Function service timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout: f64,

    /// JSON file with extra custom function definitions
    #[arg(long, global = true)]
    functions: Option<PathBuf>,

    /// Let error values propagate through references instead of reading as 0
    #[arg(long, global = true)]
    propagate_errors: bool,

    /// Grid rows
    #[arg(long, global = true, default_value_t = DEFAULT_ROWS)]
    rows: u32,

    /// Grid columns
    #[arg(long, global = true, default_value_t = DEFAULT_COLS)]
    cols: u16,
}

#[derive(Subcommand)]
enum Commands {
    /// Recalculate every sheet and write the document
    Recalc {
        /// Workbook document (JSON)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the computed value of a cell
    Get {
        input: PathBuf,
        instance: String,
        sheet: String,
        /// Cell address (e.g. "B5")
        cell: String,
    },

    /// Write a cell, recompute its dependents and write the document
    Set {
        input: PathBuf,
        instance: String,
        sheet: String,
        cell: String,
        /// Raw input: a literal or a formula starting with '='
        value: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a template into a sheet (or a new sheet) and write the document
    Template {
        input: PathBuf,
        instance: String,
        /// Template file (JSON)
        template: PathBuf,

        /// Sheet to replace; a new sheet is added when omitted
        #[arg(short, long)]
        sheet: Option<String>,

        /// Element data file: a JSON array of {key, type, value}
        #[arg(short, long)]
        elements: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show instances, sheets and formula counts
    Info { input: PathBuf },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.options.endpoint.clone() {
        Some(url) => {
            let timeout = Duration::try_from_secs_f64(cli.options.timeout)
                .context("Invalid --timeout")?;
            let mut config = HttpEvaluatorConfig::new(url).with_timeout(timeout);
            if let Some(token) = &cli.options.token {
                config = config.with_token(token.as_str());
            }
            let evaluator = HttpFunctionEvaluator::new(config)
                .context("Failed to create the function service client")?;
            run(cli, &evaluator).await
        }
        None => run(cli, &Unavailable).await,
    }
}

async fn run<E: FunctionEvaluator>(cli: Cli, evaluator: &E) -> Result<()> {
    let options = &cli.options;
    match cli.command {
        Commands::Recalc { input, output } => {
            let calc = open(&input, options, evaluator).await?;
            write_document(&calc, output.as_deref())
        }
        Commands::Get {
            input,
            instance,
            sheet,
            cell,
        } => {
            let calc = open(&input, options, evaluator).await?;
            let value = calc
                .computed(&instance, &sheet, &cell)
                .with_context(|| format!("Failed to read {}:{}!{}", instance, sheet, cell))?;
            println!("{}", value);
            Ok(())
        }
        Commands::Set {
            input,
            instance,
            sheet,
            cell,
            value,
            output,
        } => {
            let mut calc = open(&input, options, evaluator).await?;
            let stats = calc
                .edit_cell(&instance, &sheet, &cell, &value, evaluator)
                .await
                .with_context(|| format!("Failed to set {}:{}!{}", instance, sheet, cell))?;
            report("edit", stats);
            write_document(&calc, output.as_deref())
        }
        Commands::Template {
            input,
            instance,
            template,
            sheet,
            elements,
            output,
        } => {
            let mut calc = open(&input, options, evaluator).await?;
            let template = Template::from_json(&read(&template)?)
                .with_context(|| format!("Invalid template '{}'", template.display()))?;
            let elements = match elements {
                Some(path) => read_json::<Vec<ElementValue>>(&path)?,
                None => Vec::new(),
            };

            let stats = match sheet {
                Some(sheet) => calc
                    .load_template(&instance, &sheet, &template, &elements, evaluator)
                    .await
                    .with_context(|| format!("Failed to load template into {}:{}", instance, sheet))?,
                None => {
                    let (sheet_id, stats) = calc
                        .add_sheet_from_template(&instance, &template, &elements, evaluator)
                        .await
                        .with_context(|| format!("Failed to add a sheet to '{}'", instance))?;
                    info!(instance = %instance, sheet = %sheet_id, "sheet added");
                    stats
                }
            };
            report("template", stats);
            write_document(&calc, output.as_deref())
        }
        Commands::Info { input } => {
            let calc = open(&input, options, evaluator).await?;
            print_info(&calc, &input, &mut io::stdout().lock())
        }
    }
}

fn calculation_options(options: &GlobalOptions) -> Result<CalculationOptions> {
    let bounds = GridBounds::new(options.rows, options.cols).context("Invalid grid size")?;
    let error_propagation = if options.propagate_errors {
        ErrorPropagation::Propagate
    } else {
        ErrorPropagation::Zero
    };
    Ok(CalculationOptions {
        bounds,
        error_propagation,
    })
}

/// Load a document, merge extra function definitions and recompute everything
async fn open<E: FunctionEvaluator>(
    input: &Path,
    options: &GlobalOptions,
    evaluator: &E,
) -> Result<Recalculator> {
    let mut document = WorkbookDocument::from_json(&read(input)?)
        .with_context(|| format!("Invalid workbook document '{}'", input.display()))?;
    if let Some(path) = &options.functions {
        let extra: Vec<CustomFunctionDefinition> = read_json(path)?;
        document.functions.extend(extra);
    }

    let mut calc = Recalculator::new(WorkbookStore::new()).with_options(calculation_options(options)?);
    let stats = calc
        .load_workbook(document, evaluator)
        .await
        .with_context(|| format!("Failed to load '{}'", input.display()))?;
    report("load", stats);
    Ok(calc)
}

fn report(step: &str, stats: CalculationStats) {
    info!(
        step,
        cells = stats.cells_evaluated,
        errors = stats.errors,
        custom_calls = stats.custom_calls,
        "recalculated"
    );
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    serde_json::from_str(&read(path)?).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}

fn write_document(calc: &Recalculator, output: Option<&Path>) -> Result<()> {
    let json = calc
        .to_document()
        .to_json_pretty()
        .context("Failed to serialize the workbook")?;

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            info!(path = %path.display(), "document written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", json).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn print_info<W: Write>(calc: &Recalculator, input: &Path, out: &mut W) -> Result<()> {
    let store = calc.store();
    if store.is_empty() {
        bail!("'{}' has no instances", input.display());
    }

    writeln!(out, "File: {}", input.display())?;
    writeln!(out, "Instances: {}", store.instance_count())?;
    writeln!(out, "Custom functions: {}", calc.functions().len())?;

    for instance in store.instances() {
        writeln!(out)?;
        writeln!(out, "  Instance \"{}\"", instance.id())?;
        for sheet in instance.sheets() {
            let formulas = sheet.cells().filter(|(_, c)| c.is_formula()).count();
            let errors = sheet.cells().filter(|(_, c)| c.computed.is_error()).count();
            writeln!(
                out,
                "    {}\t{}\tcells: {}\tformulas: {}\terrors: {}",
                sheet.id(),
                sheet.name(),
                sheet.cell_count(),
                formulas,
                errors
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"{
        "instances": [{
            "instanceId": "design",
            "sheets": [{
                "id": "design-sheet1",
                "name": "Hoja1",
                "cells": {
                    "A1": {"value": "2", "formula": "2", "computed": 2},
                    "B1": {"value": "=A1*10", "formula": "=A1*10", "computed": 0},
                    "C1": {"value": "=1/0", "formula": "=1/0", "computed": 0}
                }
            }]
        }]
    }"#;

    fn options() -> GlobalOptions {
        GlobalOptions {
            endpoint: None,
            token: None,
            timeout: 30.0,
            functions: None,
            propagate_errors: false,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }

    fn write_input(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("book.json");
        std::fs::write(&path, DOCUMENT).unwrap();
        path
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "normsheet",
            "set",
            "book.json",
            "design",
            "Hoja1",
            "A1",
            "=B1+1",
            "--propagate-errors",
            "--rows",
            "200",
        ])
        .unwrap();
        assert!(cli.options.propagate_errors);
        assert_eq!(cli.options.rows, 200);
        assert!(matches!(cli.command, Commands::Set { ref value, .. } if value == "=B1+1"));
    }

    #[test]
    fn test_calculation_options() {
        let mut opts = options();
        opts.propagate_errors = true;
        let calc = calculation_options(&opts).unwrap();
        assert_eq!(calc.error_propagation, ErrorPropagation::Propagate);
        assert_eq!(calc.bounds, GridBounds::default());

        opts.cols = 51;
        assert!(calculation_options(&opts).is_err());
    }

    #[tokio::test]
    async fn test_open_recalculates() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let calc = open(&input, &options(), &Unavailable).await.unwrap();
        assert_eq!(
            calc.computed("design", "Hoja1", "B1").unwrap(),
            CellValue::Number(20.0)
        );
    }

    #[tokio::test]
    async fn test_open_merges_functions() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let functions = dir.path().join("functions.json");
        std::fs::write(
            &functions,
            r#"[{"code": "TRAFO", "parameterNames": ["kva"], "remoteId": 3}]"#,
        )
        .unwrap();

        let mut opts = options();
        opts.functions = Some(functions);
        let calc = open(&input, &opts, &Unavailable).await.unwrap();
        assert!(calc.functions().contains("TRAFO"));
    }

    #[tokio::test]
    async fn test_write_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let mut calc = open(&input, &options(), &Unavailable).await.unwrap();
        calc.edit_cell("design", "Hoja1", "A1", "5", &Unavailable)
            .await
            .unwrap();

        let output = dir.path().join("out.json");
        write_document(&calc, Some(&output)).unwrap();
        let reopened = open(&output, &options(), &Unavailable).await.unwrap();
        assert_eq!(
            reopened.computed("design", "Hoja1", "B1").unwrap(),
            CellValue::Number(50.0)
        );
    }

    #[tokio::test]
    async fn test_info() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(&dir);
        let calc = open(&input, &options(), &Unavailable).await.unwrap();

        let mut out = Vec::new();
        print_info(&calc, &input, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Instances: 1"));
        assert!(text.contains("design-sheet1\tHoja1\tcells: 3\tformulas: 2\terrors: 1"));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let err = open(&missing, &options(), &Unavailable).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
