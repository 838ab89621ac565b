use std::io::Write;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use w3ml_sdk::{AddOutcome, CatalogEntry, CommandParser, Database, DbConfig, COLUMNS};

use crate::cli::*;
use crate::fetch;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => DbConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DbConfig::default(),
    };
    let mut db = Database::open(&cli.db, config)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    let format = cli.format;
    let result = match cli.command {
        Command::Add(args) => cmd_add(&mut db, args, format),
        Command::Dump(args) => cmd_dump(&db, args),
        Command::List(args) => cmd_list(&db, args, format),
        Command::Events(args) => cmd_events(&db, args),
        Command::Resolve(args) => cmd_resolve(&db, args, format),
        Command::Info => cmd_info(&db, format),
    };
    let closed = db.close();
    result?;
    closed.context("closing database")?;
    Ok(())
}

#[derive(Serialize)]
struct AddReport<'a> {
    source: &'a str,
    #[serde(flatten)]
    outcome: &'a AddOutcome,
}

fn cmd_add(db: &mut Database, args: AddArgs, format: OutputFormat) -> anyhow::Result<()> {
    let parser = CommandParser::new(db.config().parser.clone());
    let agent = fetch::build_agent(&db.config().fetch);
    let inputs = fetch::expand_inputs(&args.inputs)?;

    let (mut added, mut duplicates, mut skipped) = (0usize, 0usize, 0usize);
    for input in &inputs {
        let source = input.to_string();
        let bytes = input.read(&agent)?;
        let outcome = db
            .add_with(&parser, &bytes, &source)
            .with_context(|| format!("adding {source}"))?;

        match format {
            OutputFormat::Json => {
                let report = AddReport {
                    source: &source,
                    outcome: &outcome,
                };
                println!("{}", serde_json::to_string(&report)?);
            }
            OutputFormat::Text => match &outcome {
                AddOutcome::Added { index, hash } => println!(
                    "{} {} as {} ({})",
                    "added".green(),
                    source,
                    index.to_string().bold(),
                    hash.short_hex().yellow()
                ),
                AddOutcome::Duplicate { index } => println!(
                    "{} {} already present at {}",
                    "duplicate".yellow(),
                    source,
                    index.to_string().bold()
                ),
                AddOutcome::Skipped { participants } => println!(
                    "{} {}: {} participants, need 2",
                    "skipped".red(),
                    source,
                    participants
                ),
            },
        }
        match outcome {
            AddOutcome::Added { .. } => added += 1,
            AddOutcome::Duplicate { .. } => duplicates += 1,
            AddOutcome::Skipped { .. } => skipped += 1,
        }
    }

    if format == OutputFormat::Text && inputs.len() > 1 {
        println!(
            "{} added, {} duplicate, {} skipped",
            added.to_string().green().bold(),
            duplicates,
            skipped
        );
    }
    Ok(())
}

fn cmd_dump(db: &Database, args: DumpArgs) -> anyhow::Result<()> {
    let index = db.resolve(args.token.as_str())?;
    let bytes = db.get(index)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn cmd_list(db: &Database, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let columns = select_columns(args.columns)?;
    let entries = db.list(args.slice.as_ref())?;

    match format {
        OutputFormat::Json => {
            let rows = entries
                .iter()
                .map(|e| json_row(e, &columns))
                .collect::<anyhow::Result<Vec<Value>>>()?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            let cells = entries
                .iter()
                .map(|e| Ok(e.columns(&columns)?.iter().map(cell).collect()))
                .collect::<anyhow::Result<Vec<Vec<String>>>>()?;
            for line in render_table(&columns, &cells) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn cmd_events(db: &Database, args: EventsArgs) -> anyhow::Result<()> {
    let parser = CommandParser::new(db.config().parser.clone());
    let index = db.resolve(args.token.as_str())?;
    let mut stdout = std::io::stdout().lock();
    for event in db.events_with(&parser, index)? {
        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
    }
    Ok(())
}

fn cmd_resolve(db: &Database, args: ResolveArgs, format: OutputFormat) -> anyhow::Result<()> {
    let index = db.resolve(args.token.as_str())?;
    let hash = db.row(index)?.hash;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "index": index, "hash": hash.to_hex() })
        ),
        OutputFormat::Text => println!("{}\t{}", index.to_string().bold(), hash),
    }
    Ok(())
}

fn cmd_info(db: &Database, format: OutputFormat) -> anyhow::Result<()> {
    let location = db
        .location()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(memory)".into());
    let timeline = &db.config().store.timeline;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "location": location,
                "replays": db.len(),
                "timeline_buckets": timeline.buckets,
                "bucket_ms": timeline.bucket_ms,
            })
        ),
        OutputFormat::Text => {
            println!("Database: {}", location.bold());
            println!("Replays: {}", db.len().to_string().bold());
            println!(
                "Timeline: {} buckets of {} ms",
                timeline.buckets, timeline.bucket_ms
            );
        }
    }
    Ok(())
}

/// Requested columns, or every column when none were named.
fn select_columns(requested: Vec<String>) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(std::iter::once("index")
            .chain(COLUMNS.iter().copied())
            .map(String::from)
            .collect());
    }
    for name in &requested {
        if name != "index" && !COLUMNS.contains(&name.as_str()) {
            bail!("unknown column {name:?}; known columns: index, {}", COLUMNS.join(", "));
        }
    }
    Ok(requested)
}

fn json_row(entry: &CatalogEntry, columns: &[String]) -> anyhow::Result<Value> {
    let mut object = serde_json::Map::new();
    for (name, value) in columns.iter().zip(entry.columns(columns)?) {
        object.insert(name.clone(), value);
    }
    Ok(Value::Object(object))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".into(),
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| format!("{f:.1}")).unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Left-aligned text table, header first.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(line(headers).bold().to_string());
    lines.extend(rows.iter().map(|r| line(r)));
    lines
}
