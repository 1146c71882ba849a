//! Interactive shell: reads `;`-terminated commands, executes them against
//! a database directory, and pretty-prints the results.

use anyhow::Result;
use clap::Parser;
use common::pretty::{TableStyleKind, render_record_batch};
use common::Config;
use database::{CommandOutcome, Database};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "nanodb", about = "A small relational database shell")]
struct Args {
    /// Directory holding table data and the catalog.
    #[arg(long, default_value = "./db_data")]
    data_dir: PathBuf,

    /// Number of pages the buffer pool keeps resident.
    #[arg(long, default_value_t = 256)]
    buffer_pages: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::builder()
        .data_dir(args.data_dir)
        .buffer_pool_pages(args.buffer_pages)
        .build();
    let mut db = Database::open(config)?;

    println!("nanodb shell -- terminate commands with ';', EXIT to quit");

    let mut editor = DefaultEditor::new()?;
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "sql> " } else { "  -> " };
        match editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if buffer.is_empty()
                    && (trimmed.eq_ignore_ascii_case("exit")
                        || trimmed.eq_ignore_ascii_case("quit"))
                {
                    break;
                }

                buffer.push_str(&line);
                buffer.push('\n');

                if !buffer.trim_end().ends_with(';') {
                    continue;
                }

                let sql = std::mem::take(&mut buffer);
                let _ = editor.add_history_entry(sql.trim());
                run_command(&mut db, &sql);
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("readline failed: {e}");
                break;
            }
        }
    }

    Ok(())
}

fn run_command(db: &mut Database, sql: &str) {
    match db.execute(sql) {
        Ok(results) => {
            for result in results {
                match &result.outcome {
                    CommandOutcome::Rows(batch) => {
                        println!("{}", render_record_batch(batch, TableStyleKind::Modern));
                        println!(
                            "{} row(s) in {:.3?}",
                            result.row_count(),
                            result.elapsed
                        );
                    }
                    CommandOutcome::Count { affected } => {
                        println!("{} row(s) affected in {:.3?}", affected, result.elapsed);
                    }
                    CommandOutcome::Explain(text) => print!("{text}"),
                    CommandOutcome::Message(message) => println!("{message}"),
                }
            }
        }
        Err(e) => eprintln!("error: {e}"),
    }
}
