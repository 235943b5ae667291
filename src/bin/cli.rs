//! fuzzdex CLI
//!
//! Command-line interface for building and querying a fuzzdex database.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fuzzdex::logging::{self, Severity};
use fuzzdex::{Config, Database, Engine};

/// fuzzdex CLI
#[derive(Parser, Debug)]
#[command(name = "fuzzdex")]
#[command(about = "Keyword-to-file index with fuzzy search")]
#[command(version)]
struct Args {
    /// Increase log output (-v verbose, -vv very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print files whose keywords match
    Search {
        /// Database file
        db: PathBuf,

        /// Keyword to look for
        keyword: String,

        /// Maximum edit distance
        #[arg(short, long, default_value = "0")]
        fuzzy: u32,

        /// Ignore case when comparing
        #[arg(short, long)]
        ignore_case: bool,

        /// Also print files that no longer exist or can't be read
        #[arg(short, long)]
        all: bool,
    },

    /// Link a keyword to one or more files
    Add {
        db: PathBuf,
        keyword: String,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Remove every keyword of the given files
    Remove {
        db: PathBuf,
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// List indexed files
    Files { db: PathBuf },

    /// Print every association
    Dump { db: PathBuf },

    /// Drop files that are gone from disk
    Prune {
        db: PathBuf,

        /// Also drop files modified since they were indexed
        #[arg(short, long)]
        modified: bool,
    },

    /// Rewrite the database without dead records
    Compact { db: PathBuf },
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(Severity::from_verbosity(args.verbose));

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::emit(Severity::Critical, &e.to_string());
            eprintln!("fuzzdex: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> fuzzdex::Result<()> {
    match command {
        Commands::Search {
            db,
            keyword,
            fuzzy,
            ignore_case,
            all,
        } => {
            let db = open(&db, true)?;
            for filename in db.search(&keyword, fuzzy, ignore_case)? {
                if all || is_readable(&filename) {
                    println!("{}", filename);
                }
            }
            db.close()
        }
        Commands::Add { db, keyword, files } => {
            let db = open(&db, false)?;
            for filename in &files {
                if !db.expand(&keyword, filename)? {
                    logging::emit(
                        Severity::Critical,
                        &format!("Failed to add '{}' for '{}'", keyword, filename),
                    );
                }
            }
            db.close()
        }
        Commands::Remove { db, files } => {
            let db = open(&db, false)?;
            let removed = db.truncate_multiple(files.as_slice())?;
            logging::emit(Severity::Verbose, &format!("Removed {} associations", removed));
            db.close()
        }
        Commands::Files { db } => {
            let db = open(&db, true)?;
            for info in db.files()? {
                println!("{}\t{}\t{}", info.filename, info.last_modified, info.keywords);
            }
            db.close()
        }
        Commands::Dump { db } => {
            let db = open(&db, true)?;
            db.dump(io::stdout().lock())?;
            db.close()
        }
        Commands::Prune { db, modified } => {
            let db = open(&db, false)?;
            let removed = if modified {
                db.truncate_modified()?
            } else {
                db.truncate_deleted()?
            };
            for filename in removed {
                println!("{}", filename);
            }
            db.close()
        }
        Commands::Compact { db } => {
            let db = open(&db, false)?;
            let stats = db.compact()?;
            println!(
                "{} -> {} records, {} -> {} bytes",
                stats.records_before, stats.records_after, stats.bytes_before, stats.bytes_after
            );
            db.close()
        }
    }
}

fn open(path: &Path, read_only: bool) -> fuzzdex::Result<Database> {
    let config = Config::builder().read_only(read_only).build();
    Engine::new(config)?.open(path)
}

fn is_readable(filename: &str) -> bool {
    std::fs::File::open(filename).is_ok()
}
