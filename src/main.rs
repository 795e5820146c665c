//! CLI for bibconv - Convert bibliographies between BibTeX and RIS.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use bibconv::{convert, Format, TagTable};

/// Table picked up from the working directory when `--table` is not given.
const LOCAL_TABLE: &str = "tag_equivalence.csv";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Convert bibliographies between BibTeX and RIS
#[derive(Parser)]
#[command(name = "bibconv")]
#[command(version)]
#[command(after_help = "\
Examples:
  bibconv convert refs.bib
  bibconv convert library.ris -o library.bib
  cat refs.bib | bibconv convert - --from bibtex
  bibconv table --json")]
struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a .bib file to RIS or a .ris file to BibTeX
    #[command(after_help = "\
Examples:
  bibconv convert paper.bib
  bibconv convert paper.bib -o - > paper.ris
  bibconv convert export.ris --table my_tags.csv -o export.bib

Records that cannot be parsed are skipped and reported on stderr.")]
    Convert {
        /// Input file (use '-' for stdin)
        input: PathBuf,

        /// Output file, '-' for stdout (default: input path with the new extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source format (default: detected from the input extension)
        #[arg(long, value_enum)]
        from: Option<Format>,

        /// Tag equivalence table (CSV with columns Type, BibTeX Field, RIS Tag)
        #[arg(short, long)]
        table: Option<PathBuf>,
    },

    /// Show the tag equivalences in use
    Table {
        /// Tag equivalence table (default: ./tag_equivalence.csv or builtin)
        #[arg(short, long)]
        table: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — input file not found / unreadable
    InputFile(String),
    /// Exit 11 — equivalence table not found / invalid
    Table(String),
    /// Exit 12 — source format unknown
    Format(String),
    /// Exit 13 — no record could be converted
    NoEntries(String),
    /// Exit 14 — cannot write output file
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::Table(_) => 11,
            AppError::Format(_) => 12,
            AppError::NoEntries(_) => 13,
            AppError::OutputFile(_) => 14,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::Table(msg) => {
                write!(
                    f,
                    "{}\n  hint: the table must be a CSV file with the header 'Type,BibTeX Field,RIS Tag'",
                    msg
                )
            }
            AppError::Format(msg) => {
                write!(
                    f,
                    "{}\n  hint: use a .bib or .ris file, or pass --from bibtex|ris",
                    msg
                )
            }
            AppError::NoEntries(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the input is a BibTeX or RIS bibliography",
                    msg
                )
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    // Warnings are shown by default; each -v adds a level.
    if let Err(e) = stderrlog::new()
        .quiet(cli.quiet)
        .verbosity(1 + cli.verbose as usize)
        .init()
    {
        eprintln!("warning: logging unavailable: {}", e);
    }

    match cli.command {
        Commands::Convert {
            input,
            output,
            from,
            table,
        } => {
            convert_command(&input, output.as_deref(), from, table.as_deref())?;
        }
        Commands::Table { table, json } => {
            table_command(table.as_deref(), json)?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Convert a bibliography file into the other format.
fn convert_command(
    input: &Path,
    output: Option<&Path>,
    from: Option<Format>,
    table: Option<&Path>,
) -> Result<(), AppError> {
    let stdin_input = input == Path::new("-");

    // 1. Work out the source format
    let from = match from {
        Some(format) => format,
        None if stdin_input => {
            return Err(AppError::Format(
                "cannot detect the format of stdin".to_string(),
            ))
        }
        None => Format::from_path(input).ok_or_else(|| {
            AppError::Format(format!(
                "'{}': unsupported file extension",
                input.display()
            ))
        })?,
    };

    // 2. Read the input (support '-' for stdin)
    let text = if stdin_input {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| AppError::InputFile(format!("failed to read from stdin: {}", e)))?;
        buf
    } else {
        fs::read_to_string(input)
            .map_err(|e| AppError::InputFile(format!("'{}': {}", input.display(), e)))?
    };

    // 3. Load the equivalence table
    let table = resolve_table(table)?;

    // 4. Convert
    // Per-record failures are carried in the conversion; only an empty
    // result is an error.
    let conversion = convert(&text, from, &table).map_err(|e| {
        AppError::NoEntries(format!("'{}': {}", input.display(), e))
    })?;

    // 5. Write to file or stdout
    let target = from.counterpart();
    let destination = match output {
        Some(path) if path == Path::new("-") => None,
        Some(path) => Some(path.to_path_buf()),
        None if stdin_input => None,
        None => Some(input.with_extension(target.extension())),
    };

    if let Some(output_path) = destination {
        fs::write(&output_path, &conversion.output).map_err(|e| {
            AppError::OutputFile(format!("'{}': {}", output_path.display(), e))
        })?;
        eprintln!(
            "converted {} record(s), skipped {}, wrote {}",
            conversion.converted,
            conversion.skipped(),
            output_path.display()
        );
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        write!(handle, "{}", conversion.output)
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }

    Ok(())
}

/// Print the equivalences in use.
fn table_command(table: Option<&Path>, json: bool) -> Result<(), AppError> {
    let table = resolve_table(table)?;

    if json {
        let text = serde_json::to_string_pretty(&table)
            .map_err(|e| AppError::Table(format!("cannot serialize table: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("# Fields");
    for row in table.fields() {
        println!("{} <-> {}", row.bibtex, row.ris);
    }
    println!("# Entry types");
    for row in table.types() {
        println!("{} <-> {}", row.bibtex, row.ris);
    }
    Ok(())
}

/// Loads the table named on the command line, else `./tag_equivalence.csv`,
/// else the builtin one.
fn resolve_table(path: Option<&Path>) -> Result<TagTable, AppError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if Path::new(LOCAL_TABLE).is_file() => PathBuf::from(LOCAL_TABLE),
        None => {
            log::info!("using the builtin tag equivalence table");
            return Ok(TagTable::builtin());
        }
    };

    log::info!("loading tag equivalence table from '{}'", path.display());
    TagTable::load(&path).map_err(|e| AppError::Table(format!("'{}': {}", path.display(), e)))
}
