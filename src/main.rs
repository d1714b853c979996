//! Purpose: `tablesink` CLI entry point.
//! Role: Binary crate root; parses args, builds the session, emits JSON on stdout.
//! Invariants: Every library error is fatal here: one diagnostic on stderr, then exit.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod script;

use tablesink::api::{Error, ErrorKind, Logger, SessionOptions, to_exit_code};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if !err.use_stderr() {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            let rendered = err.to_string();
            let message = rendered
                .lines()
                .next()
                .map(|line| line.trim_start_matches("error: ").to_string())
                .unwrap_or_else(|| "invalid arguments".to_string());
            return Err((
                Error::new(ErrorKind::Usage)
                    .with_message(message)
                    .with_hint("Run `tablesink --help` for usage."),
                ColorMode::Auto,
            ));
        }
    };

    let color_mode = cli.color;
    let logger = init_logger(cli.verbose, cli.quiet);
    command_dispatch::dispatch_command(cli.command, logger).map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "tablesink",
    version,
    about = "Stream typed table rows into CSV files",
    long_about = None,
    after_help = r#"EXAMPLES
  $ tablesink load --header --types rows.jsonl
  $ producer | tablesink load --dir out --source run1 --compress

LEARN MORE
  $ tablesink <command> --help"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        global = true,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Log table activity to stderr (-vv for more)")]
    verbose: u8,
    #[arg(short, long, global = true, conflicts_with = "verbose", help = "Only log errors")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Write table rows from a JSON-lines record stream",
        long_about = r#"Read records, one JSON object per line, and write each table to
<dir>/<source>.<table>.csv (or .csv.gz).

Records:
  {"table": "t", "columns": ["id", "v"]}    declare a table
  {"row": "t", "values": [1, 2.5]}          write one row
  {"close": "t"}                            close a table's file

Row cells must be integers or floats."#,
        after_help = r#"EXAMPLES
  $ tablesink load rows.jsonl
  $ tablesink load --header --types --float-format '%.3f' rows.jsonl
  $ cat rows.jsonl | tablesink load --append --source nightly"#
    )]
    Load(LoadArgs),
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
struct LoadArgs {
    #[arg(help = "Record file (default: stdin; `-` also reads stdin)", value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
    #[arg(long, help = "JSON file with session options", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
    #[arg(long, help = "Output directory for table files", value_hint = ValueHint::DirPath)]
    dir: Option<PathBuf>,
    #[arg(long, help = "First file-name component (default: input file name, else `out`)")]
    source: Option<String>,
    #[arg(long, help = "Gzip table files (.csv.gz)")]
    compress: bool,
    #[arg(long, help = "Append to existing files instead of truncating")]
    append: bool,
    #[arg(long, help = "Write the column-name row")]
    header: bool,
    #[arg(long, help = "Write the `# name:type` row")]
    types: bool,
    #[arg(long, help = "printf-style float format, e.g. %.3f or %g")]
    float_format: Option<String>,
    #[arg(long, help = "Do not close tables explicitly at exit")]
    no_auto_close: bool,
}

impl LoadArgs {
    fn session_options(&self) -> Result<SessionOptions, Error> {
        let mut options = match &self.config {
            Some(path) => read_config(path)?,
            None => SessionOptions::default(),
        };

        if let Some(dir) = &self.dir {
            options.out_dir = Some(dir.clone());
        }
        if let Some(source) = &self.source {
            options.source_file = source.clone();
        } else if self.config.is_none() {
            if let Some(name) = self.input_path().and_then(Path::file_name) {
                options.source_file = name.to_string_lossy().to_string();
            }
        }
        if let Some(format) = &self.float_format {
            options.float_format = format.clone();
        }
        options.compress |= self.compress;
        options.dont_drop |= self.append;
        options.add_header |= self.header;
        options.add_types |= self.types;
        if self.no_auto_close {
            options.auto_close = false;
        }
        Ok(options)
    }

    fn input_path(&self) -> Option<&Path> {
        self.input
            .as_deref()
            .filter(|path| path.as_os_str() != "-")
    }
}

fn read_config(path: &Path) -> Result<SessionOptions, Error> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to open config file")
            .with_path(path)
            .with_source(err)
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid config file: {err}"))
            .with_path(path)
    })
}

fn init_logger(verbose: u8, quiet: bool) -> Logger {
    let explicit = match (quiet, verbose) {
        (true, _) => Some("error"),
        (false, 0) => None,
        (false, 1) => Some("debug"),
        (false, _) => Some("trace"),
    };
    let env_filter = match explicit {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    Logger::new(Dispatch::new(subscriber))
}

fn emit_json(value: Value) {
    let json = serde_json::to_string(&value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::Busy => "table is locked".to_string(),
        ErrorKind::InvalidType => "invalid cell type".to_string(),
        ErrorKind::Unsupported => "unsupported".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}
