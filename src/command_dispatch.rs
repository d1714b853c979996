//! Purpose: Hold top-level CLI command dispatch for `tablesink`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `load` closes every table before reporting, so summaries describe flushed files.

use super::*;

use tablesink::api::Context;

use crate::script::run_script;

pub(super) fn dispatch_command(command: Command, logger: Logger) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "tablesink", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Load(args) => {
            let options = args.session_options()?;
            let mut ctx = Context::with_logger(options, logger)?;

            let outcome = match args.input_path() {
                Some(path) => {
                    let file = File::open(path).map_err(|err| {
                        Error::new(ErrorKind::Io)
                            .with_message("failed to open input")
                            .with_path(path)
                            .with_source(err)
                    })?;
                    run_script(BufReader::new(file), &mut ctx)?
                }
                None => run_script(io::stdin().lock(), &mut ctx)?,
            };
            ctx.close_all()?;

            for table in ctx.tables() {
                emit_json(json!({
                    "table": table.name(),
                    "file": table.filename().map(|path| path.display().to_string()),
                    "rows": table.row_count(),
                }));
            }
            ctx.logger().scope(|| {
                tracing::debug!(
                    records = outcome.records,
                    rows = outcome.rows,
                    "load finished"
                );
            });
            Ok(RunOutcome::ok())
        }
    }
}
