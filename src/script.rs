//! Purpose: Drive a `Context` from a JSON-lines record stream for `tablesink load`.
//! Exports: `ScriptOutcome`, `run_script`.
//! Role: The producer side of the CLI; isolates record parsing from main.
//! Invariants: One record per line; blank lines are skipped.
//! Invariants: Errors carry the 1-based line number of the offending record.
//! Invariants: Each row record locks its table, fills columns in order, commits, unlocks.
use std::io::BufRead;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tablesink::api::{Context, Error, ErrorKind, Table, Value};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Declare {
    table: String,
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Row {
    row: String,
    values: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Close {
    close: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Record {
    Declare(Declare),
    Row(Row),
    Close(Close),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ScriptOutcome {
    pub records: u64,
    pub rows: u64,
}

fn at_line(err: Error, line: u64) -> Error {
    let message = match err.message() {
        Some(message) => format!("line {line}: {message}"),
        None => format!("line {line}: {:?}", err.kind()),
    };
    err.with_message(message)
}

pub fn run_script<R: BufRead>(reader: R, ctx: &mut Context) -> Result<ScriptOutcome, Error> {
    let mut outcome = ScriptOutcome::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index as u64 + 1;
        let line = line.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("line {line_no}: failed to read input"))
                .with_source(err)
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: Record = serde_json::from_str(trimmed).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("line {line_no}: invalid record: {err}"))
                .with_hint(
                    r#"Records are {"table":..,"columns":[..]}, {"row":..,"values":[..]} or {"close":..}."#,
                )
        })?;

        apply(record, ctx, &mut outcome).map_err(|err| at_line(err, line_no))?;
        outcome.records += 1;
    }

    Ok(outcome)
}

fn apply(record: Record, ctx: &mut Context, outcome: &mut ScriptOutcome) -> Result<(), Error> {
    match record {
        Record::Declare(Declare { table, columns }) => {
            ctx.add_table(Table::with_columns(table, columns))
        }
        Record::Row(Row { row, values }) => {
            ctx.lock_table(&row)?;
            for value in values {
                ctx.put(cell_value(value)?)?;
            }
            ctx.commit_row()?;
            ctx.unlock_table();
            outcome.rows += 1;
            Ok(())
        }
        Record::Close(Close { close }) => ctx.close_table(&close),
    }
}

fn cell_value(value: JsonValue) -> Result<Value, Error> {
    match value {
        JsonValue::Null => Ok(Value::None),
        JsonValue::String(text) => Ok(Value::Str(text)),
        JsonValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                Ok(Value::Int(int))
            } else if number.is_u64() {
                Err(Error::new(ErrorKind::Usage)
                    .with_message(format!("integer {number} does not fit in 64 signed bits")))
            } else {
                number.as_f64().map(Value::Float).ok_or_else(|| {
                    Error::new(ErrorKind::Usage).with_message(format!("unrepresentable number {number}"))
                })
            }
        }
        other => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("unsupported cell value {other}"))
            .with_hint("Cells must be integers, floats, strings, or null.")),
    }
}
