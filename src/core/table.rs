// Table schema plus its lazily opened row stream.
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::chain::Chain;
use crate::core::column::Column;
use crate::core::error::{Error, ErrorKind};
use crate::core::float_format::FloatFormat;
use crate::core::log::Logger;
use crate::core::options::SessionOptions;
use crate::core::sink::{OpenMode, Sink};
use crate::core::value::Value;

#[derive(Debug)]
pub struct Table {
    name: String,
    filename: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
    registered: bool,
    columns: Chain<Column>,
    output: Option<Sink>,
    row_count: u64,
    drop_existing: bool,
    float_format: FloatFormat,
    logger: Logger,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            explicit_file: None,
            registered: false,
            columns: Chain::new(),
            output: None,
            row_count: 0,
            drop_existing: true,
            float_format: FloatFormat::default(),
            logger: Logger::default(),
        }
    }

    /// Builds a table whose columns carry `names`, in order.
    pub fn with_columns<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(name);
        for column in names {
            table.columns.push_back(Column::new(column));
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames a free-standing table. Tables owned by a `Context` are
    /// renamed through [`Context::rename_table`](crate::core::context::Context::rename_table),
    /// which keeps names unique.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        if self.registered {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table is registered in a context")
                .with_table(&self.name)
                .with_hint("Rename it through the context."));
        }
        self.name = name.into();
        Ok(())
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    /// Output path: the one used by the last [`Table::open`], else the
    /// explicit one from [`Table::set_file`].
    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref().or(self.explicit_file.as_deref())
    }

    /// Fixes the output path, overriding the generated name on every later open.
    pub fn set_file(&mut self, path: impl Into<PathBuf>) {
        self.explicit_file = Some(path.into());
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn drop_existing(&self) -> bool {
        self.drop_existing
    }

    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }

    pub(crate) fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    pub(crate) fn record_row(&mut self) {
        self.row_count += 1;
    }

    pub fn columns(&self) -> &Chain<Column> {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut Column> {
        self.columns.get_mut(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.position(|column| column.name() == name)
    }

    pub fn first_column(&self) -> Option<&Column> {
        self.columns.first()
    }

    pub fn last_column(&self) -> Option<&Column> {
        self.columns.last()
    }

    /// Moves `column` to the end of the schema and returns its index.
    pub fn append_column(&mut self, column: Column) -> Result<usize, Error> {
        self.ensure_schema_mutable()?;
        Ok(self.columns.push_back(column))
    }

    /// Places `column` relative to the column at `anchor`; see [`Chain::insert_sibling`].
    pub fn insert_column(
        &mut self,
        anchor: usize,
        offset: isize,
        column: Column,
    ) -> Result<usize, Error> {
        self.ensure_schema_mutable()?;
        self.columns
            .insert_sibling(anchor, offset, column)
            .map_err(|err| err.with_table(&self.name))
    }

    pub fn remove_column(&mut self, index: usize) -> Result<Column, Error> {
        self.ensure_schema_mutable()?;
        self.columns.unlink(index).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("no column at index {index}"))
                .with_table(&self.name)
        })
    }

    fn ensure_schema_mutable(&self) -> Result<(), Error> {
        if self.output.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("schema is fixed while the table is open")
                .with_table(&self.name));
        }
        Ok(())
    }

    /// `[out_dir/]source.table.csv[.gz]`
    pub fn generated_filename(&self, options: &SessionOptions) -> PathBuf {
        let suffix = if options.compress { ".gz" } else { "" };
        let file = format!("{}.{}.csv{suffix}", options.source_file, self.name);
        match &options.out_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Opens the output stream. A no-op when already open.
    ///
    /// Header and type rows are written (when enabled) unless appending to a
    /// file that already exists.
    pub fn open(&mut self, options: &SessionOptions) -> Result<(), Error> {
        if let Some(output) = &self.output {
            let path = output.path().map(|path| path.display().to_string());
            self.logger.scope(|| {
                tracing::debug!(table = %self.name, file = ?path, "table already open");
            });
            return Ok(());
        }

        let path = match &self.explicit_file {
            Some(path) => path.clone(),
            None => self.generated_filename(options),
        };
        let float_format =
            FloatFormat::parse(&options.float_format).map_err(|err| err.with_table(&self.name))?;

        let allow_header = !options.dont_drop || !path.exists();
        let mode = if options.dont_drop {
            OpenMode::Append
        } else {
            OpenMode::Truncate
        };
        self.logger.scope(|| {
            tracing::debug!(table = %self.name, file = %path.display(), ?mode, "opening table");
        });

        let sink = if options.compress {
            Sink::create_gzip(&path, mode)
        } else {
            Sink::create(&path, mode)
        }
        .map_err(|err| err.with_table(&self.name))?;

        self.filename = Some(path);
        self.drop_existing = !options.dont_drop;
        self.start(sink, float_format, options, allow_header)
    }

    /// Opens the table onto a caller-supplied sink, as a truncating open would.
    pub fn attach(&mut self, sink: Sink, options: &SessionOptions) -> Result<(), Error> {
        if self.output.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table is already open")
                .with_table(&self.name));
        }
        let float_format =
            FloatFormat::parse(&options.float_format).map_err(|err| err.with_table(&self.name))?;
        self.drop_existing = true;
        self.start(sink, float_format, options, true)
    }

    fn start(
        &mut self,
        sink: Sink,
        float_format: FloatFormat,
        options: &SessionOptions,
        allow_header: bool,
    ) -> Result<(), Error> {
        self.output = Some(sink);
        self.float_format = float_format;
        self.row_count = 0;

        if options.add_header && allow_header {
            self.write_header()?;
        }
        if options.add_types && allow_header {
            self.write_types()?;
        }
        Ok(())
    }

    /// `name,name,...`
    pub fn write_header(&mut self) -> Result<(), Error> {
        let mut line = String::new();
        for (index, column) in self.columns.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            line.push_str(column.name());
        }
        line.push('\n');
        self.emit(&line)
    }

    /// `# name:type,name:type,...`
    pub fn write_types(&mut self) -> Result<(), Error> {
        let mut line = String::new();
        for (index, column) in self.columns.iter().enumerate() {
            line.push_str(if index == 0 { "# " } else { "," });
            line.push_str(column.name());
            line.push(':');
            line.push_str(column.value_type().as_str());
        }
        line.push('\n');
        self.emit(&line)
    }

    /// Writes the staged column values as one line.
    ///
    /// Only `int` and `float` cells are serializable. The whole line is
    /// rendered before anything is written, so a rejected row leaves the
    /// output untouched.
    pub fn write_row(&mut self) -> Result<(), Error> {
        let mut line = String::new();
        for (index, column) in self.columns.iter().enumerate() {
            if index > 0 {
                line.push(',');
            }
            match column.value() {
                Value::Int(value) => line.push_str(&value.to_string()),
                Value::Float(value) => self.float_format.render_into(&mut line, *value),
                other => {
                    return Err(Error::new(ErrorKind::InvalidType)
                        .with_message(format!(
                            "column has type `{}`; rows accept only int and float cells",
                            other.value_type()
                        ))
                        .with_table(&self.name)
                        .with_column(column.name()));
                }
            }
        }
        line.push('\n');
        self.emit(&line)
    }

    fn emit(&mut self, line: &str) -> Result<(), Error> {
        let Some(output) = self.output.as_mut() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table is not open")
                .with_table(&self.name));
        };
        output.write_all(line.as_bytes()).map_err(|err| {
            let mut error = Error::new(ErrorKind::Io)
                .with_message("failed to write table output")
                .with_table(&self.name)
                .with_source(err);
            if let Some(path) = &self.filename {
                error = error.with_path(path);
            }
            error
        })
    }

    /// Flushes and releases the output stream. A no-op when already closed.
    pub fn close(&mut self) -> Result<(), Error> {
        match self.output.take() {
            Some(output) => {
                self.logger.scope(|| {
                    tracing::debug!(table = %self.name, rows = self.row_count, "closing table");
                });
                output.finish().map_err(|err| err.with_table(&self.name))
            }
            None => {
                self.logger.scope(|| {
                    tracing::debug!(table = %self.name, "table already closed");
                });
                Ok(())
            }
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        if self.output.is_some() {
            if let Err(err) = self.close() {
                self.logger.scope(|| {
                    tracing::warn!(table = %self.name, error = %err, "failed to close table");
                });
            }
        }
    }
}
