//! Purpose: Own a session's tables and route a producer's value stream into one of them.
//! Exports: `Context`.
//! Role: The single write cursor: lock a table, fill columns in order, commit rows.
//! Invariants: At most one table is locked; the cursor exists only while locked.
//! Invariants: Table names are unique within a context.
//! Invariants: A table's output is opened lazily by the first committed row.
use crate::core::chain::Chain;
use crate::core::column::Column;
use crate::core::error::{Error, ErrorKind};
use crate::core::float_format::FloatFormat;
use crate::core::log::Logger;
use crate::core::options::SessionOptions;
use crate::core::table::Table;
use crate::core::value::Value;

#[derive(Debug)]
pub struct Context {
    options: SessionOptions,
    tables: Chain<Table>,
    locked: Option<usize>,
    cursor: Option<usize>,
    logger: Logger,
}

impl Context {
    /// Validates `options` (notably the float format) and starts an empty session.
    pub fn new(options: SessionOptions) -> Result<Self, Error> {
        Self::with_logger(options, Logger::default())
    }

    pub fn with_logger(options: SessionOptions, logger: Logger) -> Result<Self, Error> {
        FloatFormat::parse(&options.float_format)?;
        Ok(Self {
            options,
            tables: Chain::new(),
            locked: None,
            cursor: None,
            logger,
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn add_table(&mut self, mut table: Table) -> Result<(), Error> {
        if self.position(table.name()).is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("table already exists")
                .with_table(table.name()));
        }
        self.logger.scope(|| {
            tracing::debug!(table = %table.name(), "adding table to context");
        });
        table.set_logger(self.logger.clone());
        table.set_registered(true);
        self.tables.push_back(table);
        Ok(())
    }

    /// Unlinks `name` from the session and hands it back, still open if it was.
    pub fn remove_table(&mut self, name: &str) -> Result<Table, Error> {
        if let Some(locked) = self.locked_table() {
            return Err(Error::new(ErrorKind::Busy)
                .with_message(format!(
                    "cannot remove tables while `{}` is locked",
                    locked.name()
                ))
                .with_table(name));
        }
        let mut table = self
            .position(name)
            .and_then(|index| self.tables.unlink(index))
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no such table")
                    .with_table(name)
            })?;
        table.set_registered(false);
        Ok(table)
    }

    /// Renames a registered table, keeping names unique.
    pub fn rename_table(&mut self, name: &str, new_name: impl Into<String>) -> Result<(), Error> {
        let new_name = new_name.into();
        let Some(index) = self.position(name) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("no such table")
                .with_table(name));
        };
        if new_name != name && self.position(&new_name).is_some() {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("table already exists")
                .with_table(new_name));
        }
        if let Some(table) = self.tables.get_mut(index) {
            table.rename(new_name);
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tables.position(|table| table.name() == name)
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.position(name).and_then(|index| self.tables.get(index))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.position(name)
            .and_then(move |index| self.tables.get_mut(index))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn first_table(&self) -> Option<&Table> {
        self.tables.first()
    }

    pub fn last_table(&self) -> Option<&Table> {
        self.tables.last()
    }

    pub fn lock_table(&mut self, name: &str) -> Result<(), Error> {
        if let Some(locked) = self.locked_table() {
            return Err(Error::new(ErrorKind::Busy)
                .with_message(format!("context already has locked table `{}`", locked.name()))
                .with_table(name)
                .with_hint("Unlock the current table before locking another."));
        }
        let Some(index) = self.position(name) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("could not lock table: no such table")
                .with_table(name));
        };

        self.locked = Some(index);
        self.cursor = self.first_cursor(index);
        self.logger.scope(|| {
            tracing::debug!(table = %name, "context locked table");
        });
        Ok(())
    }

    /// Releases the lock; a no-op when nothing is locked.
    pub fn unlock_table(&mut self) {
        if let Some(table) = self.locked_table() {
            self.logger.scope(|| {
                tracing::debug!(table = %table.name(), "context unlocked table");
            });
        }
        self.locked = None;
        self.cursor = None;
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    pub fn locked_table(&self) -> Option<&Table> {
        self.locked.and_then(|index| self.tables.get(index))
    }

    pub fn locked_table_mut(&mut self) -> Option<&mut Table> {
        self.locked.and_then(move |index| self.tables.get_mut(index))
    }

    fn first_cursor(&self, index: usize) -> Option<usize> {
        self.tables
            .get(index)
            .filter(|table| table.column_count() > 0)
            .map(|_| 0)
    }

    /// Index of the column the producer writes next; `None` past the last column.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current_column(&self) -> Option<&Column> {
        let table = self.locked_table()?;
        table.column(self.cursor?)
    }

    pub fn current_column_mut(&mut self) -> Option<&mut Column> {
        let cursor = self.cursor?;
        self.locked_table_mut()?.column_mut(cursor)
    }

    /// Moves the cursor to the next column. Past the last column the cursor
    /// stays at the end; it does not wrap.
    pub fn advance_column(&mut self) {
        let (Some(cursor), Some(table)) = (self.cursor, self.locked_table()) else {
            return;
        };
        let next = cursor + 1;
        self.cursor = (next < table.column_count()).then_some(next);
    }

    /// Stages `value` in the current column and advances.
    pub fn put(&mut self, value: impl Into<Value>) -> Result<(), Error> {
        if self.current_column().is_none() {
            let mut err = Error::new(ErrorKind::Usage).with_message(if self.is_locked() {
                "row already has a value for every column"
            } else {
                "no table is locked"
            });
            if let Some(table) = self.locked_table() {
                err = err.with_table(table.name());
            }
            return Err(err);
        }
        if let Some(column) = self.current_column_mut() {
            column.set(value);
        }
        self.advance_column();
        Ok(())
    }

    /// Writes the staged values of the locked table as one row.
    ///
    /// Opens the table first if needed, then rewinds the cursor to the first
    /// column. The lock is kept.
    pub fn commit_row(&mut self) -> Result<(), Error> {
        let Some(index) = self.locked else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("cannot commit a row: no table is locked")
                .with_hint("Lock a table before writing rows."));
        };
        let Some(table) = self.tables.get_mut(index) else {
            return Err(Error::new(ErrorKind::Internal).with_message("locked table vanished"));
        };

        if !table.is_open() {
            table.open(&self.options)?;
        }
        table.write_row()?;
        table.record_row();
        self.cursor = self.first_cursor(index);
        Ok(())
    }

    pub fn close_table(&mut self, name: &str) -> Result<(), Error> {
        match self.table_mut(name) {
            Some(table) => table.close(),
            None => Err(Error::new(ErrorKind::NotFound)
                .with_message("no such table")
                .with_table(name)),
        }
    }

    /// Closes every table, continuing past failures; returns the first one.
    pub fn close_all(&mut self) -> Result<(), Error> {
        let mut first_error = None;
        for table in self.tables.iter_mut() {
            if let Err(err) = table.close() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.unlock_table();
        if !self.options.auto_close {
            return;
        }
        for table in self.tables.iter_mut() {
            self.logger.scope(|| {
                tracing::debug!(table = %table.name(), "removing table from context");
            });
            if let Err(err) = table.close() {
                self.logger.scope(|| {
                    tracing::warn!(table = %table.name(), error = %err, "failed to close table");
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Context;
    use crate::core::column::Column;
    use crate::core::error::ErrorKind;
    use crate::core::options::SessionOptions;
    use crate::core::table::Table;
    use crate::core::value::Value;

    fn session(dir: &std::path::Path) -> Context {
        Context::new(SessionOptions {
            out_dir: Some(dir.to_path_buf()),
            source_file: "s".to_string(),
            ..SessionOptions::default()
        })
        .expect("context")
    }

    #[test]
    fn invalid_float_format_is_rejected_up_front() {
        let err = Context::new(SessionOptions {
            float_format: "%d".to_string(),
            ..SessionOptions::default()
        })
        .expect_err("bad format");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn duplicate_table_names_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        ctx.add_table(Table::new("t")).expect("add");
        let err = ctx.add_table(Table::new("t")).expect_err("dup");
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(ctx.tables().count(), 1);
    }

    #[test]
    fn lock_discipline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        ctx.add_table(Table::with_columns("a", ["x"])).expect("add");
        ctx.add_table(Table::with_columns("b", ["y"])).expect("add");

        assert_eq!(
            ctx.lock_table("missing").expect_err("missing").kind(),
            ErrorKind::NotFound
        );
        ctx.lock_table("a").expect("lock");
        assert_eq!(
            ctx.lock_table("b").expect_err("double lock").kind(),
            ErrorKind::Busy
        );
        assert_eq!(ctx.locked_table().map(Table::name), Some("a"));

        ctx.unlock_table();
        ctx.unlock_table();
        assert!(!ctx.is_locked());
        assert!(ctx.current_column().is_none());
        ctx.lock_table("b").expect("lock after unlock");
    }

    #[test]
    fn cursor_walks_columns_and_stops_at_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        ctx.add_table(Table::with_columns("t", ["a", "b"])).expect("add");
        ctx.advance_column();
        assert_eq!(ctx.cursor(), None);

        ctx.lock_table("t").expect("lock");
        assert_eq!(ctx.current_column().map(Column::name), Some("a"));
        ctx.advance_column();
        assert_eq!(ctx.current_column().map(Column::name), Some("b"));
        ctx.advance_column();
        assert!(ctx.current_column().is_none());
        ctx.advance_column();
        assert!(ctx.current_column().is_none());
        assert!(ctx.is_locked());
    }

    #[test]
    fn commit_requires_a_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        let err = ctx.commit_row().expect_err("no lock");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn commit_opens_lazily_and_rewinds_cursor() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        ctx.add_table(Table::with_columns("t", ["a", "b"])).expect("add");
        ctx.lock_table("t").expect("lock");
        assert!(!ctx.locked_table().expect("locked").is_open());

        ctx.put(1i64).expect("a");
        ctx.put(2i64).expect("b");
        assert_eq!(
            ctx.put(3i64).expect_err("row full").kind(),
            ErrorKind::Usage
        );
        ctx.commit_row().expect("commit");

        let table = ctx.locked_table().expect("locked");
        assert!(table.is_open());
        assert_eq!(table.row_count(), 1);
        assert_eq!(ctx.cursor(), Some(0));

        ctx.current_column_mut().expect("a").set_int(5);
        ctx.commit_row().expect("commit again");
        assert_eq!(ctx.locked_table().expect("locked").row_count(), 2);

        ctx.unlock_table();
        ctx.close_all().expect("close");
        let text = std::fs::read_to_string(dir.path().join("s.t.csv")).expect("read");
        assert_eq!(text, "1,2\n5,2\n");
    }

    #[test]
    fn put_without_lock_is_usage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        assert_eq!(
            ctx.put(Value::None).expect_err("no lock").kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn table_sequence_operations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        for name in ["a", "b", "c"] {
            ctx.add_table(Table::new(name)).expect("add");
        }
        assert_eq!(ctx.first_table().map(Table::name), Some("a"));
        assert_eq!(ctx.last_table().map(Table::name), Some("c"));

        ctx.lock_table("a").expect("lock");
        assert_eq!(
            ctx.remove_table("b").expect_err("locked").kind(),
            ErrorKind::Busy
        );
        ctx.unlock_table();

        let removed = ctx.remove_table("b").expect("remove");
        assert_eq!(removed.name(), "b");
        let names: Vec<_> = ctx.tables().map(Table::name).collect();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(
            ctx.remove_table("b").expect_err("gone").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ctx.close_table("b").expect_err("gone").kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn table_names_stay_unique_across_renames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = session(dir.path());
        ctx.add_table(Table::new("a")).expect("add");
        ctx.add_table(Table::new("b")).expect("add");

        let err = ctx
            .table_mut("b")
            .expect("b")
            .set_name("a")
            .expect_err("direct rename");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(
            ctx.rename_table("b", "a").expect_err("taken").kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            ctx.rename_table("zzz", "c").expect_err("missing").kind(),
            ErrorKind::NotFound
        );

        ctx.rename_table("b", "c").expect("rename");
        ctx.rename_table("c", "c").expect("same name");
        let names: Vec<_> = ctx.tables().map(Table::name).collect();
        assert_eq!(names, ["a", "c"]);

        let mut removed = ctx.remove_table("c").expect("remove");
        removed.set_name("free").expect("unregistered rename");
        assert_eq!(removed.name(), "free");
    }

    #[test]
    fn drop_closes_open_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut ctx = session(dir.path());
            ctx.add_table(Table::with_columns("t", ["a"])).expect("add");
            ctx.lock_table("t").expect("lock");
            ctx.put(7i64).expect("put");
            ctx.commit_row().expect("commit");
        }
        let text = std::fs::read_to_string(dir.path().join("s.t.csv")).expect("read");
        assert_eq!(text, "7\n");
    }
}
