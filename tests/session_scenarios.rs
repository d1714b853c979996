// End-to-end session flows through the public API.
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tablesink::api::{Context, ErrorKind, SessionOptions, Sink, Table, Value};

fn options(dir: &Path) -> SessionOptions {
    SessionOptions {
        out_dir: Some(dir.to_path_buf()),
        source_file: "input.sql".to_string(),
        ..SessionOptions::default()
    }
}

fn write_row(ctx: &mut Context, table: &str, values: Vec<Value>) {
    ctx.lock_table(table).expect("lock");
    for value in values {
        ctx.put(value).expect("put");
    }
    ctx.commit_row().expect("commit");
    ctx.unlock_table();
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read output")
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn header_types_and_two_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(SessionOptions {
        add_header: true,
        add_types: true,
        ..options(dir.path())
    })
    .expect("context");
    ctx.add_table(Table::with_columns("t", ["id", "v"]))
        .expect("add");

    write_row(&mut ctx, "t", vec![Value::Int(1), Value::Float(1.5)]);
    write_row(&mut ctx, "t", vec![Value::Int(2), Value::Float(2.25)]);
    assert_eq!(ctx.table("t").expect("t").row_count(), 2);
    ctx.close_all().expect("close");

    assert_eq!(
        lines(&dir.path().join("input.sql.t.csv")),
        ["id,v", "# id:int,v:float", "1,1.500000", "2,2.250000"]
    );
}

#[test]
fn untyped_column_rejects_row_and_keeps_earlier_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(options(dir.path())).expect("context");
    ctx.add_table(Table::with_columns("t", ["a", "b"]))
        .expect("add");
    write_row(&mut ctx, "t", vec![Value::Int(1), Value::Int(10)]);

    ctx.add_table(Table::with_columns("u", ["a", "b"]))
        .expect("add");
    ctx.lock_table("u").expect("lock");
    ctx.put(5i64).expect("put");
    let err = ctx.commit_row().expect_err("second column is none");
    assert_eq!(err.kind(), ErrorKind::InvalidType);
    assert!(err.kind().is_contract_violation());
    assert_eq!(err.column(), Some("b"));
    assert_eq!(ctx.table("u").expect("u").row_count(), 0);
    drop(ctx);

    assert_eq!(lines(&dir.path().join("input.sql.t.csv")), ["1,10"]);
    assert_eq!(lines(&dir.path().join("input.sql.u.csv")), Vec::<String>::new());
}

#[test]
fn appending_session_skips_header_for_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = SessionOptions {
        add_header: true,
        add_types: true,
        dont_drop: true,
        ..options(dir.path())
    };

    for value in [1i64, 2] {
        let mut ctx = Context::new(session.clone()).expect("context");
        ctx.add_table(Table::with_columns("t", ["n"])).expect("add");
        write_row(&mut ctx, "t", vec![Value::Int(value)]);
    }

    assert_eq!(
        lines(&dir.path().join("input.sql.t.csv")),
        ["n", "# n:int", "1", "2"]
    );
}

#[test]
fn truncating_session_rewrites_header() {
    let dir = tempfile::tempdir().expect("tempdir");
    let session = SessionOptions {
        add_header: true,
        ..options(dir.path())
    };

    for value in [1i64, 2] {
        let mut ctx = Context::new(session.clone()).expect("context");
        ctx.add_table(Table::with_columns("t", ["n"])).expect("add");
        write_row(&mut ctx, "t", vec![Value::Int(value)]);
    }

    assert_eq!(lines(&dir.path().join("input.sql.t.csv")), ["n", "2"]);
}

#[test]
fn every_row_has_one_field_per_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(SessionOptions {
        add_header: true,
        add_types: true,
        float_format: "%g".to_string(),
        ..options(dir.path())
    })
    .expect("context");
    let columns = ["a", "b", "c", "d"];
    ctx.add_table(Table::with_columns("wide", columns))
        .expect("add");

    let rows = 25;
    for i in 0..rows {
        let values = (0..columns.len())
            .map(|c| {
                if c % 2 == 0 {
                    Value::Int(i * 10 + c as i64)
                } else {
                    Value::Float(i as f64 / 4.0)
                }
            })
            .collect();
        write_row(&mut ctx, "wide", values);
    }
    ctx.close_all().expect("close");

    let out = lines(&dir.path().join("input.sql.wide.csv"));
    let body = &out[2..];
    assert_eq!(body.len(), rows as usize);
    for line in body {
        assert_eq!(line.split(',').count(), columns.len(), "{line}");
    }
    assert_eq!(body[1], "10,0.25,12,0.25");
}

#[test]
fn open_close_unlock_twice_match_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(SessionOptions {
        add_header: true,
        ..options(dir.path())
    })
    .expect("context");
    ctx.add_table(Table::with_columns("t", ["a"])).expect("add");

    let session = ctx.options().clone();
    let table = ctx.table_mut("t").expect("t");
    table.open(&session).expect("open");
    table.open(&session).expect("open again");
    table.close().expect("close");
    table.close().expect("close again");
    ctx.unlock_table();
    ctx.unlock_table();
    assert!(!ctx.is_locked());

    assert_eq!(lines(&dir.path().join("input.sql.t.csv")), ["a"]);
}

#[test]
fn lock_registration_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(options(dir.path())).expect("context");
    ctx.add_table(Table::new("a")).expect("add");
    ctx.add_table(Table::new("b")).expect("add");

    assert_eq!(
        ctx.add_table(Table::new("a")).expect_err("dup").kind(),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        ctx.lock_table("zzz").expect_err("unknown").kind(),
        ErrorKind::NotFound
    );
    ctx.lock_table("a").expect("lock");
    assert_eq!(
        ctx.lock_table("b").expect_err("double").kind(),
        ErrorKind::Busy
    );
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<u8>>>);

impl Write for Shared {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn attached_sink_receives_rows() {
    let shared = Shared::default();
    let session = SessionOptions {
        add_header: true,
        float_format: "%.1e".to_string(),
        ..SessionOptions::default()
    };
    let mut ctx = Context::new(session.clone()).expect("context");
    ctx.add_table(Table::with_columns("mem", ["x"])).expect("add");
    ctx.table_mut("mem")
        .expect("mem")
        .attach(Sink::from_writer(shared.clone()), &session)
        .expect("attach");

    write_row(&mut ctx, "mem", vec![Value::Float(12345.0)]);
    ctx.close_table("mem").expect("close");

    let text = String::from_utf8(shared.0.lock().expect("lock").clone()).expect("utf8");
    assert_eq!(text, "x\n1.2e+04\n");
}

#[cfg(feature = "gzip")]
#[test]
fn compressed_session_writes_gzip() {
    use flate2::read::MultiGzDecoder;
    use std::io::Read;

    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(SessionOptions {
        compress: true,
        add_header: true,
        ..options(dir.path())
    })
    .expect("context");
    ctx.add_table(Table::with_columns("z", ["a"])).expect("add");
    write_row(&mut ctx, "z", vec![Value::Int(3)]);
    drop(ctx);

    let path = dir.path().join("input.sql.z.csv.gz");
    let mut text = String::new();
    MultiGzDecoder::new(std::fs::File::open(&path).expect("open"))
        .read_to_string(&mut text)
        .expect("decode");
    assert_eq!(text, "a\n3\n");
}

#[cfg(not(feature = "gzip"))]
#[test]
fn compression_without_support_is_unsupported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut ctx = Context::new(SessionOptions {
        compress: true,
        ..options(dir.path())
    })
    .expect("context");
    ctx.add_table(Table::with_columns("z", ["a"])).expect("add");
    ctx.lock_table("z").expect("lock");
    ctx.put(1i64).expect("put");
    assert_eq!(
        ctx.commit_row().expect_err("no gzip").kind(),
        ErrorKind::Unsupported
    );
}
