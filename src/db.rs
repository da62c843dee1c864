use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection};

use crate::model::DirectorDealing;

pub fn connect(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Let open() report a missing directory it could not create.
        let _ = std::fs::create_dir_all(parent);
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn connect_in_memory() -> rusqlite::Result<Connection> {
    Connection::open_in_memory()
}

/// Bound how long a write may wait on a locked database.
pub fn set_write_timeout(conn: &Connection, timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(timeout)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        -- One row per dispatch. No natural key: re-running inserts duplicates.
        CREATE TABLE IF NOT EXISTS director_dealings (
            id          INTEGER PRIMARY KEY,
            stock_code  TEXT NOT NULL,
            date        TEXT NOT NULL,
            beneficiary TEXT NOT NULL,
            deal_type   TEXT NOT NULL,
            value       INTEGER NOT NULL CHECK(value >= 0),
            volume      INTEGER NOT NULL CHECK(volume >= 0),
            price       REAL NOT NULL CHECK(price >= 0),
            run_id      TEXT,
            inserted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_dealings_stock ON director_dealings(stock_code);

        CREATE TABLE IF NOT EXISTS scrape_runs (
            run_id      TEXT PRIMARY KEY,
            url         TEXT NOT NULL,
            stock_code  TEXT NOT NULL,
            rows_seen   INTEGER NOT NULL,
            records     INTEGER NOT NULL,
            delivered   INTEGER NOT NULL,
            row_errors  INTEGER NOT NULL,
            sink_errors INTEGER NOT NULL,
            started_at  TEXT NOT NULL,
            finished_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
}

// ── Dealings ──

pub fn insert_dealing(
    conn: &Connection,
    run_id: Option<&str>,
    d: &DirectorDealing,
) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO director_dealings
            (stock_code, date, beneficiary, deal_type, value, volume, price, run_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    stmt.execute(params![
        d.stock_code(),
        d.date(),
        d.beneficiary(),
        d.deal_type(),
        d.value(),
        d.volume(),
        d.price() as f64,
        run_id,
    ])?;
    Ok(conn.last_insert_rowid())
}

pub struct StoredDealing {
    pub id: i64,
    pub dealing: DirectorDealing,
    pub run_id: Option<String>,
    pub inserted_at: String,
}

/// Most recent first.
pub fn fetch_recent(
    conn: &Connection,
    stock_code: &str,
    limit: usize,
) -> rusqlite::Result<Vec<StoredDealing>> {
    let mut stmt = conn.prepare(
        "SELECT id, stock_code, date, beneficiary, deal_type, value, volume, price,
                run_id, inserted_at
         FROM director_dealings
         WHERE stock_code = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![stock_code, limit as i64], |row| {
            let price: f64 = row.get(7)?;
            Ok(StoredDealing {
                id: row.get(0)?,
                dealing: DirectorDealing::new(
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    price as f32,
                ),
                run_id: row.get(8)?,
                inserted_at: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Runs ──

pub struct RunRow<'a> {
    pub run_id: &'a str,
    pub url: &'a str,
    pub stock_code: &'a str,
    pub rows_seen: usize,
    pub records: usize,
    pub delivered: usize,
    pub row_errors: usize,
    pub sink_errors: usize,
    pub started_at: &'a str,
}

pub fn insert_run(conn: &Connection, run: &RunRow<'_>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO scrape_runs
            (run_id, url, stock_code, rows_seen, records, delivered, row_errors, sink_errors,
             started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            run.run_id,
            run.url,
            run.stock_code,
            run.rows_seen as i64,
            run.records as i64,
            run.delivered as i64,
            run.row_errors as i64,
            run.sink_errors as i64,
            run.started_at,
        ],
    )?;
    Ok(())
}

pub fn count_runs(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM scrape_runs", [], |row| row.get(0))
}
