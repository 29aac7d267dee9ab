//! Append-only persistence (C7): one `rusqlite::Connection` per venue
//! supervisor, owned exclusively by that task, matching the reference
//! schema's three relations and its forward-compatible `fills` migration.

use rusqlite::{params, Connection};
use rust_decimal::prelude::*;

use crate::errors::{ArbitError, ArbitResult};
use crate::models::{Fill, TriangleAttempt};
use crate::triangle::Triangle;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if absent) the database at `path` and ensure schema.
    pub fn open(path: &str) -> ArbitResult<Self> {
        let conn = Connection::open(path).map_err(|e| ArbitError::Fatal(format!("open sqlite: {e}")))?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> ArbitResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| ArbitError::Fatal(format!("open sqlite: {e}")))?;
        let store = Self { conn };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> ArbitResult<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS triangles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    leg_ab TEXT NOT NULL,
                    leg_bc TEXT NOT NULL,
                    leg_ac TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS fills (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_id TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    side TEXT NOT NULL,
                    price REAL NOT NULL,
                    quantity REAL NOT NULL,
                    fee REAL NOT NULL,
                    timestamp_ms INTEGER
                );
                CREATE TABLE IF NOT EXISTS triangle_attempts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ts_ms INTEGER,
                    venue TEXT,
                    leg_ab TEXT,
                    leg_bc TEXT,
                    leg_ac TEXT,
                    ok INTEGER,
                    net_est REAL,
                    realized_usdt REAL,
                    threshold_bps REAL,
                    notional_usd REAL,
                    slippage_bps REAL,
                    dry_run INTEGER,
                    latency_ms REAL,
                    skip_reasons TEXT,
                    ab_bid REAL, ab_ask REAL,
                    bc_bid REAL, bc_ask REAL,
                    ac_bid REAL, ac_ask REAL,
                    qty_base REAL
                );
                ",
            )
            .map_err(|e| ArbitError::Fatal(format!("create schema: {e}")))?;

        // Forward-compatible migration: add any columns to `fills` that an
        // older database file predates.
        let mut existing_cols = std::collections::HashSet::new();
        {
            let mut stmt = self
                .conn
                .prepare("PRAGMA table_info(fills)")
                .map_err(|e| ArbitError::Fatal(format!("table_info: {e}")))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .map_err(|e| ArbitError::Fatal(format!("table_info: {e}")))?;
            for row in rows {
                existing_cols.insert(row.map_err(|e| ArbitError::Fatal(e.to_string()))?);
            }
        }
        let wanted_cols: &[(&str, &str)] = &[
            ("venue", "TEXT"),
            ("leg", "TEXT"),
            ("tif", "TEXT"),
            ("order_type", "TEXT"),
            ("fee_rate", "REAL"),
            ("notional", "REAL"),
            ("dry_run", "INTEGER"),
            ("attempt_id", "INTEGER"),
        ];
        for (name, ty) in wanted_cols {
            if !existing_cols.contains(*name) {
                self.conn
                    .execute(&format!("ALTER TABLE fills ADD COLUMN {name} {ty}"), [])
                    .map_err(|e| ArbitError::Fatal(format!("alter fills: {e}")))?;
            }
        }
        Ok(())
    }

    pub fn insert_triangle(&self, tri: &Triangle) -> ArbitResult<i64> {
        self.conn
            .execute(
                "INSERT INTO triangles (leg_ab, leg_bc, leg_ac) VALUES (?1, ?2, ?3)",
                params![tri.leg_ab, tri.leg_bc, tri.leg_ac],
            )
            .map_err(|e| ArbitError::Fatal(format!("insert triangle: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Insert one attempt and its associated fills in a single transaction,
    /// matching the "written after the attempt concludes, in one
    /// transaction with any associated fills" invariant.
    pub fn record_attempt(&mut self, attempt: &TriangleAttempt, fills: &[Fill]) -> ArbitResult<i64> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| ArbitError::Fatal(format!("begin tx: {e}")))?;

        tx.execute(
            "INSERT INTO triangle_attempts (
                ts_ms, venue, leg_ab, leg_bc, leg_ac, ok, net_est, realized_usdt,
                threshold_bps, notional_usd, slippage_bps, dry_run, latency_ms,
                skip_reasons, ab_bid, ab_ask, bc_bid, bc_ask, ac_bid, ac_ask, qty_base
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
            params![
                attempt.ts_ms,
                attempt.venue,
                attempt.leg_ab,
                attempt.leg_bc,
                attempt.leg_ac,
                attempt.ok as i64,
                attempt.net_est,
                attempt.realized_usdt.and_then(|d| d.to_f64()),
                attempt.threshold_bps,
                attempt.notional_usd,
                attempt.slippage_bps,
                attempt.dry_run as i64,
                attempt.latency_ms,
                attempt.skip_reasons_csv(),
                attempt.ab.bid,
                attempt.ab.ask,
                attempt.bc.bid,
                attempt.bc.ask,
                attempt.ac.bid,
                attempt.ac.ask,
                attempt.qty_base,
            ],
        )
        .map_err(|e| ArbitError::Fatal(format!("insert attempt: {e}")))?;
        let attempt_id = tx.last_insert_rowid();

        for fill in fills {
            tx.execute(
                "INSERT INTO fills (
                    order_id, symbol, side, price, quantity, fee, timestamp_ms,
                    venue, leg, tif, order_type, fee_rate, notional, dry_run, attempt_id
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                params![
                    fill.id,
                    fill.symbol,
                    fill.side.to_string(),
                    fill.price.to_f64(),
                    fill.qty.to_f64(),
                    fill.fee.to_f64(),
                    fill.timestamp_ms,
                    fill.venue,
                    fill.leg.to_string(),
                    fill.tif,
                    fill.order_type,
                    fill.fee_rate.to_f64(),
                    fill.notional.to_f64(),
                    fill.dry_run as i64,
                    attempt_id,
                ],
            )
            .map_err(|e| ArbitError::Fatal(format!("insert fill: {e}")))?;
        }

        tx.commit().map_err(|e| ArbitError::Fatal(format!("commit tx: {e}")))?;
        Ok(attempt_id)
    }

    pub fn count_attempts(&self) -> ArbitResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM triangle_attempts", [], |row| row.get(0))
            .map_err(|e| ArbitError::Fatal(format!("count attempts: {e}")))
    }

    pub fn count_fills(&self) -> ArbitResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM fills", [], |row| row.get(0))
            .map_err(|e| ArbitError::Fatal(format!("count fills: {e}")))
    }
}
