use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use rusqlite_migration::{Migrations, M};

use crate::app::{CatalogError, Result};
use crate::domain::{FetchLogEntry, Item, ItemMetadata, NewFetchLog, Review};
use crate::store::{
    clamp_limit, clamp_offset, BatchOutcome, SearchFilters, Store, UpsertOutcome,
};

const ITEM_COLUMNS: &str = "id, external_id, title, description, price, list_price, release_date,
     thumbnail_url, sample_media_url, sample_images, outbound_url, page_url, volume,
     review_count, review_average, metadata, created_at, updated_at";

const UPSERT_ITEM: &str = "INSERT INTO items (
         external_id, title, description, price, list_price, release_date,
         thumbnail_url, sample_media_url, sample_images, outbound_url, page_url, volume,
         review_count, review_average, maker, metadata, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
     ON CONFLICT(external_id) DO UPDATE SET
         title = excluded.title,
         description = excluded.description,
         price = excluded.price,
         list_price = excluded.list_price,
         release_date = excluded.release_date,
         thumbnail_url = excluded.thumbnail_url,
         sample_media_url = excluded.sample_media_url,
         sample_images = excluded.sample_images,
         outbound_url = excluded.outbound_url,
         page_url = excluded.page_url,
         volume = excluded.volume,
         review_count = excluded.review_count,
         review_average = excluded.review_average,
         maker = excluded.maker,
         metadata = excluded.metadata,
         updated_at = excluded.updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn).map_err(|e| {
            tracing::error!(error = %e, "Database migration failed");
            CatalogError::StorageUnavailable(e.to_string())
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| CatalogError::StorageUnavailable(e.to_string()))
    }

    fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
        let review_count: Option<i64> = row.get(13)?;
        let review_average: Option<f64> = row.get(14)?;
        let review = match (review_count, review_average) {
            (None, None) => None,
            (count, average) => Some(Review {
                count: count.unwrap_or(0),
                average: average.unwrap_or(0.0),
            }),
        };

        Ok(Item {
            id: row.get(0)?,
            external_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            price: row.get(4)?,
            list_price: row.get(5)?,
            release_date: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok()),
            thumbnail_url: row.get(7)?,
            sample_media_url: row.get(8)?,
            sample_images: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            outbound_url: row.get(10)?,
            page_url: row.get(11)?,
            volume: row.get(12)?,
            review,
            metadata: row
                .get::<_, Option<String>>(15)?
                .and_then(|s| serde_json::from_str::<ItemMetadata>(&s).ok())
                .unwrap_or_default(),
            created_at: timestamp_at(row, 16)?,
            updated_at: timestamp_at(row, 17)?,
        })
    }

    fn row_to_fetch_log(row: &Row) -> rusqlite::Result<FetchLogEntry> {
        let kind: String = row.get(1)?;
        let status: String = row.get(2)?;
        Ok(FetchLogEntry {
            id: row.get(0)?,
            kind: kind.parse().map_err(|e: String| decode_failure(1, e))?,
            status: status.parse().map_err(|e: String| decode_failure(2, e))?,
            items_fetched: row.get(3)?,
            message: row.get(4)?,
            elapsed_ms: row.get(5)?,
            created_at: timestamp_at(row, 6)?,
        })
    }

    /// Insert or update one item inside an open transaction.
    ///
    /// `updated_at` is forced past the stored value so that it strictly
    /// increases even when two writes land within the same microsecond.
    fn upsert_in(tx: &Transaction, item: &Item) -> Result<UpsertOutcome> {
        let previous: Option<(i64, DateTime<Utc>)> = tx
            .query_row(
                "SELECT id, updated_at FROM items WHERE external_id = ?1",
                params![item.external_id],
                |row| Ok((row.get(0)?, timestamp_at(row, 1)?)),
            )
            .optional()?;

        let mut now = Utc::now().trunc_subsecs(6);
        if let Some((_, last)) = previous {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }

        tx.execute(
            UPSERT_ITEM,
            params![
                item.external_id,
                item.title,
                item.description,
                item.price,
                item.list_price,
                item.release_date.map(|d| d.format(DATE_FORMAT).to_string()),
                item.thumbnail_url,
                item.sample_media_url,
                to_json_column(&item.sample_images, item.sample_images.is_empty()),
                item.outbound_url,
                item.page_url,
                item.volume,
                item.review.map(|r| r.count),
                item.review.map(|r| r.average),
                item.metadata.maker,
                to_json_column(&item.metadata, item.metadata.is_empty()),
                format_timestamp(now),
            ],
        )?;

        Ok(match previous {
            Some((id, _)) => UpsertOutcome { id, created: false },
            None => UpsertOutcome {
                id: tx.last_insert_rowid(),
                created: true,
            },
        })
    }

    /// WHERE fragment (leading ` AND ...` clauses) plus its bound values.
    fn filter_clause(filters: &SearchFilters) -> (String, Vec<SqlValue>) {
        let mut clause = String::new();
        let mut values = Vec::new();

        if let Some(keyword) = filters.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                clause.push_str(
                    " AND (title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR external_id LIKE ? ESCAPE '\\')",
                );
                let pattern = format!("%{}%", escape_like(keyword));
                for _ in 0..3 {
                    values.push(SqlValue::Text(pattern.clone()));
                }
            }
        }
        if let Some(maker) = filters.maker.as_deref().filter(|m| !m.trim().is_empty()) {
            clause.push_str(" AND maker = ?");
            values.push(SqlValue::Text(maker.trim().to_string()));
        }
        if let Some(from) = filters.released_from {
            clause.push_str(" AND release_date >= ?");
            values.push(SqlValue::Text(from.format(DATE_FORMAT).to_string()));
        }
        if let Some(to) = filters.released_to {
            clause.push_str(" AND release_date <= ?");
            values.push(SqlValue::Text(to.format(DATE_FORMAT).to_string()));
        }

        (clause, values)
    }
}

impl Store for SqliteStore {
    fn find_by_external_id(&self, external_id: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE external_id = ?1", ITEM_COLUMNS),
                params![external_id],
                Self::row_to_item,
            )
            .optional()?;

        Ok(result)
    }

    fn upsert(&self, item: &Item) -> Result<UpsertOutcome> {
        let mut conn = self.conn()?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = Self::upsert_in(&tx, item)?;
        tx.commit()?;

        Ok(outcome)
    }

    fn upsert_batch(&self, items: &[Item]) -> Result<BatchOutcome> {
        let mut conn = self.conn()?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = BatchOutcome::default();

        for item in items {
            if Self::upsert_in(&tx, item)?.created {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn search(&self, filters: &SearchFilters, limit: i64, offset: i64) -> Result<Vec<Item>> {
        let limit = clamp_limit(limit);
        let offset = clamp_offset(offset);
        let (clause, mut values) = Self::filter_clause(filters);
        values.push(SqlValue::Integer(limit));
        values.push(SqlValue::Integer(offset));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE 1=1{}
             ORDER BY release_date DESC, created_at DESC, id DESC
             LIMIT ? OFFSET ?",
            ITEM_COLUMNS, clause
        ))?;

        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn count(&self, filters: &SearchFilters) -> Result<i64> {
        let (clause, values) = Self::filter_clause(filters);

        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM items WHERE 1=1{}", clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn append_fetch_log(&self, entry: &NewFetchLog) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO fetch_logs (fetch_type, status, items_fetched, message, elapsed_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.kind.as_str(),
                entry.status.as_str(),
                entry.items_fetched,
                entry.message,
                entry.elapsed_ms,
                format_timestamp(Utc::now()),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn recent_fetch_logs(&self, limit: i64) -> Result<Vec<FetchLogEntry>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, fetch_type, status, items_fetched, message, elapsed_ms, created_at
             FROM fetch_logs ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit.max(1)], Self::row_to_fetch_log)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

fn decode_failure(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

/// Timestamp column `idx`; text that is not RFC 3339 is a decode error.
fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_failure(idx, format!("bad timestamp {:?}: {}", raw, e)))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json_column<T: serde::Serialize>(value: &T, empty: bool) -> Option<String> {
    if empty {
        None
    } else {
        serde_json::to_string(value).ok()
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
