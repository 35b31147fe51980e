use super::{CandidateQuery, Catalog, PropertyCandidate};
use crate::search::SearchFilters;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const CATEGORY_SEPARATOR: char = '\u{1f}';

const SELECT_PROPERTY: &str = r#"
SELECT p.id, p.title, p.price, p.area, p.bedrooms, p.property_type, p.location_id,
  (SELECT GROUP_CONCAT(c.category_id, char(31))
     FROM property_categories c
    WHERE c.property_id = p.id) AS categories
FROM properties p
"#;

/// Catalog backed by a local SQLite file.
///
/// Every query runs on the blocking pool; the connection itself is shared
/// behind a mutex.
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open an existing catalog read-only.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open catalog db: {}", db_path.display()))?;
        conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get::<_, i64>(0))
            .with_context(|| format!("Catalog db has no properties table: {}", db_path.display()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open (or create) a writable catalog with the schema in place.
    pub fn create(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create db parent dir: {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open catalog db: {}", db_path.display()))?;
        let catalog = Self::from_connection(conn);
        catalog.init_schema()?;
        Ok(catalog)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory catalog")?;
        let catalog = Self::from_connection(conn);
        catalog.init_schema()?;
        Ok(catalog)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn init_schema(&self) -> Result<()> {
        self.lock()
            .execute_batch(
                r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS properties (
  id TEXT PRIMARY KEY NOT NULL,
  title TEXT NOT NULL DEFAULT '',
  price REAL NOT NULL,
  area REAL NOT NULL,
  bedrooms INTEGER NOT NULL,
  property_type TEXT NOT NULL,
  location_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_properties_type_location ON properties(property_type, location_id);
CREATE INDEX IF NOT EXISTS idx_properties_type_price ON properties(property_type, price);

CREATE TABLE IF NOT EXISTS property_categories (
  property_id TEXT NOT NULL,
  category_id TEXT NOT NULL,
  PRIMARY KEY(property_id, category_id),
  FOREIGN KEY(property_id) REFERENCES properties(id) ON DELETE CASCADE
);
"#,
            )
            .context("Failed to initialize catalog schema")
    }

    /// Insert or replace a listing together with its categories.
    pub fn upsert_property(&self, property: &PropertyCandidate) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute(
            r#"
INSERT INTO properties (id, title, price, area, bedrooms, property_type, location_id)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(id) DO UPDATE SET
  title = excluded.title,
  price = excluded.price,
  area = excluded.area,
  bedrooms = excluded.bedrooms,
  property_type = excluded.property_type,
  location_id = excluded.location_id
"#,
            params![
                property.id,
                property.title,
                property.price,
                property.area,
                property.bedrooms as i64,
                property.property_type,
                property.location_id,
            ],
        )
        .with_context(|| format!("Failed to upsert property {}", property.id))?;
        tx.execute(
            "DELETE FROM property_categories WHERE property_id = ?1",
            params![property.id],
        )
        .context("Failed to clear property categories")?;
        for category in &property.category_ids {
            tx.execute(
                "INSERT INTO property_categories (property_id, category_id) VALUES (?1, ?2)",
                params![property.id, category],
            )
            .context("Failed to insert property category")?;
        }
        tx.commit().context("Failed to commit property upsert")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&guard)
        })
        .await
        .context("Join error in catalog query")?
    }
}

fn row_to_candidate(row: &Row<'_>) -> rusqlite::Result<PropertyCandidate> {
    let categories: Option<String> = row.get(7)?;
    Ok(PropertyCandidate {
        id: row.get(0)?,
        title: row.get(1)?,
        price: row.get(2)?,
        area: row.get(3)?,
        bedrooms: row.get::<_, i64>(4)?.max(0) as u32,
        property_type: row.get(5)?,
        location_id: row.get(6)?,
        category_ids: categories
            .map(|s| {
                s.split(CATEGORY_SEPARATOR)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn query_candidates(conn: &Connection, sql: &str, values: Vec<Value>) -> Result<Vec<PropertyCandidate>> {
    let mut stmt = conn
        .prepare(sql)
        .context("Failed to prepare catalog query")?;
    let rows = stmt
        .query_map(params_from_iter(values), row_to_candidate)
        .context("Failed to run catalog query")?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read catalog row")
}

/// `%text%` with LIKE wildcards escaped.
fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn build_search(filters: &SearchFilters, limit: usize) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(q) = &filters.query {
        clauses.push(r"(LOWER(p.title) LIKE ? ESCAPE '\' OR LOWER(p.id) LIKE ? ESCAPE '\')");
        let pattern = like_pattern(&q.to_lowercase());
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
    if let Some(loc) = &filters.location_id {
        clauses.push("p.location_id = ?");
        values.push(Value::Text(loc.clone()));
    }
    if let Some(bhk) = filters.bhk {
        clauses.push("p.bedrooms = ?");
        values.push(Value::Integer(bhk as i64));
    }
    if let Some(lo) = filters.min_price {
        clauses.push("p.price >= ?");
        values.push(Value::Real(lo));
    }
    if let Some(hi) = filters.max_price {
        clauses.push("p.price <= ?");
        values.push(Value::Real(hi));
    }

    let mut sql = SELECT_PROPERTY.to_string();
    if !clauses.is_empty() {
        sql.push_str("WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str("\nORDER BY p.id\nLIMIT ?");
    values.push(Value::Integer(limit as i64));
    (sql, values)
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn search(&self, filters: &SearchFilters, limit: usize) -> Result<Vec<PropertyCandidate>> {
        let (sql, values) = build_search(filters, limit);
        self.with_conn(move |conn| query_candidates(conn, &sql, values))
            .await
            .context("Catalog search failed")
    }

    async fn get_property(&self, id: &str) -> Result<Option<PropertyCandidate>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("{SELECT_PROPERTY}WHERE p.id = ?1"),
                params![id],
                row_to_candidate,
            )
            .optional()
            .with_context(|| format!("Failed to load property {id}"))
        })
        .await
    }

    async fn get_properties(&self, ids: &[String]) -> Result<Vec<PropertyCandidate>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("{SELECT_PROPERTY}WHERE p.id IN ({placeholders})\nORDER BY p.id");
        let values: Vec<Value> = ids.iter().map(|id| Value::Text(id.clone())).collect();
        self.with_conn(move |conn| query_candidates(conn, &sql, values))
            .await
    }

    async fn find_candidates(
        &self,
        target: &PropertyCandidate,
        query: CandidateQuery,
    ) -> Result<Vec<PropertyCandidate>> {
        let (low, high) = query.price_range(target.price);
        let sql = format!(
            "{SELECT_PROPERTY}WHERE p.property_type = ? AND p.id <> ?\n  AND (p.location_id = ? OR p.price BETWEEN ? AND ?)\nORDER BY p.id\nLIMIT ?"
        );
        let values = vec![
            Value::Text(target.property_type.clone()),
            Value::Text(target.id.clone()),
            Value::Text(target.location_id.clone()),
            Value::Real(low),
            Value::Real(high),
            Value::Integer(query.limit as i64),
        ];
        self.with_conn(move |conn| query_candidates(conn, &sql, values))
            .await
            .context("Candidate query failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::test_support::property;

    fn seeded() -> SqliteCatalog {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let mut villa = property("P5", 101_000.0, 1_000.0, 2, "L1", &[]);
        villa.property_type = "villa".to_string();
        for p in [
            property("P1", 100_000.0, 1_000.0, 2, "L1", &["pool", "gym"]),
            property("P2", 180_000.0, 1_400.0, 3, "L1", &["pool"]),
            property("P3", 120_000.0, 1_100.0, 2, "L2", &[]),
            property("P4", 400_000.0, 2_500.0, 4, "L3", &["golf"]),
            villa,
        ] {
            catalog.upsert_property(&p).unwrap();
        }
        catalog
    }

    fn ids(props: &[PropertyCandidate]) -> Vec<&str> {
        props.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn get_property_round_trips_categories() {
        let catalog = seeded();
        let p1 = catalog.get_property("P1").await.unwrap().unwrap();
        assert_eq!(p1, property("P1", 100_000.0, 1_000.0, 2, "L1", &["pool", "gym"]));
        assert!(catalog.get_property("P404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_applies_every_filter() {
        let catalog = seeded();
        let filters = SearchFilters {
            location_id: Some("L1".to_string()),
            bhk: Some(2),
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&filters, 10).await.unwrap()), vec!["P1", "P5"]);

        let filters = SearchFilters {
            query: Some("listing p4".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&filters, 10).await.unwrap()), vec!["P4"]);

        let filters = SearchFilters {
            min_price: Some(110_000.0),
            max_price: Some(200_000.0),
            ..Default::default()
        };
        assert_eq!(ids(&catalog.search(&filters, 10).await.unwrap()), vec!["P2", "P3"]);
        assert_eq!(catalog.search(&SearchFilters::default(), 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn like_wildcards_in_query_are_literal() {
        let catalog = seeded();
        let filters = SearchFilters {
            query: Some("%".to_string()),
            ..Default::default()
        };
        assert!(catalog.search(&filters, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn candidates_match_type_and_neighbourhood() {
        let catalog = seeded();
        let target = catalog.get_property("P1").await.unwrap().unwrap();
        let found = catalog
            .find_candidates(
                &target,
                CandidateQuery {
                    price_band: 0.3,
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["P2", "P3"]);
    }

    #[tokio::test]
    async fn batch_lookup_skips_unknown_ids() {
        let catalog = seeded();
        let found = catalog
            .get_properties(&["P4".to_string(), "nope".to_string(), "P1".to_string()])
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["P1", "P4"]);
        assert!(catalog.get_properties(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_catalog_opens_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let writable = SqliteCatalog::create(&path).unwrap();
            writable
                .upsert_property(&property("P1", 1.0, 1.0, 1, "L1", &[]))
                .unwrap();
        }
        let catalog = SqliteCatalog::open(&path).unwrap();
        assert!(catalog.get_property("P1").await.unwrap().is_some());
        assert!(catalog
            .upsert_property(&property("P2", 1.0, 1.0, 1, "L1", &[]))
            .is_err());
    }

    #[test]
    fn open_rejects_missing_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap();
        assert!(SqliteCatalog::open(&path).is_err());
    }
}
