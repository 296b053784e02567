use crate::config::CacheConfig;
use crate::errors::{LookupError, Result, UnavailableReason};
use crate::observe::{CacheEvent, CacheObserver, LogObserver};
use crate::store::{ConnectionProvider, PerCallConnection, ProgressHandlerReset};
use crate::types::{CachedRecord, Category};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum LookupStatus {
    Answered,
    Unavailable(UnavailableReason),
}

/// Result of a lookup together with whether the store actually answered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupOutcome {
    pub records: Vec<CachedRecord>,
    pub status: LookupStatus,
}

impl LookupOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self.status, LookupStatus::Unavailable(_))
    }
}

/// Best-effort title search over the cache.
///
/// Only [`LookupError::InvalidCategory`] is ever returned. Every store
/// failure becomes an empty result plus one `Unavailable` event on the
/// observer.
pub struct CacheLookup<P: ConnectionProvider = PerCallConnection> {
    provider: Arc<P>,
    categories: Vec<Category>,
    observer: Arc<dyn CacheObserver>,
    deadline: Option<Duration>,
}

impl CacheLookup<PerCallConnection> {
    /// Per-call lookup against the configured store.
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut lookup = Self::new(
            PerCallConnection::new(&config.db_path),
            config.categories.iter().copied(),
        );
        lookup.deadline = config.timeout();
        lookup
    }
}

impl<P: ConnectionProvider> CacheLookup<P> {
    pub fn new(provider: P, categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            provider: Arc::new(provider),
            categories: categories.into_iter().collect(),
            observer: Arc::new(LogObserver),
            deadline: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Records in `category` whose title contains `term`, ignoring ASCII case.
    pub async fn lookup(&self, term: &str, category: Category) -> Result<Vec<CachedRecord>> {
        Ok(self.search(term, category).await?.records)
    }

    /// Same as [`lookup`](Self::lookup) for a category name from the outside world.
    pub async fn lookup_named(&self, term: &str, category: &str) -> Result<Vec<CachedRecord>> {
        let category: Category = category.parse()?;
        self.lookup(term, category).await
    }

    /// Like [`lookup`](Self::lookup), but reports whether the store answered.
    pub async fn search(&self, term: &str, category: Category) -> Result<LookupOutcome> {
        let table = self.resolve(category)?;
        let needle = term.to_string();
        let deadline = self.deadline.and_then(|d| Instant::now().checked_add(d));
        let provider = Arc::clone(&self.provider);

        let joined = tokio::task::spawn_blocking(move || {
            provider.with_connection(|conn| fetch_matching(conn, table, &needle, deadline))
        })
        .await;

        let outcome = match joined {
            Ok(Ok(records)) => {
                self.observer.record(&CacheEvent::Answered {
                    category,
                    term_len: term.chars().count(),
                    rows: records.len(),
                });
                LookupOutcome {
                    records,
                    status: LookupStatus::Answered,
                }
            }
            Ok(Err(e)) => self.unavailable(category, e.unavailable_reason(), e.to_string()),
            Err(e) => self.unavailable(category, UnavailableReason::QueryFailed, e.to_string()),
        };
        Ok(outcome)
    }

    fn resolve(&self, category: Category) -> Result<&'static str> {
        if !self.categories.contains(&category) {
            log::error!("Lookup requested disabled category: {}", category);
            return Err(LookupError::InvalidCategory(category.to_string()));
        }
        Ok(category.table_name())
    }

    fn unavailable(&self, category: Category, reason: UnavailableReason, detail: String) -> LookupOutcome {
        log::debug!(
            "Cache at {} could not answer for {}: {}",
            self.provider.describe(),
            category,
            detail
        );
        self.observer.record(&CacheEvent::Unavailable {
            category,
            reason,
            detail,
        });
        LookupOutcome {
            records: Vec::new(),
            status: LookupStatus::Unavailable(reason),
        }
    }
}

fn fetch_matching(
    conn: &Connection,
    table: &'static str,
    needle: &str,
    deadline: Option<Instant>,
) -> Result<Vec<CachedRecord>> {
    let _reset = ProgressHandlerReset::new(conn);
    if let Some(deadline) = deadline {
        conn.progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
    }
    run_query(conn, table, needle)
}

fn run_query(conn: &Connection, table: &'static str, needle: &str) -> Result<Vec<CachedRecord>> {
    // `table` comes from Category::table_name, never from caller input.
    // instr() has no pattern syntax and no pattern length cap, unlike LIKE.
    let sql = format!(
        r#"SELECT * FROM "{}" WHERE instr(lower(title), lower(?1)) > 0"#,
        table
    );
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let records = stmt
        .query_map([needle], |row| CachedRecord::from_row(row, &names))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}
