use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::listing::{DateFilter, ListQuery, Page, PER_PAGE};
use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("storage timed out")] Timeout,
    #[error("storage error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence for submissions. Rows are appended by intake and removed
/// only by admin deletes.
#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    /// Atomic insert; the store assigns `id` and `created_at`.
    async fn insert(&self, new: NewSubmission) -> RepoResult<Submission>;
    /// Rows from `ip_address` created within `window` before `now`.
    /// Backends that stamp `created_at` themselves measure against their own
    /// clock and ignore `now`.
    async fn count_recent(&self, ip_address: &str, window: std::time::Duration, now: DateTime<Utc>) -> RepoResult<i64>;
    async fn list(&self, query: &ListQuery, now: DateTime<Utc>) -> RepoResult<Page>;
    async fn stats(&self, now: DateTime<Utc>) -> RepoResult<FeedbackStats>;
    /// Every row, newest first.
    async fn export_all(&self) -> RepoResult<Vec<Submission>>;
    async fn delete(&self, id: Id) -> RepoResult<()>;
    /// Deletes the ids that exist and returns how many were removed.
    async fn delete_many(&self, ids: &[Id]) -> RepoResult<u64>;
}

pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use tracing::{info, warn};

    const SNAPSHOT_FILE: &str = "feedback.json";

    #[derive(Clone, Default, Serialize, Deserialize)]
    struct State {
        rows: BTreeMap<Id, Submission>,
        next_id: Id,
    }

    /// Process-local store, optionally mirrored to a JSON snapshot.
    ///
    /// Mutations are staged on a copy, written to the snapshot, and only then
    /// swapped in, so a failed write leaves memory untouched.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        // one writer at a time; keeps snapshot order equal to commit order
        writer: Arc<tokio::sync::Mutex<()>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    fn internal(e: impl std::fmt::Display) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    impl InMemRepo {
        pub fn new() -> Self { Self::default() }

        /// Loads `<dir>/feedback.json` if present and rewrites it after every mutation.
        pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)), ..Self::default() }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), rows = s.rows.len(), "loaded feedback snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse snapshot, starting empty: {e}");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), "no snapshot, starting empty: {e}");
                    State::default()
                }
            }
        }

        /// Writes the snapshot off the async workers.
        async fn persist(&self, state: &State) -> RepoResult<()> {
            let Some(path) = self.snapshot_path.clone() else { return Ok(()) };
            let bytes = serde_json::to_vec_pretty(state).map_err(internal)?;
            tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                std::fs::write(&*path, bytes)
            })
            .await
            .map_err(internal)?
            .map_err(internal)
        }

        /// Stage, persist, swap. Runs as its own task so a caller that stops
        /// waiting (timeout) cannot leave the snapshot ahead of memory.
        async fn commit<T, F>(&self, change: F) -> RepoResult<T>
        where
            F: FnOnce(&mut State) -> RepoResult<T> + Send + 'static,
            T: Send + 'static,
        {
            let repo = self.clone();
            tokio::spawn(async move {
                let _writer = repo.writer.lock().await;
                let mut next = {
                    let current = repo.read()?;
                    current.clone()
                };
                let out = change(&mut next)?;
                repo.persist(&next).await?;
                *repo.write()? = next;
                Ok(out)
            })
            .await
            .map_err(internal)?
        }

        fn read(&self) -> RepoResult<std::sync::RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<std::sync::RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn count_where(s: &State, pred: impl Fn(&Submission) -> bool) -> i64 {
            s.rows.values().filter(|r| pred(r)).count() as i64
        }
    }

    #[async_trait]
    impl FeedbackRepo for InMemRepo {
        async fn insert(&self, new: NewSubmission) -> RepoResult<Submission> {
            self.commit(move |s| {
                s.next_id += 1;
                let row = Submission {
                    id: s.next_id,
                    name: new.name,
                    email: new.email,
                    message: new.message,
                    ip_address: new.ip_address,
                    user_agent: new.user_agent,
                    created_at: Utc::now(),
                };
                s.rows.insert(row.id, row.clone());
                Ok(row)
            })
            .await
        }

        async fn count_recent(&self, ip_address: &str, window: std::time::Duration, now: DateTime<Utc>) -> RepoResult<i64> {
            let since = now - Duration::from_std(window).map_err(internal)?;
            let s = self.read()?;
            Ok(Self::count_where(&s, |r| r.ip_address.as_deref() == Some(ip_address) && r.created_at > since))
        }

        async fn list(&self, query: &ListQuery, now: DateTime<Utc>) -> RepoResult<Page> {
            let s = self.read()?;
            let mut hits: Vec<Submission> = s.rows.values().filter(|r| query.matches(r, now)).cloned().collect();
            hits.sort_by(|a, b| query.compare(a, b));
            let total = hits.len() as i64;
            let items = hits.into_iter().skip(query.offset() as usize).take(PER_PAGE as usize).collect();
            Ok(Page::new(items, total, query))
        }

        async fn stats(&self, now: DateTime<Utc>) -> RepoResult<FeedbackStats> {
            let s = self.read()?;
            let (today_start, today_end) = DateFilter::Today.range(now);
            let week_start = now - Duration::days(7);
            Ok(FeedbackStats {
                total: s.rows.len() as i64,
                today: Self::count_where(&s, |r| r.created_at >= today_start && today_end.map_or(true, |e| r.created_at < e)),
                week: Self::count_where(&s, |r| r.created_at >= week_start),
            })
        }

        async fn export_all(&self) -> RepoResult<Vec<Submission>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.rows.values().cloned().collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn delete(&self, id: Id) -> RepoResult<()> {
            self.commit(move |s| s.rows.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)).await
        }

        async fn delete_many(&self, ids: &[Id]) -> RepoResult<u64> {
            {
                let s = self.read()?;
                if !ids.iter().any(|id| s.rows.contains_key(id)) {
                    return Ok(0);
                }
            }
            let ids = ids.to_vec();
            self.commit(move |s| Ok(ids.iter().filter(|id| s.rows.remove(*id).is_some()).count() as u64)).await
        }
    }
}

/// Postgres backed store. Schema lives in `migrations/`.
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres, QueryBuilder};

    use crate::listing::like_pattern;

    const COLUMNS: &str = "id, name, email, message, ip_address, user_agent, created_at";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }

        /// Appends the listing WHERE clause; every value is a bind.
        fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &ListQuery, now: DateTime<Utc>) {
            qb.push(" WHERE TRUE");
            if let Some(search) = &query.search {
                let pattern = like_pattern(search);
                qb.push(" AND (name ILIKE ").push_bind(pattern.clone())
                    .push(" ESCAPE '\\' OR email ILIKE ").push_bind(pattern.clone())
                    .push(" ESCAPE '\\' OR message ILIKE ").push_bind(pattern)
                    .push(" ESCAPE '\\')");
            }
            if let Some(filter) = query.date {
                let (start, end) = filter.range(now);
                qb.push(" AND created_at >= ").push_bind(start);
                if let Some(end) = end {
                    qb.push(" AND created_at < ").push_bind(end);
                }
            }
        }
    }

    fn internal(e: sqlx::Error) -> RepoError {
        RepoError::Internal(e.to_string())
    }

    #[async_trait]
    impl FeedbackRepo for PgRepo {
        async fn insert(&self, new: NewSubmission) -> RepoResult<Submission> {
            let sql = format!(
                "INSERT INTO feedback_manager (name, email, message, ip_address, user_agent) VALUES ($1,$2,$3,$4,$5) RETURNING {COLUMNS}"
            );
            sqlx::query_as::<_, Submission>(&sql)
                .bind(&new.name)
                .bind(&new.email)
                .bind(&new.message)
                .bind(new.ip_address.as_deref())
                .bind(new.user_agent.as_deref())
                .fetch_one(&self.pool).await.map_err(internal)
        }

        async fn count_recent(&self, ip_address: &str, window: std::time::Duration, _now: DateTime<Utc>) -> RepoResult<i64> {
            // created_at comes from the database clock, so the cutoff does too
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM feedback_manager WHERE ip_address = $1 AND created_at > now() - make_interval(secs => $2)",
            )
            .bind(ip_address)
            .bind(window.as_secs_f64())
            .fetch_one(&self.pool).await.map_err(internal)
        }

        async fn list(&self, query: &ListQuery, now: DateTime<Utc>) -> RepoResult<Page> {
            let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback_manager");
            Self::push_filters(&mut count, query, now);
            let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await.map_err(internal)?;

            let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM feedback_manager"));
            Self::push_filters(&mut select, query, now);
            // column and direction come from closed enums, never from input text
            select.push(format!(" ORDER BY {} {}, id {}", query.sort.column(), query.order.keyword(), query.order.keyword()));
            select.push(" LIMIT ").push_bind(PER_PAGE);
            select.push(" OFFSET ").push_bind(query.offset());
            let items = select.build_query_as::<Submission>().fetch_all(&self.pool).await.map_err(internal)?;
            Ok(Page::new(items, total, query))
        }

        async fn stats(&self, now: DateTime<Utc>) -> RepoResult<FeedbackStats> {
            let (today_start, today_end) = DateFilter::Today.range(now);
            let week_start = now - Duration::days(7);
            let (total, today, week) = sqlx::query_as::<_, (i64, i64, i64)>(r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE created_at >= $1 AND created_at < $2),
                       COUNT(*) FILTER (WHERE created_at >= $3)
                FROM feedback_manager
            "#)
                .bind(today_start)
                .bind(today_end.unwrap_or(now))
                .bind(week_start)
                .fetch_one(&self.pool).await.map_err(internal)?;
            Ok(FeedbackStats { total, today, week })
        }

        async fn export_all(&self) -> RepoResult<Vec<Submission>> {
            let sql = format!("SELECT {COLUMNS} FROM feedback_manager ORDER BY created_at DESC, id DESC");
            sqlx::query_as::<_, Submission>(&sql).fetch_all(&self.pool).await.map_err(internal)
        }

        async fn delete(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM feedback_manager WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn delete_many(&self, ids: &[Id]) -> RepoResult<u64> {
            if ids.is_empty() { return Ok(0); }
            let res = sqlx::query("DELETE FROM feedback_manager WHERE id = ANY($1)")
                .bind(ids)
                .execute(&self.pool).await.map_err(internal)?;
            Ok(res.rows_affected())
        }
    }
}

/// Runs a storage future under a deadline; expiry is a storage error.
pub async fn with_timeout<T>(limit: std::time::Duration, fut: impl std::future::Future<Output = RepoResult<T>>) -> RepoResult<T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| RepoError::Timeout)?
}
