use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::errors::Result;
use crate::fingerprint::hashing::{HashToken, Token};
use crate::persistance::{
    distinct_in_order, Catalog, CatalogStats, FingerprintIndex, NewTrack, TokenOccurrence,
    Track, TrackId, TrackStore,
};

/// Upper bound on bound parameters per lookup statement.
const LOOKUP_BATCH: usize = 500;

/// File behind a `sqlite:` url, or `None` for in-memory databases.
fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();

    if path.is_empty() || path == ":memory:" || url.contains("mode=memory") {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// SQLite-backed catalog.
pub struct Database {
    connection: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let file = database_file(url);
        if let Some(parent) = file.as_deref().and_then(|f| f.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // an in-memory database lives and dies with its only connection
        let pool = SqlitePoolOptions::new().min_connections(1);
        let (options, pool) = match file {
            Some(_) => (
                options.journal_mode(SqliteJournalMode::Wal),
                pool.max_connections(8),
            ),
            None => (
                options,
                pool.max_connections(1)
                    .idle_timeout(None::<Duration>)
                    .max_lifetime(None::<Duration>),
            ),
        };

        let connection = pool.connect_with(options).await?;

        let this = Self { connection };
        this.ensure_schema().await?;
        Ok(this)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracks (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                title    TEXT NOT NULL,
                artist   TEXT NOT NULL,
                duration REAL NOT NULL
            );
            "#
        ).execute(&self.connection).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS occurrences (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                hash        INTEGER NOT NULL,
                track_id    INTEGER NOT NULL REFERENCES tracks(id),
                time_offset REAL NOT NULL
            );
            "#
        ).execute(&self.connection).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_occurrences_hash ON occurrences(hash);"
        ).execute(&self.connection).await?;

        Ok(())
    }
}

async fn insert_track(conn: &mut SqliteConnection, track: &NewTrack) -> Result<TrackId> {
    let row = sqlx::query(
        r#"
        INSERT INTO tracks (title, artist, duration)
        VALUES (?, ?, ?)
        RETURNING id
        "#
    )
    .bind(&track.title)
    .bind(&track.artist)
    .bind(track.duration)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.try_get("id")?)
}

async fn insert_occurrences(conn: &mut SqliteConnection, track_id: TrackId, tokens: &[Token])
    -> Result<()> {

    for token in tokens {
        sqlx::query(
            r#"
            INSERT INTO occurrences (hash, track_id, time_offset)
            VALUES (?, ?, ?)
            "#
        )
        .bind(token.hash.as_i64())
        .bind(track_id)
        .bind(token.offset)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl FingerprintIndex for Database {
    async fn insert(&self, track_id: TrackId, tokens: &[Token]) -> Result<()> {
        let mut tx = self.connection.begin().await?;
        insert_occurrences(&mut tx, track_id, tokens).await?;
        tx.commit().await?;
        debug!(track_id, occurrences = tokens.len(), "inserted occurrences");
        Ok(())
    }

    async fn lookup(&self, hashes: &[HashToken]) -> Result<Vec<TokenOccurrence>> {
        let query = distinct_in_order(hashes);
        if query.is_empty() {
            return Ok(vec![]);
        }

        let mut by_hash: HashMap<HashToken, Vec<TokenOccurrence>> = HashMap::new();

        for batch in query.chunks(LOOKUP_BATCH) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT hash, track_id, time_offset FROM occurrences WHERE hash IN ("
            );
            let mut separated = builder.separated(", ");
            for hash in batch {
                separated.push_bind(hash.as_i64());
            }
            separated.push_unseparated(") ORDER BY id");

            let rows = builder.build().fetch_all(&self.connection).await?;
            for row in rows {
                let hash = HashToken::from_i64(row.try_get("hash")?);
                by_hash.entry(hash).or_default().push(TokenOccurrence {
                    hash,
                    offset: row.try_get("time_offset")?,
                    track_id: row.try_get("track_id")?,
                });
            }
        }

        let mut hits = Vec::new();
        for hash in &query {
            if let Some(stored) = by_hash.remove(hash) {
                hits.extend(stored);
            }
        }

        debug!(tokens = query.len(), hits = hits.len(), "index lookup");
        Ok(hits)
    }
}

#[async_trait::async_trait]
impl TrackStore for Database {
    async fn add_track(&self, track: &NewTrack) -> Result<TrackId> {
        let mut conn = self.connection.acquire().await?;
        insert_track(&mut conn, track).await
    }

    async fn track(&self, id: TrackId) -> Result<Option<Track>> {
        let row = sqlx::query(
            "SELECT id, title, artist, duration FROM tracks WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.connection)
        .await?;

        row.map(|row| -> Result<Track> {
            Ok(Track {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                artist: row.try_get("artist")?,
                duration: row.try_get("duration")?,
            })
        })
        .transpose()
    }

    async fn stats(&self) -> Result<CatalogStats> {
        let songs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.connection)
            .await?;
        let fingerprints: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM occurrences")
            .fetch_one(&self.connection)
            .await?;

        Ok(CatalogStats { songs: songs as u64, fingerprints: fingerprints as u64 })
    }
}

#[async_trait::async_trait]
impl Catalog for Database {
    async fn add_track_with_tokens(&self, track: &NewTrack, tokens: &[Token]) -> Result<TrackId> {
        let mut tx = self.connection.begin().await?;
        let track_id = insert_track(&mut tx, track).await?;
        insert_occurrences(&mut tx, track_id, tokens).await?;
        tx.commit().await?;

        debug!(track_id, occurrences = tokens.len(), "added track");
        Ok(track_id)
    }
}
