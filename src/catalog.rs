use indoc::formatdoc;
use sqlx::PgPool;
use tracing::info;

use crate::{Error, Result, metrics};

/// Tables owned by the pipeline, in create order: the two staging landing
/// tables, the fact table, then the four dimensions. Drops reuse the same
/// order since every drop is `if exists` and no table references another.
pub const TABLE_NAMES: [&str; 7] = [
    "staging_events",
    "staging_songs",
    "songplays",
    "users",
    "songs",
    "artists",
    "time",
];

/// One executable statement plus a short label for logs and plan output.
#[derive(Clone, Debug)]
pub struct SqlAction {
    description: String,
    sql: String,
}

impl SqlAction {
    pub(crate) fn new(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

pub fn drop_actions(schema: &str) -> Vec<SqlAction> {
    TABLE_NAMES
        .iter()
        .map(|table| {
            SqlAction::new(
                format!("drop table {}", qualified_name(schema, table)),
                build_drop_table_sql(schema, table),
            )
        })
        .collect()
}

pub fn create_actions(schema: &str) -> Vec<SqlAction> {
    let builders: [(&str, fn(&str) -> String); 7] = [
        ("staging_events", build_staging_events_table_sql),
        ("staging_songs", build_staging_songs_table_sql),
        ("songplays", build_songplays_table_sql),
        ("users", build_users_table_sql),
        ("songs", build_songs_table_sql),
        ("artists", build_artists_table_sql),
        ("time", build_time_table_sql),
    ];
    builders
        .iter()
        .map(|(table, build_sql)| {
            SqlAction::new(
                format!("create table {}", qualified_name(schema, table)),
                build_sql(schema),
            )
        })
        .collect()
}

fn build_drop_table_sql(schema: &str, table: &str) -> String {
    format!("drop table if exists {}", qualified_name(schema, table))
}

fn build_staging_events_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            artist varchar(450),
            auth varchar(450),
            firstname varchar(450),
            gender varchar(50),
            iteminsession int,
            lastname varchar(450),
            length double precision,
            level varchar(450),
            location varchar(450),
            method varchar(450),
            page varchar(450),
            registration varchar(450),
            sessionid int,
            song varchar(65535),
            status int,
            ts bigint,
            useragent varchar(450),
            userid int
        )
        ",
        table = qualified_name(schema, "staging_events"),
    )
}

fn build_staging_songs_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            song_id varchar(256),
            artist_id varchar(256),
            artist_latitude double precision,
            artist_longitude double precision,
            artist_location varchar(450),
            artist_name varchar(65535),
            duration double precision,
            num_songs int,
            title varchar(65535),
            year int
        )
        ",
        table = qualified_name(schema, "staging_songs"),
    )
}

fn build_songplays_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            songplay_id bigserial primary key,
            start_time timestamp not null,
            user_id int not null,
            level varchar(50),
            song_id varchar(256) not null,
            artist_id varchar(256) not null,
            session_id int,
            location varchar(500),
            user_agent varchar(500)
        )
        ",
        table = qualified_name(schema, "songplays"),
    )
}

fn build_users_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            user_id int primary key,
            first_name varchar(500),
            last_name varchar(500),
            gender varchar(50),
            level varchar(50)
        )
        ",
        table = qualified_name(schema, "users"),
    )
}

// songs and artists declare their keys not null but carry no uniqueness
// constraint: the warehouse treats declared keys as informational, and the
// producing queries tolerate per-key multiplicity from the source files.

fn build_songs_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            song_id varchar(256) not null,
            title varchar(65535) not null,
            artist_id varchar(256) not null,
            year int,
            duration double precision not null
        )
        ",
        table = qualified_name(schema, "songs"),
    )
}

fn build_artists_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            artist_id varchar(256) not null,
            name varchar(65535),
            location varchar(450),
            latitude double precision,
            longitude double precision
        )
        ",
        table = qualified_name(schema, "artists"),
    )
}

fn build_time_table_sql(schema: &str) -> String {
    formatdoc!(
        "
        create table {table} (
            start_time timestamp primary key,
            hour int,
            day int,
            week int,
            month int,
            year int,
            weekday int
        )
        ",
        table = qualified_name(schema, "time"),
    )
}

/// Executes the catalog's drop and create lists against the warehouse, one
/// statement per round trip so every statement commits individually.
#[derive(Clone, Debug)]
pub struct CatalogManager {
    pool: PgPool,
    schema: String,
}

impl CatalogManager {
    pub(crate) fn new(pool: PgPool, schema: String) -> Self {
        Self { pool, schema }
    }

    pub async fn drop_tables(&self) -> Result<()> {
        self.execute_all(&drop_actions(&self.schema)).await
    }

    pub async fn create_tables(&self) -> Result<()> {
        self.execute_all(&create_actions(&self.schema)).await
    }

    /// Drop then create every table. Idempotent: drops are `if exists` and
    /// creates always run against freshly-dropped names.
    pub async fn reset(&self) -> Result<()> {
        self.drop_tables().await?;
        self.create_tables().await
    }

    async fn execute_all(&self, actions: &[SqlAction]) -> Result<()> {
        for action in actions {
            sqlx::query(action.sql())
                .execute(&self.pool)
                .await
                .map_err(|e| Error::statement(action.description(), e))?;
            metrics::record_ddl_statement();
            info!(action = action.description(), "applied catalog statement");
        }
        Ok(())
    }
}

pub fn qualified_name(schema: &str, ident: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(ident))
}

pub fn quote_ident(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}
