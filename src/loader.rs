use indoc::formatdoc;
use sqlx::PgPool;
use tracing::info;

use crate::catalog::{SqlAction, qualified_name};
use crate::config::WarehouseConfig;
use crate::{Error, Result, metrics};

/// How the warehouse should map JSON fields onto staging columns: either a
/// jsonpaths descriptor stored alongside the data, or automatic matching on
/// field names.
#[derive(Clone, Debug)]
pub enum JsonMapping {
    Auto,
    Paths(String),
}

#[derive(Clone, Debug)]
pub struct CopySource {
    pub uri: String,
    pub mapping: JsonMapping,
}

#[derive(Clone, Debug, Default)]
pub struct CopyOptions {
    pub region: Option<String>,
    pub timeformat: Option<String>,
    pub truncate_columns: bool,
    pub blanks_as_null: bool,
    pub empty_as_null: bool,
}

/// Renders one warehouse bulk-ingest statement. Source locations and the
/// credential come from operator-controlled configuration, so every value is
/// spliced through [`quote_literal`] rather than raw.
pub fn build_copy_sql(
    schema: &str,
    table: &str,
    source: &CopySource,
    role_arn: &str,
    options: &CopyOptions,
) -> String {
    let mut sql = formatdoc!(
        "
        copy {table} from {uri}
        credentials {credentials}",
        table = qualified_name(schema, table),
        uri = quote_literal(&source.uri),
        credentials = quote_literal(&format!("aws_iam_role={role_arn}")),
    );
    if let Some(region) = &options.region {
        sql.push_str(&format!("\nregion {}", quote_literal(region)));
    }
    match &source.mapping {
        JsonMapping::Auto => sql.push_str("\nformat as json 'auto'"),
        JsonMapping::Paths(descriptor) => {
            sql.push_str(&format!("\nformat as json {}", quote_literal(descriptor)));
        }
    }
    if let Some(timeformat) = &options.timeformat {
        sql.push_str(&format!("\ntimeformat as {}", quote_literal(timeformat)));
    }
    if options.truncate_columns {
        sql.push_str("\ntruncatecolumns");
    }
    if options.blanks_as_null {
        sql.push_str("\nblanksasnull");
    }
    if options.empty_as_null {
        sql.push_str("\nemptyasnull");
    }
    sql
}

/// The two staging loads, in order: events (jsonpaths mapping, epoch-millis
/// timestamps), then songs (auto mapping, blank/empty fields as null,
/// over-wide columns truncated).
pub fn copy_actions(schema: &str, config: &WarehouseConfig) -> Vec<SqlAction> {
    let events = CopySource {
        uri: config.storage.log_data.clone(),
        mapping: JsonMapping::Paths(config.storage.log_jsonpaths.clone()),
    };
    let songs = CopySource {
        uri: config.storage.song_data.clone(),
        mapping: JsonMapping::Auto,
    };
    vec![
        SqlAction::new(
            "copy staging_events",
            build_copy_sql(
                schema,
                "staging_events",
                &events,
                &config.iam.role_arn,
                &CopyOptions {
                    region: Some(config.storage.region.clone()),
                    timeformat: Some("epochmillisecs".to_string()),
                    ..CopyOptions::default()
                },
            ),
        ),
        SqlAction::new(
            "copy staging_songs",
            build_copy_sql(
                schema,
                "staging_songs",
                &songs,
                &config.iam.role_arn,
                &CopyOptions {
                    region: Some(config.storage.region.clone()),
                    truncate_columns: true,
                    blanks_as_null: true,
                    empty_as_null: true,
                    ..CopyOptions::default()
                },
            ),
        ),
    ]
}

/// Streams the raw JSON inputs into the staging tables. The loader trusts
/// its configuration: URIs and the credential are passed to the warehouse
/// unvalidated, and parse errors inside the files surface as statement
/// failures from the engine.
#[derive(Clone, Debug)]
pub struct StagingLoader {
    pool: PgPool,
    schema: String,
}

impl StagingLoader {
    pub(crate) fn new(pool: PgPool, schema: String) -> Self {
        Self { pool, schema }
    }

    /// Runs both staging loads inside one transaction: either both staging
    /// tables are populated or neither is.
    pub async fn load_all(&self, config: &WarehouseConfig) -> Result<()> {
        let actions = copy_actions(&self.schema, config);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::statement("begin staging load", e))?;
        for action in &actions {
            let result = sqlx::query(action.sql())
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::statement(action.description(), e))?;
            metrics::record_copy(result.rows_affected());
            info!(
                action = action.description(),
                rows = result.rows_affected(),
                "bulk load complete"
            );
        }
        tx.commit()
            .await
            .map_err(|e| Error::statement("commit staging load", e))
    }

    pub async fn load_events(&self, config: &WarehouseConfig) -> Result<()> {
        self.execute_one(&copy_actions(&self.schema, config)[0]).await
    }

    pub async fn load_songs(&self, config: &WarehouseConfig) -> Result<()> {
        self.execute_one(&copy_actions(&self.schema, config)[1]).await
    }

    async fn execute_one(&self, action: &SqlAction) -> Result<()> {
        let result = sqlx::query(action.sql())
            .execute(&self.pool)
            .await
            .map_err(|e| Error::statement(action.description(), e))?;
        metrics::record_copy(result.rows_affected());
        info!(
            action = action.description(),
            rows = result.rows_affected(),
            "bulk load complete"
        );
        Ok(())
    }
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
