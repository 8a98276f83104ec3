//! Schema discovery and caching.
//!
//! The catalog enumerates the tables the pipeline may see and reference.
//! Its snapshot feeds both the prompt (so the model knows what exists)
//! and the validator's allowlist (so the model cannot invent tables).

use crate::errors::QueryError;
use crate::types::{ColumnInfo, SchemaSnapshot, TableInfo};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use turso::{Database, Value as TursoValue};

/// Supplies the schema snapshot and table allowlist.
///
/// Readers must tolerate a stale snapshot between refreshes; a refresh
/// replaces the snapshot atomically rather than updating it in place.
#[async_trait]
pub trait SchemaCatalog: Send + Sync + Debug + DynClone {
    async fn schema(&self) -> Result<Arc<SchemaSnapshot>, QueryError>;

    /// The set of table names queries are permitted to reference.
    async fn allowed_tables(&self) -> Result<HashSet<String>, QueryError>;

    /// Integrations detected from the table layout, used to pick
    /// domain-context blocks for the prompt.
    async fn detected_integrations(&self) -> Result<Vec<String>, QueryError>;

    async fn clear_cache(&self);
}

dyn_clone::clone_trait_object!(SchemaCatalog);

/// Catalog over a local SQLite database.
#[derive(Clone)]
pub struct SqliteCatalog {
    db: Database,
    table_prefix: String,
    cache: Arc<RwLock<Option<Arc<SchemaSnapshot>>>>,
}

impl SqliteCatalog {
    pub fn new(db: Database, table_prefix: &str) -> Self {
        Self {
            db,
            table_prefix: table_prefix.to_string(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    async fn discover(&self) -> Result<SchemaSnapshot, QueryError> {
        let conn = self.db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name;",
                (),
            )
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?
        {
            if let Ok(TursoValue::Text(name)) = row.get_value(0) {
                if name.starts_with(&self.table_prefix) {
                    names.push(name);
                }
            }
        }

        let mut tables = Vec::new();
        for name in names {
            let columns = self.table_columns(&name).await?;
            let row_count = self.approximate_row_count(&name).await?;
            tables.push(TableInfo {
                description: self.table_description(&name),
                name,
                columns,
                row_count,
            });
        }

        info!(tables = tables.len(), "discovered schema");
        Ok(SchemaSnapshot { tables })
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, QueryError> {
        let conn = self.db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut rows = conn
            .query(&format!("PRAGMA table_info({table});"), ())
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?
        {
            // PRAGMA table_info columns: cid, name, type, notnull, dflt_value, pk
            let (Ok(TursoValue::Text(name)), Ok(TursoValue::Text(sql_type))) =
                (row.get_value(1), row.get_value(2))
            else {
                continue;
            };
            let notnull = matches!(row.get_value(3), Ok(TursoValue::Integer(n)) if n != 0);
            let pk = matches!(row.get_value(5), Ok(TursoValue::Integer(n)) if n != 0);

            columns.push(ColumnInfo {
                name,
                sql_type,
                nullable: !notnull,
                key: if pk { "PRI".to_string() } else { String::new() },
            });
        }

        Ok(columns)
    }

    async fn approximate_row_count(&self, table: &str) -> Result<u64, QueryError> {
        let conn = self.db.connect().map_err(|e| QueryError::Storage(e.to_string()))?;

        let mut rows = conn
            .query(&format!("SELECT COUNT(*) FROM {table};"), ())
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| QueryError::Storage(e.to_string()))?
        {
            if let Ok(TursoValue::Integer(n)) = row.get_value(0) {
                return Ok(n.max(0) as u64);
            }
        }
        Ok(0)
    }

    /// Human-readable description for known core and integration tables.
    fn table_description(&self, table: &str) -> String {
        let suffix = table.strip_prefix(&self.table_prefix).unwrap_or(table);

        let description = match suffix {
            "posts" => "Posts, pages, and custom post types",
            "postmeta" => "Post metadata (custom fields)",
            "users" => "User accounts",
            "usermeta" => "User metadata (profile fields)",
            "comments" => "Post comments",
            "commentmeta" => "Comment metadata",
            "terms" => "Taxonomy terms (categories, tags)",
            "term_taxonomy" => "Term taxonomy relationships",
            "term_relationships" => "Object to term relationships",
            "options" => "Site options and settings",
            "wc_orders" => "WooCommerce orders (HPOS)",
            "wc_orders_meta" => "Order metadata",
            "wc_order_stats" => "Order statistics summary",
            "wc_customer_lookup" => "Customer information lookup",
            "woocommerce_order_items" => "Order line items",
            "woocommerce_order_itemmeta" => "Order item metadata",
            "learndash_user_activity" => "LearnDash course progress",
            "learndash_pro_quiz_statistic" => "Quiz statistics",
            "mepr_transactions" => "MemberPress payment transactions",
            "mepr_subscriptions" => "Recurring subscriptions",
            _ => "Custom table",
        };

        description.to_string()
    }
}

impl Debug for SqliteCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("table_prefix", &self.table_prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SchemaCatalog for SqliteCatalog {
    async fn schema(&self) -> Result<Arc<SchemaSnapshot>, QueryError> {
        if let Some(snapshot) = self.cache.read().await.as_ref() {
            debug!("returning cached schema snapshot");
            return Ok(snapshot.clone());
        }

        let snapshot = Arc::new(self.discover().await?);
        *self.cache.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn allowed_tables(&self) -> Result<HashSet<String>, QueryError> {
        let snapshot = self.schema().await?;
        Ok(snapshot.table_names().map(String::from).collect())
    }

    async fn detected_integrations(&self) -> Result<Vec<String>, QueryError> {
        let snapshot = self.schema().await?;
        let has = |suffix: &str| {
            snapshot
                .table_names()
                .any(|name| name.ends_with(suffix))
        };

        let mut integrations = Vec::new();
        if has("wc_orders") {
            integrations.push("woocommerce".to_string());
        } else if has("woocommerce_order_items") {
            // Order items without the HPOS orders table means the legacy
            // layout, where orders live in the posts table.
            integrations.push("woocommerce-legacy".to_string());
        }
        if has("learndash_user_activity") {
            integrations.push("learndash".to_string());
        }
        if has("mepr_transactions") {
            integrations.push("memberpress".to_string());
        }
        Ok(integrations)
    }

    async fn clear_cache(&self) {
        *self.cache.write().await = None;
    }
}
