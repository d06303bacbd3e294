//! TursoStore - NodeStore Implementation for Turso/libsql Backend
//!
//! This module implements the `NodeStore` trait on top of a local libsql
//! database opened through [`DatabaseService`].
//!
//! # Design Principles
//!
//! 1. **One row per write**: every [`StoreWrite`] maps to exactly one SQL statement
//! 2. **Row Conversion**: Handles libsql::Row → model conversion in one place
//! 3. **Transactions**: `apply_in_transaction` wraps a whole plan in
//!    `BEGIN TRANSACTION` / `COMMIT` on a single connection
//!
//! # Examples
//!
//! ```rust,no_run
//! use blueprint_core::db::{DatabaseService, NodeStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/blueprint.db")).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db));
//!
//!     let node = store.get_node("node-123").await?;
//!     Ok(())
//! }
//! ```

use crate::db::database::{BLUEPRINT_COLUMNS, NODE_COLUMNS};
use crate::db::node_store::{NodeStore, StoreWrite};
use crate::db::DatabaseService;
use crate::models::{
    Blueprint, BlueprintUpdate, NodePayloadUpdate, OutlineNode, PositionRange, SiblingGroup,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{params, Connection, Row};
use std::sync::Arc;

/// TursoStore implements NodeStore for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    async fn conn(&self) -> Result<Connection> {
        self.db
            .connect_with_timeout()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect: {}", e))
    }

    /// Fixed-width RFC3339 so that lexicographic order equals time order
    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Rows written by this store use RFC3339: "YYYY-MM-DDTHH:MM:SS.ffffffZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert libsql::Row to OutlineNode
    ///
    /// Expected columns follow [`NODE_COLUMNS`].
    fn row_to_node(row: &Row) -> Result<OutlineNode> {
        let id: String = row.get(0).context("Failed to get id")?;
        let blueprint_id: String = row.get(1).context("Failed to get blueprint_id")?;
        let parent_id: Option<String> = row.get(2).context("Failed to get parent_id")?;
        let position: i64 = row.get(3).context("Failed to get position")?;
        let title: String = row.get(4).context("Failed to get title")?;
        let description: String = row.get(5).context("Failed to get description")?;
        let weight: i64 = row.get(6).context("Failed to get weight")?;
        let created_at_str: String = row.get(7).context("Failed to get created_at")?;
        let modified_at_str: String = row.get(8).context("Failed to get modified_at")?;

        Ok(OutlineNode {
            id,
            blueprint_id,
            parent_id,
            position,
            title,
            description,
            weight,
            created_at: Self::parse_timestamp(&created_at_str)
                .context("Failed to parse created_at")?,
            modified_at: Self::parse_timestamp(&modified_at_str)
                .context("Failed to parse modified_at")?,
        })
    }

    /// Convert libsql::Row to Blueprint (columns follow [`BLUEPRINT_COLUMNS`])
    fn row_to_blueprint(row: &Row) -> Result<Blueprint> {
        let created_at_str: String = row.get(4).context("Failed to get created_at")?;
        let modified_at_str: String = row.get(5).context("Failed to get modified_at")?;

        Ok(Blueprint {
            id: row.get(0).context("Failed to get id")?,
            name: row.get(1).context("Failed to get name")?,
            description: row.get(2).context("Failed to get description")?,
            ai_notes: row.get(3).context("Failed to get ai_notes")?,
            created_at: Self::parse_timestamp(&created_at_str)
                .context("Failed to parse created_at")?,
            modified_at: Self::parse_timestamp(&modified_at_str)
                .context("Failed to parse modified_at")?,
        })
    }

    async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<OutlineNode>> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }

    /// Execute one plan write on the given connection
    ///
    /// Shared by `apply_write` and `apply_in_transaction` so both paths issue
    /// identical SQL.
    async fn execute_write(conn: &Connection, write: &StoreWrite) -> Result<()> {
        let now = Self::format_timestamp(&Utc::now());
        let affected = match write {
            StoreWrite::SetPosition { id, to, .. } => conn
                .execute(
                    "UPDATE outline_nodes SET position = ?, modified_at = ? WHERE id = ?",
                    (*to, now.as_str(), id.as_str()),
                )
                .await
                .with_context(|| format!("Failed to shift position of node '{}'", id))?,
            StoreWrite::Relocate {
                id,
                parent_id,
                position,
            } => conn
                .execute(
                    "UPDATE outline_nodes SET parent_id = ?, position = ?, modified_at = ?
                     WHERE id = ?",
                    (parent_id.as_deref(), *position, now.as_str(), id.as_str()),
                )
                .await
                .with_context(|| format!("Failed to relocate node '{}'", id))?,
            StoreWrite::Insert(node) => {
                let sql = format!(
                    "INSERT INTO outline_nodes ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    NODE_COLUMNS
                );
                conn.execute(
                    &sql,
                    (
                        node.id.as_str(),
                        node.blueprint_id.as_str(),
                        node.parent_id.as_deref(),
                        node.position,
                        node.title.as_str(),
                        node.description.as_str(),
                        node.weight,
                        Self::format_timestamp(&node.created_at),
                        Self::format_timestamp(&node.modified_at),
                    ),
                )
                .await
                .with_context(|| format!("Failed to insert node '{}'", node.id))?
            }
            StoreWrite::Delete { id } => {
                // A missing row is not an error for deletes
                conn.execute("DELETE FROM outline_nodes WHERE id = ?", params![id.as_str()])
                    .await
                    .with_context(|| format!("Failed to delete node '{}'", id))?;
                return Ok(());
            }
        };

        if affected == 0 {
            anyhow::bail!("Node not found: {}", write.node_id());
        }
        Ok(())
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    //
    // BLUEPRINT OPERATIONS
    //

    async fn create_blueprint(&self, blueprint: Blueprint) -> Result<Blueprint> {
        let conn = self.conn().await?;
        let sql = format!(
            "INSERT INTO blueprints ({}) VALUES (?, ?, ?, ?, ?, ?)",
            BLUEPRINT_COLUMNS
        );
        conn.execute(
            &sql,
            (
                blueprint.id.as_str(),
                blueprint.name.as_str(),
                blueprint.description.as_str(),
                blueprint.ai_notes.as_str(),
                Self::format_timestamp(&blueprint.created_at),
                Self::format_timestamp(&blueprint.modified_at),
            ),
        )
        .await
        .with_context(|| format!("Failed to create blueprint '{}'", blueprint.id))?;

        self.get_blueprint(&blueprint.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blueprint not found after creation"))
    }

    async fn get_blueprint(&self, id: &str) -> Result<Option<Blueprint>> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM blueprints WHERE id = ?", BLUEPRINT_COLUMNS);
        let mut rows = conn
            .query(&sql, params![id])
            .await
            .context("Failed to query blueprint")?;

        match rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_blueprint(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_blueprints(&self) -> Result<Vec<Blueprint>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM blueprints ORDER BY created_at DESC, id ASC",
            BLUEPRINT_COLUMNS
        );
        let mut rows = conn
            .query(&sql, ())
            .await
            .context("Failed to list blueprints")?;

        let mut blueprints = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch row: {}", e))?
        {
            blueprints.push(Self::row_to_blueprint(&row)?);
        }
        Ok(blueprints)
    }

    async fn update_blueprint(&self, id: &str, update: BlueprintUpdate) -> Result<Blueprint> {
        let mut blueprint = self
            .get_blueprint(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blueprint not found: {}", id))?;
        update.apply_to(&mut blueprint);

        let conn = self.conn().await?;
        conn.execute(
            "UPDATE blueprints SET name = ?, description = ?, modified_at = ? WHERE id = ?",
            (
                blueprint.name.as_str(),
                blueprint.description.as_str(),
                Self::format_timestamp(&blueprint.modified_at),
                id,
            ),
        )
        .await
        .with_context(|| format!("Failed to update blueprint '{}'", id))?;

        Ok(blueprint)
    }

    async fn delete_blueprint(&self, id: &str) -> Result<bool> {
        let conn = self.conn().await?;

        // Nodes reference each other through parent_id, so clear them in one
        // statement before the blueprint row goes (the FK cascade would
        // otherwise delete rows in arbitrary order).
        conn.execute("BEGIN TRANSACTION", ())
            .await
            .context("Failed to begin transaction")?;

        let result: Result<u64> = async {
            conn.execute(
                "UPDATE outline_nodes SET parent_id = NULL WHERE blueprint_id = ?",
                params![id],
            )
            .await?;
            conn.execute("DELETE FROM outline_nodes WHERE blueprint_id = ?", params![id])
                .await?;
            Ok(conn.execute("DELETE FROM blueprints WHERE id = ?", params![id]).await?)
        }
        .await;

        match result {
            Ok(affected) => {
                conn.execute("COMMIT", ())
                    .await
                    .context("Failed to commit transaction")?;
                Ok(affected > 0)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", ()).await;
                Err(e.context(format!("Failed to delete blueprint '{}'", id)))
            }
        }
    }

    //
    // NODE READS
    //

    async fn get_node(&self, id: &str) -> Result<Option<OutlineNode>> {
        let conn = self.conn().await?;
        let sql = format!("SELECT {} FROM outline_nodes WHERE id = ?", NODE_COLUMNS);
        let rows = conn
            .query(&sql, params![id])
            .await
            .context("Failed to get node")?;
        Ok(Self::collect_nodes(rows).await?.into_iter().next())
    }

    async fn list_siblings(
        &self,
        group: &SiblingGroup,
        range: PositionRange,
    ) -> Result<Vec<OutlineNode>> {
        let conn = self.conn().await?;
        // Unset bounds collapse to the full i64 range, keeping one statement shape
        let sql = format!(
            "SELECT {} FROM outline_nodes
             WHERE blueprint_id = ? AND parent_id IS ?
               AND position >= ? AND position > ? AND position <= ? AND position < ?
             ORDER BY position ASC, created_at ASC, id ASC",
            NODE_COLUMNS
        );
        let rows = conn
            .query(
                &sql,
                (
                    group.blueprint_id.as_str(),
                    group.parent_id.as_deref(),
                    range.gte.unwrap_or(i64::MIN),
                    range.gt.unwrap_or(i64::MIN),
                    range.lte.unwrap_or(i64::MAX),
                    range.lt.unwrap_or(i64::MAX),
                ),
            )
            .await
            .with_context(|| format!("Failed to list siblings of group {}", group))?;
        Self::collect_nodes(rows).await
    }

    async fn list_nodes(&self, blueprint_id: &str) -> Result<Vec<OutlineNode>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM outline_nodes WHERE blueprint_id = ?
             ORDER BY parent_id ASC, position ASC, created_at ASC, id ASC",
            NODE_COLUMNS
        );
        let rows = conn
            .query(&sql, params![blueprint_id])
            .await
            .with_context(|| format!("Failed to list nodes of blueprint '{}'", blueprint_id))?;
        Self::collect_nodes(rows).await
    }

    async fn list_children(&self, id: &str) -> Result<Vec<OutlineNode>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT {} FROM outline_nodes WHERE parent_id = ?
             ORDER BY position ASC, created_at ASC, id ASC",
            NODE_COLUMNS
        );
        let rows = conn
            .query(&sql, params![id])
            .await
            .with_context(|| format!("Failed to list children of '{}'", id))?;
        Self::collect_nodes(rows).await
    }

    //
    // NODE WRITES
    //

    async fn insert_node(&self, node: OutlineNode) -> Result<OutlineNode> {
        let conn = self.conn().await?;
        let id = node.id.clone();
        Self::execute_write(&conn, &StoreWrite::Insert(node)).await?;

        self.get_node(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after creation"))
    }

    async fn batch_insert_nodes(&self, nodes: Vec<OutlineNode>) -> Result<Vec<OutlineNode>> {
        let writes: Vec<StoreWrite> = nodes.iter().cloned().map(StoreWrite::Insert).collect();
        self.apply_in_transaction(&writes).await?;
        Ok(nodes)
    }

    async fn update_position(&self, id: &str, position: i64) -> Result<()> {
        let conn = self.conn().await?;
        Self::execute_write(
            &conn,
            &StoreWrite::SetPosition {
                id: id.to_string(),
                from: position,
                to: position,
            },
        )
        .await
    }

    async fn relocate_node(&self, id: &str, parent_id: Option<&str>, position: i64) -> Result<()> {
        let conn = self.conn().await?;
        Self::execute_write(
            &conn,
            &StoreWrite::Relocate {
                id: id.to_string(),
                parent_id: parent_id.map(str::to_string),
                position,
            },
        )
        .await
    }

    async fn update_payload(&self, id: &str, update: NodePayloadUpdate) -> Result<OutlineNode> {
        let mut node = self
            .get_node(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found: {}", id))?;
        update.apply_to(&mut node);

        let conn = self.conn().await?;
        conn.execute(
            "UPDATE outline_nodes SET title = ?, description = ?, weight = ?, modified_at = ?
             WHERE id = ?",
            (
                node.title.as_str(),
                node.description.as_str(),
                node.weight,
                Self::format_timestamp(&node.modified_at),
                id,
            ),
        )
        .await
        .with_context(|| format!("Failed to update node '{}'", id))?;

        Ok(node)
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let conn = self.conn().await?;
        let affected = conn
            .execute("DELETE FROM outline_nodes WHERE id = ?", params![id])
            .await
            .with_context(|| format!("Failed to delete node '{}'", id))?;
        Ok(affected > 0)
    }

    //
    // WRITE PLANS
    //

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn apply_in_transaction(&self, writes: &[StoreWrite]) -> Result<()> {
        let conn = self.conn().await?;

        conn.execute("BEGIN TRANSACTION", ())
            .await
            .context("Failed to begin transaction")?;

        for write in writes {
            if let Err(e) = Self::execute_write(&conn, write).await {
                let _ = conn.execute("ROLLBACK", ()).await;
                return Err(e);
            }
        }

        conn.execute("COMMIT", ())
            .await
            .context("Failed to commit transaction")?;

        Ok(())
    }

    async fn apply_write(&self, write: &StoreWrite) -> Result<()> {
        let conn = self.conn().await?;
        Self::execute_write(&conn, write).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_store() -> Result<(TursoStore, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TursoStore::new(db), temp_dir))
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(TursoStore::parse_timestamp("2025-01-03 10:30:00").is_ok());
        assert!(TursoStore::parse_timestamp("2025-01-03T10:30:00.000123Z").is_ok());
        assert!(TursoStore::parse_timestamp("not a date").is_err());
    }

    #[tokio::test]
    async fn test_shift_of_missing_node_fails() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        assert!(store.update_position("ghost", 3).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_root_group_matches_null_parent() -> Result<()> {
        let (store, _temp_dir) = create_test_store().await?;
        let bp = store
            .create_blueprint(Blueprint::new("BP".into(), String::new(), String::new()))
            .await?;

        let root = OutlineNode::new(bp.id.clone(), "Root".into(), String::new(), 10);
        let root = store.insert_node(root).await?;
        let child = OutlineNode::new(bp.id.clone(), "Child".into(), String::new(), 5)
            .placed(Some(root.id.clone()), 0);
        store.insert_node(child).await?;

        let roots = store
            .list_siblings(&SiblingGroup::root(bp.id.clone()), PositionRange::all())
            .await?;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, root.id);
        Ok(())
    }
}
