//! Database repository for workflow definitions and their graphs.

use super::invalid_column;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use washline_core::{EdgeId, NodeId, WorkflowId};
use washline_workflow::{
    NodeConfig, NodeKind, Workflow, WorkflowDefinition, WorkflowEdge, WorkflowMetadata,
    WorkflowNode, WorkflowStatus,
};

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    status: String,
    metadata: Json<WorkflowMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    archived_at: Option<DateTime<Utc>>,
}

impl WorkflowRow {
    fn try_into_definition(self) -> Result<WorkflowDefinition, sqlx::Error> {
        let id = WorkflowId::from_str(&self.id)
            .map_err(|e| invalid_column("workflow id", &self.id, e))?;
        let status = WorkflowStatus::parse(&self.status)
            .ok_or_else(|| invalid_column("workflow status", &self.status, "unknown status"))?;

        Ok(WorkflowDefinition {
            id,
            name: self.name,
            description: self.description,
            status,
            metadata: self.metadata.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
            archived_at: self.archived_at,
        })
    }
}

/// Row type for node queries.
#[derive(FromRow)]
struct NodeRow {
    id: String,
    workflow_id: String,
    node_key: String,
    kind: String,
    node_type: String,
    label: String,
    config: Json<NodeConfig>,
}

impl NodeRow {
    fn try_into_node(self) -> Result<WorkflowNode, sqlx::Error> {
        let id = NodeId::from_str(&self.id).map_err(|e| invalid_column("node id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| invalid_column("workflow id", &self.workflow_id, e))?;
        let kind = NodeKind::parse(&self.kind)
            .ok_or_else(|| invalid_column("node kind", &self.kind, "unknown kind"))?;

        Ok(WorkflowNode {
            id,
            workflow_id,
            key: self.node_key,
            kind,
            node_type: self.node_type,
            label: self.label,
            config: self.config.0,
        })
    }
}

/// Row type for edge queries.
#[derive(FromRow)]
struct EdgeRow {
    id: String,
    workflow_id: String,
    source_node_id: String,
    target_node_id: String,
}

impl EdgeRow {
    fn try_into_edge(self) -> Result<WorkflowEdge, sqlx::Error> {
        let id = EdgeId::from_str(&self.id).map_err(|e| invalid_column("edge id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| invalid_column("workflow id", &self.workflow_id, e))?;
        let source = NodeId::from_str(&self.source_node_id)
            .map_err(|e| invalid_column("node id", &self.source_node_id, e))?;
        let target = NodeId::from_str(&self.target_node_id)
            .map_err(|e| invalid_column("node id", &self.target_node_id, e))?;

        Ok(WorkflowEdge {
            id,
            workflow_id,
            source,
            target,
        })
    }
}

/// Repository for workflow definitions, nodes, and edges.
///
/// Graph writes run in one transaction: a definition is never visible with a
/// partial node or edge set.
#[derive(Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a definition and its graph.
    pub async fn insert(&self, workflow: &Workflow) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let definition = &workflow.definition;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, name, description, status, metadata, created_at, updated_at, archived_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(definition.id.to_string())
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(definition.status.as_str())
        .bind(Json(&definition.metadata))
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .bind(definition.archived_at)
        .execute(&mut *tx)
        .await?;

        insert_graph(&mut *tx, workflow).await?;
        tx.commit().await
    }

    /// Updates the definition and swaps the whole graph.
    pub async fn replace(&self, workflow: &Workflow) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let workflow_id = workflow.id().to_string();

        update_definition_row(&mut *tx, &workflow.definition).await?;

        sqlx::query("DELETE FROM workflow_edges WHERE workflow_id = $1")
            .bind(&workflow_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM workflow_nodes WHERE workflow_id = $1")
            .bind(&workflow_id)
            .execute(&mut *tx)
            .await?;

        insert_graph(&mut *tx, workflow).await?;
        tx.commit().await
    }

    /// Writes definition fields without touching the graph.
    pub async fn update_definition(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<(), sqlx::Error> {
        update_definition_row(&self.pool, definition).await
    }

    /// Finds a workflow by ID.
    pub async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, sqlx::Error> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, status, metadata,
                   created_at, updated_at, archived_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(self.with_graphs(vec![r]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Lists every workflow, oldest first.
    pub async fn list_all(&self) -> Result<Vec<Workflow>, sqlx::Error> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, status, metadata,
                   created_at, updated_at, archived_at
            FROM workflows
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        self.with_graphs(rows).await
    }

    /// Lists active workflows that contain a trigger node of `trigger_type`.
    pub async fn list_active_by_trigger(
        &self,
        trigger_type: &str,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT w.id, w.name, w.description, w.status, w.metadata,
                   w.created_at, w.updated_at, w.archived_at
            FROM workflows w
            WHERE w.status = 'active'
              AND EXISTS (
                  SELECT 1 FROM workflow_nodes n
                  WHERE n.workflow_id = w.id
                    AND n.kind = 'trigger'
                    AND n.node_type = $1
              )
            ORDER BY w.created_at, w.id
            "#,
        )
        .bind(trigger_type)
        .fetch_all(&self.pool)
        .await?;

        self.with_graphs(rows).await
    }

    /// Loads nodes and edges for a batch of definitions, two queries total.
    async fn with_graphs(&self, rows: Vec<WorkflowRow>) -> Result<Vec<Workflow>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let node_rows: Vec<NodeRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, node_key, kind, node_type, label, config
            FROM workflow_nodes
            WHERE workflow_id = ANY($1)
            ORDER BY workflow_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let edge_rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, source_node_id, target_node_id
            FROM workflow_edges
            WHERE workflow_id = ANY($1)
            ORDER BY workflow_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut nodes: HashMap<WorkflowId, Vec<WorkflowNode>> = HashMap::new();
        for row in node_rows {
            let node = row.try_into_node()?;
            nodes.entry(node.workflow_id).or_default().push(node);
        }
        let mut edges: HashMap<WorkflowId, Vec<WorkflowEdge>> = HashMap::new();
        for row in edge_rows {
            let edge = row.try_into_edge()?;
            edges.entry(edge.workflow_id).or_default().push(edge);
        }

        rows.into_iter()
            .map(|row| {
                let definition = row.try_into_definition()?;
                Ok(Workflow {
                    nodes: nodes.remove(&definition.id).unwrap_or_default(),
                    edges: edges.remove(&definition.id).unwrap_or_default(),
                    definition,
                })
            })
            .collect()
    }
}

async fn update_definition_row<'e>(
    executor: impl PgExecutor<'e>,
    definition: &WorkflowDefinition,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE workflows
        SET name = $2, description = $3, status = $4, metadata = $5,
            updated_at = $6, archived_at = $7
        WHERE id = $1
        "#,
    )
    .bind(definition.id.to_string())
    .bind(&definition.name)
    .bind(&definition.description)
    .bind(definition.status.as_str())
    .bind(Json(&definition.metadata))
    .bind(definition.updated_at)
    .bind(definition.archived_at)
    .execute(executor)
    .await?;

    Ok(())
}

async fn insert_graph(conn: &mut PgConnection, workflow: &Workflow) -> Result<(), sqlx::Error> {
    for (position, node) in workflow.nodes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO workflow_nodes
                (id, workflow_id, position, node_key, kind, node_type, label, config)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(node.id.to_string())
        .bind(node.workflow_id.to_string())
        .bind(position as i64)
        .bind(&node.key)
        .bind(node.kind.as_str())
        .bind(&node.node_type)
        .bind(&node.label)
        .bind(Json(&node.config))
        .execute(&mut *conn)
        .await?;
    }

    for (position, edge) in workflow.edges.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO workflow_edges
                (id, workflow_id, position, source_node_id, target_node_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(edge.id.to_string())
        .bind(edge.workflow_id.to_string())
        .bind(position as i64)
        .bind(edge.source.to_string())
        .bind(edge.target.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow_row(id: &str, status: &str) -> WorkflowRow {
        let now = Utc::now();
        WorkflowRow {
            id: id.to_string(),
            name: "Order follow-up".to_string(),
            description: None,
            status: status.to_string(),
            metadata: Json(WorkflowMetadata {
                trigger_types: vec!["orders.created".to_string()],
                action_types: vec!["notifications.dispatch".to_string()],
            }),
            created_at: now,
            updated_at: now,
            archived_at: None,
        }
    }

    #[test]
    fn decodes_workflow_row() {
        let id = WorkflowId::new();
        let definition = workflow_row(&id.to_string(), "active")
            .try_into_definition()
            .expect("decode");
        assert_eq!(definition.id, id);
        assert_eq!(definition.status, WorkflowStatus::Active);
        assert_eq!(definition.metadata.trigger_types, vec!["orders.created"]);
    }

    #[test]
    fn rejects_unknown_status() {
        let row = workflow_row(&WorkflowId::new().to_string(), "paused");
        assert!(matches!(
            row.try_into_definition(),
            Err(sqlx::Error::Decode(_))
        ));
    }

    #[test]
    fn rejects_malformed_ids() {
        let row = workflow_row("not-a-ulid", "draft");
        assert!(matches!(
            row.try_into_definition(),
            Err(sqlx::Error::Decode(_))
        ));

        let edge = EdgeRow {
            id: EdgeId::new().to_string(),
            workflow_id: WorkflowId::new().to_string(),
            source_node_id: NodeId::new().to_string(),
            target_node_id: "garbage".to_string(),
        };
        assert!(matches!(edge.try_into_edge(), Err(sqlx::Error::Decode(_))));
    }

    #[test]
    fn decodes_node_row() {
        let workflow_id = WorkflowId::new();
        let mut config = NodeConfig::new();
        config.insert("channel".to_string(), serde_json::json!("sms"));
        let row = NodeRow {
            id: NodeId::new().to_string(),
            workflow_id: workflow_id.to_string(),
            node_key: "notify".to_string(),
            kind: "action".to_string(),
            node_type: "notifications.dispatch".to_string(),
            label: String::new(),
            config: Json(config),
        };
        let node = row.try_into_node().expect("decode");
        assert_eq!(node.workflow_id, workflow_id);
        assert_eq!(node.kind, NodeKind::Action);
        assert_eq!(node.config["channel"], "sms");
    }
}
