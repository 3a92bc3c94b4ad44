use std::collections::HashMap;

use imcore_types::{AccessToken, ContactKey, Device, PushSubscription, Session};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CoreError;
use crate::session::store::{ListSessionsFilter, SessionStore};

/// `SessionStore` over Postgres. Uses the runtime `sqlx::query`/
/// `query_as` API rather than the compile-time `query!`/`query_as!`
/// macros the teacher's `queries/memberships.rs` uses, because those
/// macros require a reachable `DATABASE_URL` or a committed `.sqlx`
/// offline cache at build time (see DESIGN.md, Open Question 6).
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresSessionStore { pool }
    }
}

struct SessionRow {
    id: Uuid,
    dc: i64,
    created_at: OffsetDateTime,
    name: String,
    app_id: String,
    device_id: String,
    user_agent_json: serde_json::Value,
    remote_addr: Option<String>,
    push_json: Option<serde_json::Value>,
    contact_dc: i64,
    contact_id: String,
    contact_iss: String,
    contact_sub: String,
    metadata_json: serde_json::Value,
    grant_id: Option<Uuid>,
    grant_type: Option<String>,
    grant_token: Option<String>,
    grant_refresh: Option<String>,
    grant_scope: Option<Vec<String>>,
    grant_issued_at: Option<OffsetDateTime>,
    grant_expires_at: Option<OffsetDateTime>,
    grant_revoked_at: Option<OffsetDateTime>,
}

impl TryFrom<SessionRow> for Session {
    type Error = CoreError;

    fn try_from(row: SessionRow) -> Result<Self, CoreError> {
        let user_agent: imcore_types::UserAgentInfo =
            serde_json::from_value(row.user_agent_json).map_err(|e| CoreError::internal(e.to_string()))?;
        let push: Option<PushSubscription> = match row.push_json {
            Some(v) if !v.is_null() => Some(serde_json::from_value(v).map_err(|e| CoreError::internal(e.to_string()))?),
            _ => None,
        };
        let remote_addr = row
            .remote_addr
            .and_then(|s| s.parse().ok());
        let metadata: HashMap<String, String> =
            serde_json::from_value(row.metadata_json).map_err(|e| CoreError::internal(e.to_string()))?;

        let grant = row.grant_token.map(|token| AccessToken {
            id: row.grant_id.unwrap_or(row.id),
            kind: row.grant_type.unwrap_or_else(|| "bearer".to_string()),
            token,
            refresh: row.grant_refresh,
            scope: row.grant_scope.unwrap_or_default(),
            issued_at: row.grant_issued_at.unwrap_or(row.created_at),
            expires_at: row.grant_expires_at,
            revoked_at: row.grant_revoked_at,
        });

        Ok(Session {
            id: row.id,
            dc: row.dc,
            created_at: row.created_at,
            name: row.name,
            app_id: row.app_id,
            device: Device {
                id: row.device_id,
                user_agent,
                remote_addr,
                push,
            },
            contact: ContactKey {
                dc: row.contact_dc,
                id: row.contact_id,
                iss: row.contact_iss,
                sub: row.contact_sub,
            },
            metadata,
            grant,
        })
    }
}

const SELECT_SESSION: &str = r#"
    SELECT
        s.id, s.dc, s.created_at, s.name, s.app_id, s.device_id,
        s.user_agent, s.remote_addr::text AS remote_addr, s.push_token AS push_json,
        s.contact_dc, s.contact_id, s.contact_iss, s.contact_sub, s.metadata AS metadata_json,
        t.id AS grant_id, t.type AS grant_type, t.token AS grant_token, t.refresh AS grant_refresh,
        t.scope AS grant_scope, t.rotated_at AS grant_issued_at, t.expires_at AS grant_expires_at,
        t.revoked_at AS grant_revoked_at
    FROM session s
    LEFT JOIN session_token t ON t.id = s.id
"#;

fn row_to_session_row(row: sqlx::postgres::PgRow) -> Result<SessionRow, CoreError> {
    Ok(SessionRow {
        id: row.try_get("id").map_err(CoreError::from)?,
        dc: row.try_get("dc").map_err(CoreError::from)?,
        created_at: row.try_get("created_at").map_err(CoreError::from)?,
        name: row.try_get("name").map_err(CoreError::from)?,
        app_id: row.try_get("app_id").map_err(CoreError::from)?,
        device_id: row.try_get("device_id").map_err(CoreError::from)?,
        user_agent_json: row.try_get("user_agent").map_err(CoreError::from)?,
        remote_addr: row.try_get("remote_addr").map_err(CoreError::from)?,
        push_json: row.try_get("push_json").map_err(CoreError::from)?,
        contact_dc: row.try_get("contact_dc").map_err(CoreError::from)?,
        contact_id: row.try_get("contact_id").map_err(CoreError::from)?,
        contact_iss: row.try_get("contact_iss").map_err(CoreError::from)?,
        contact_sub: row.try_get("contact_sub").map_err(CoreError::from)?,
        metadata_json: row.try_get("metadata_json").map_err(CoreError::from)?,
        grant_id: row.try_get("grant_id").map_err(CoreError::from)?,
        grant_type: row.try_get("grant_type").map_err(CoreError::from)?,
        grant_token: row.try_get("grant_token").map_err(CoreError::from)?,
        grant_refresh: row.try_get("grant_refresh").map_err(CoreError::from)?,
        grant_scope: row.try_get("grant_scope").map_err(CoreError::from)?,
        grant_issued_at: row.try_get("grant_issued_at").map_err(CoreError::from)?,
        grant_expires_at: row.try_get("grant_expires_at").map_err(CoreError::from)?,
        grant_revoked_at: row.try_get("grant_revoked_at").map_err(CoreError::from)?,
    })
}

/// One dynamically-typed bind value for the `list()` filter builder.
/// sqlx's runtime `query()` picks the wire type from the bound Rust
/// value, so filter columns that aren't `TEXT` (`dc` is `bigint`, `id`
/// is `uuid`) must be bound as their native type rather than stringified,
/// or Postgres rejects the comparison (`operator does not exist`).
enum Bind {
    I64(i64),
    Uuid(Uuid),
    Text(String),
}

#[async_trait::async_trait]
impl SessionStore for PostgresSessionStore {
    async fn list(&self, filter: ListSessionsFilter) -> Result<Vec<Session>, CoreError> {
        let mut sql = String::from(SELECT_SESSION);
        let mut clauses = Vec::new();
        let mut binds: Vec<Bind> = Vec::new();

        if let Some(dc) = filter.dc {
            clauses.push(format!("s.dc = ${}", clauses.len() + 1));
            binds.push(Bind::I64(dc));
        }
        if let Some(id) = filter.id {
            clauses.push(format!("s.id = ${}", clauses.len() + 1));
            binds.push(Bind::Uuid(id));
        }
        if let Some(app_id) = &filter.app_id {
            clauses.push(format!("s.app_id = ${}", clauses.len() + 1));
            binds.push(Bind::Text(app_id.clone()));
        }
        if let Some(device_id) = &filter.device_id {
            if !device_id.is_empty() {
                clauses.push(format!("s.device_id = ${}", clauses.len() + 1));
                binds.push(Bind::Text(device_id.clone()));
            }
        }
        if let Some(contact) = &filter.contact {
            if contact.has_id() {
                clauses.push(format!("s.contact_id = ${}", clauses.len() + 1));
                binds.push(Bind::Text(contact.id.clone()));
            } else if contact.has_subject() {
                clauses.push(format!(
                    "s.contact_iss = ${} AND s.contact_sub = ${}",
                    clauses.len() + 1,
                    clauses.len() + 2
                ));
                binds.push(Bind::Text(contact.iss.clone()));
                binds.push(Bind::Text(contact.sub.clone()));
            }
        }
        if let Some(token) = &filter.token {
            clauses.push(format!("t.token = ${}", clauses.len() + 1));
            binds.push(Bind::Text(token.clone()));
        }
        if filter.push_only {
            clauses.push("s.push_token IS NOT NULL".to_string());
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY s.created_at DESC, s.id ASC");

        let size = if filter.size == 0 { 50 } else { filter.size };
        let page = filter.page.max(1);
        sql.push_str(&format!(" LIMIT {size} OFFSET {}", (page - 1) * size));

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Bind::I64(v) => query.bind(v),
                Bind::Uuid(v) => query.bind(v),
                Bind::Text(v) => query.bind(v),
            };
        }
        let rows = query.fetch_all(&self.pool).await.map_err(CoreError::from)?;
        rows.into_iter()
            .map(row_to_session_row)
            .map(|r| r.and_then(Session::try_from))
            .collect()
    }

    async fn insert(&self, session: Session) -> Result<Session, CoreError> {
        let user_agent_json =
            serde_json::to_value(&session.device.user_agent).map_err(|e| CoreError::internal(e.to_string()))?;
        let metadata_json = serde_json::to_value(&session.metadata).map_err(|e| CoreError::internal(e.to_string()))?;

        let row = sqlx::query(
            r#"
            INSERT INTO session (
                id, dc, created_at, name, app_id, device_id, user_agent, remote_addr,
                contact_dc, contact_id, contact_iss, contact_sub, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, dc, created_at, name, app_id, device_id, user_agent,
                remote_addr::text AS remote_addr, NULL::jsonb AS push_json,
                contact_dc, contact_id, contact_iss, contact_sub, metadata AS metadata_json,
                NULL::uuid AS grant_id, NULL::text AS grant_type, NULL::text AS grant_token,
                NULL::text AS grant_refresh, NULL::text[] AS grant_scope,
                NULL::timestamptz AS grant_issued_at, NULL::timestamptz AS grant_expires_at,
                NULL::timestamptz AS grant_revoked_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.dc)
        .bind(OffsetDateTime::now_utc())
        .bind(&session.name)
        .bind(&session.app_id)
        .bind(&session.device.id)
        .bind(user_agent_json)
        .bind(session.device.remote_addr.map(|a| a.to_string()))
        .bind(session.contact.dc)
        .bind(&session.contact.id)
        .bind(&session.contact.iss)
        .bind(&session.contact.sub)
        .bind(metadata_json)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::from)?;

        Session::try_from(row_to_session_row(row)?)
    }

    async fn replace_grant(&self, session_id: Uuid, grant: AccessToken) -> Result<Session, CoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_token (id, type, token, refresh, scope, rotated_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL)
            ON CONFLICT (id) DO UPDATE SET
                type = EXCLUDED.type, token = EXCLUDED.token, refresh = EXCLUDED.refresh,
                scope = EXCLUDED.scope, rotated_at = EXCLUDED.rotated_at,
                expires_at = EXCLUDED.expires_at, revoked_at = NULL
            "#,
        )
        .bind(session_id)
        .bind(&grant.kind)
        .bind(&grant.token)
        .bind(&grant.refresh)
        .bind(&grant.scope)
        .bind(grant.issued_at)
        .bind(grant.expires_at)
        .execute(&self.pool)
        .await
        .map_err(CoreError::from)?;

        self.find_one(ListSessionsFilter {
            id: Some(session_id),
            page: 1,
            size: 1,
            ..Default::default()
        })
        .await?
        .ok_or_else(|| CoreError::not_found("session: not found after minting grant"))
    }

    async fn set_push(
        &self,
        session_id: Uuid,
        device: Device,
        push: Option<PushSubscription>,
    ) -> Result<Session, CoreError> {
        let push_json = match &push {
            Some(p) => Some(serde_json::to_value(p).map_err(|e| CoreError::internal(e.to_string()))?),
            None => None,
        };
        sqlx::query("UPDATE session SET device_id = $2, push_token = $3 WHERE id = $1")
            .bind(session_id)
            .bind(&device.id)
            .bind(push_json)
            .execute(&self.pool)
            .await
            .map_err(CoreError::from)?;

        self.find_one(ListSessionsFilter {
            id: Some(session_id),
            page: 1,
            size: 1,
            ..Default::default()
        })
        .await?
        .ok_or_else(|| CoreError::not_found("session: not found after push update"))
    }

    async fn delete(&self, session_id: Uuid) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM session WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }
}
