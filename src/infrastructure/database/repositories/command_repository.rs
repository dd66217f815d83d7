//! SeaORM implementation of CommandRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use super::{db_err, json_err};
use crate::domain::command::{
    Command, CommandDirection, CommandRepository, CommandStatus, CommandType,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::command;

pub struct SeaOrmCommandRepository {
    db: DatabaseConnection,
}

impl SeaOrmCommandRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: command::Model) -> DomainResult<Command> {
    let command_type = CommandType::parse(&m.command_type).ok_or_else(|| {
        DomainError::Storage(format!("unknown command type '{}'", m.command_type))
    })?;
    Ok(Command {
        uid: m.uid,
        command_type,
        direction: CommandDirection::from_str(&m.direction),
        status: CommandStatus::from_str(&m.status),
        platform_id: m.platform_id,
        authorization_reference: m.authorization_reference,
        target: serde_json::from_value(m.target).map_err(json_err)?,
        response_url: m.response_url,
        message: m.message,
        requested_at: m.requested_at,
        deadline: m.deadline,
        finalized_at: m.finalized_at,
    })
}

// ── CommandRepository impl ──────────────────────────────────────

#[async_trait]
impl CommandRepository for SeaOrmCommandRepository {
    async fn save(&self, c: Command) -> DomainResult<()> {
        debug!(uid = %c.uid, command_type = %c.command_type, "Saving command");

        let existing = command::Entity::find_by_id(c.uid.clone())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "command {} already exists",
                c.uid
            )));
        }

        let model = command::ActiveModel {
            uid: Set(c.uid),
            command_type: Set(c.command_type.as_str().to_string()),
            direction: Set(c.direction.as_str().to_string()),
            status: Set(c.status.as_str().to_string()),
            platform_id: Set(c.platform_id),
            authorization_reference: Set(c.authorization_reference),
            target: Set(serde_json::to_value(&c.target).map_err(json_err)?),
            response_url: Set(c.response_url),
            message: Set(c.message),
            requested_at: Set(c.requested_at),
            deadline: Set(c.deadline),
            finalized_at: Set(c.finalized_at),
        };
        model.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> DomainResult<Option<Command>> {
        command::Entity::find_by_id(uid.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn finalize(
        &self,
        uid: &str,
        status: CommandStatus,
        message: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = command::Entity::update_many()
            .col_expr(command::Column::Status, Expr::value(status.as_str()))
            .col_expr(command::Column::Message, Expr::value(message))
            .col_expr(command::Column::FinalizedAt, Expr::value(Some(at)))
            .filter(command::Column::Uid.eq(uid))
            .filter(command::Column::Status.eq(CommandStatus::Pending.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn find_overdue(
        &self,
        direction: CommandDirection,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Command>> {
        command::Entity::find()
            .filter(command::Column::Status.eq(CommandStatus::Pending.as_str()))
            .filter(command::Column::Direction.eq(direction.as_str()))
            .filter(command::Column::Deadline.lte(now))
            .order_by_asc(command::Column::Deadline)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect()
    }
}
