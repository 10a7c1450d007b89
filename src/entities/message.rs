//! Message entity - Append-only log of the conversation with a user.
//!
//! Every inbound user message and every outbound AI reply is recorded here
//! before anything else happens with it. Rows are never mutated after the
//! fact except to attach the completion-provider continuation token produced
//! for a general-assistant turn.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Message database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the user this message belongs to
    pub user_id: i64,
    /// Message text
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// True for outbound AI replies, false for inbound user messages
    pub is_from_ai: bool,
    /// JSON-serialized list of suggested reply options, if any
    pub options: Option<String>,
    /// Continuation token for general-assistant turns, attached after the
    /// reply is produced
    pub ai_response_id: Option<String>,
    /// When the message was logged
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Message and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each message belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
