//! Message log operations.
//!
//! The log is append-only: every inbound user message is recorded before the
//! turn is processed, and every outbound AI reply is recorded before it is
//! dispatched. The only after-the-fact mutation is attaching the
//! continuation token a general-assistant turn produced for its inbound row.

use crate::{
    entities::{Message, message},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Logs an inbound user message.
pub async fn log_inbound(
    db: &DatabaseConnection,
    user_id: i64,
    content: &str,
) -> Result<message::Model> {
    let model = message::ActiveModel {
        user_id: Set(user_id),
        content: Set(content.to_string()),
        is_from_ai: Set(false),
        options: Set(None),
        ai_response_id: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Logs an outbound AI reply, serializing any reply options as JSON.
pub async fn log_outbound(
    db: &DatabaseConnection,
    user_id: i64,
    content: &str,
    options: &[String],
) -> Result<message::Model> {
    let serialized = if options.is_empty() {
        None
    } else {
        Some(
            serde_json::to_string(options).map_err(|e| Error::Config {
                message: format!("failed to serialize reply options: {e}"),
            })?,
        )
    };
    let model = message::ActiveModel {
        user_id: Set(user_id),
        content: Set(content.to_string()),
        is_from_ai: Set(true),
        options: Set(serialized),
        ai_response_id: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// The most recent inbound message logged before the given one.
///
/// Holds the continuation token that keeps multi-turn general chat coherent.
pub async fn latest_prior_inbound(
    db: &DatabaseConnection,
    user_id: i64,
    before_message_id: i64,
) -> Result<Option<message::Model>> {
    Message::find()
        .filter(message::Column::UserId.eq(user_id))
        .filter(message::Column::IsFromAi.eq(false))
        .filter(message::Column::Id.lt(before_message_id))
        .order_by_desc(message::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Attaches the continuation token produced for a general-assistant turn.
pub async fn attach_response_id(
    db: &DatabaseConnection,
    message_id: i64,
    response_id: &str,
) -> Result<message::Model> {
    let found = Message::find_by_id(message_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::Config {
            message: format!("message {message_id} not found"),
        })?;
    let mut active: message::ActiveModel = found.into();
    active.ai_response_id = Set(Some(response_id.to_string()));
    active.update(db).await.map_err(Into::into)
}

/// A user's full message history, oldest first.
pub async fn get_messages_by_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<message::Model>> {
    Message::find()
        .filter(message::Column::UserId.eq(user_id))
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_log_and_list_messages() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let inbound = log_inbound(&db, user.id, "how much did I spend?").await?;
        assert!(!inbound.is_from_ai);
        assert_eq!(inbound.options, None);

        let options = vec!["Weekly food".to_string(), "One-off treat".to_string()];
        let outbound = log_outbound(&db, user.id, "What was the occasion?", &options).await?;
        assert!(outbound.is_from_ai);
        let stored: Vec<String> =
            serde_json::from_str(outbound.options.as_deref().unwrap()).unwrap();
        assert_eq!(stored, options);

        let history = get_messages_by_user(&db, user.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, inbound.id);
        assert_eq!(history[1].id, outbound.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_outbound_without_options_stores_none() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let outbound = log_outbound(&db, user.id, "Got it, thanks!", &[]).await?;
        assert_eq!(outbound.options, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_latest_prior_inbound_skips_ai_and_current() -> Result<()> {
        let (db, user) = setup_with_user().await?;

        let first = log_inbound(&db, user.id, "first question").await?;
        let first = attach_response_id(&db, first.id, "resp_first").await?;
        log_outbound(&db, user.id, "first answer", &[]).await?;
        let current = log_inbound(&db, user.id, "follow-up").await?;

        let prior = latest_prior_inbound(&db, user.id, current.id).await?.unwrap();
        assert_eq!(prior.id, first.id);
        assert_eq!(prior.ai_response_id.as_deref(), Some("resp_first"));

        // The very first turn has no prior inbound
        let none = latest_prior_inbound(&db, user.id, first.id).await?;
        assert!(none.is_none());

        Ok(())
    }
}
