//! User business logic - provisioning and WhatsApp identity resolution.
//!
//! Users come into existence either through explicit provisioning or on first
//! contact over the messaging webhook. The balance is only mutated by
//! transaction creation, never through this module.

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Opening balance granted to users created on first WhatsApp contact.
pub const FIRST_CONTACT_BALANCE: f64 = 1000.0;

/// Creates a user with an explicit name and opening balance.
pub async fn create_user(
    db: &DatabaseConnection,
    name: String,
    balance: f64,
    whatsapp_id: Option<String>,
) -> Result<user::Model> {
    let model = user::ActiveModel {
        name: Set(name),
        balance: Set(balance),
        whatsapp_id: Set(whatsapp_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Creates a user on first contact from the messaging webhook.
pub async fn create_user_from_whatsapp(
    db: &DatabaseConnection,
    whatsapp_id: &str,
    name: &str,
) -> Result<user::Model> {
    create_user(
        db,
        name.to_string(),
        FIRST_CONTACT_BALANCE,
        Some(whatsapp_id.to_string()),
    )
    .await
}

/// Finds a user by id, returning None if absent.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds a user by id, failing with `UserNotFound` if absent.
pub async fn require_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })
}

/// Finds a user by their WhatsApp identity (phone number).
pub async fn get_user_by_whatsapp_id(
    db: &DatabaseConnection,
    whatsapp_id: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::WhatsappId.eq(whatsapp_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Attaches a WhatsApp identity to an existing user.
pub async fn link_whatsapp(
    db: &DatabaseConnection,
    user_id: i64,
    whatsapp_id: &str,
) -> Result<user::Model> {
    let user = require_user(db, user_id).await?;
    let mut active: user::ActiveModel = user.into();
    active.whatsapp_id = Set(Some(whatsapp_id.to_string()));
    active.update(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_and_require_user() -> Result<()> {
        let db = setup_test_db().await?;

        let user = create_user(&db, "Amal".to_string(), 500.0, None).await?;
        assert_eq!(user.name, "Amal");
        assert_eq!(user.balance, 500.0);
        assert_eq!(user.whatsapp_id, None);

        let fetched = require_user(&db, user.id).await?;
        assert_eq!(fetched, user);

        let missing = require_user(&db, 999).await;
        assert!(matches!(
            missing.unwrap_err(),
            Error::UserNotFound { id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_first_contact_creation_and_lookup() -> Result<()> {
        let db = setup_test_db().await?;

        let user = create_user_from_whatsapp(&db, "966500000001", "Osman").await?;
        assert_eq!(user.balance, FIRST_CONTACT_BALANCE);
        assert_eq!(user.whatsapp_id.as_deref(), Some("966500000001"));

        let found = get_user_by_whatsapp_id(&db, "966500000001").await?;
        assert_eq!(found, Some(user));

        let not_found = get_user_by_whatsapp_id(&db, "966599999999").await?;
        assert!(not_found.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_link_whatsapp() -> Result<()> {
        let db = setup_test_db().await?;

        let user = create_user(&db, "Amal".to_string(), 0.0, None).await?;
        let linked = link_whatsapp(&db, user.id, "966500000002").await?;
        assert_eq!(linked.whatsapp_id.as_deref(), Some("966500000002"));

        let fetched = require_user(&db, user.id).await?;
        assert_eq!(fetched.whatsapp_id.as_deref(), Some("966500000002"));

        Ok(())
    }
}
