//! Direct message entity.
//!
//! Lifecycle: created, then optionally edited (`is_edited`) and/or revoked
//! (`is_revoked`, terminal), and marked read by the recipient.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Sender user ID
    #[sea_orm(indexed)]
    pub sender_id: String,

    /// Recipient user ID
    #[sea_orm(indexed)]
    pub recipient_id: String,

    /// Message text content
    #[sea_orm(column_type = "Text", nullable)]
    pub text: Option<String>,

    /// Attached image stored-file ID
    #[sea_orm(nullable)]
    pub image_id: Option<String>,

    /// Attached document stored-file ID
    #[sea_orm(nullable)]
    pub file_id: Option<String>,

    /// Has the recipient read this message?
    #[sea_orm(default_value = false)]
    pub is_read: bool,

    /// Has the sender edited this message?
    #[sea_orm(default_value = false)]
    pub is_edited: bool,

    /// Has the sender revoked this message?
    #[sea_orm(default_value = false)]
    pub is_revoked: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,

    #[sea_orm(
        belongs_to = "super::stored_file::Entity",
        from = "Column::FileId",
        to = "super::stored_file::Column::Id"
    )]
    File,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl Related<super::stored_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::File.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
