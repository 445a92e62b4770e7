//! Group message entity. Same lifecycle shape as a direct message but
//! scoped to a group rather than a single recipient.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group_message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub group_id: String,

    /// Sender user ID
    #[sea_orm(indexed)]
    pub sender_id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub text: Option<String>,

    #[sea_orm(nullable)]
    pub image_id: Option<String>,

    #[sea_orm(nullable)]
    pub file_id: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_read: bool,

    #[sea_orm(default_value = false)]
    pub is_edited: bool,

    #[sea_orm(default_value = false)]
    pub is_revoked: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group_chat::Entity",
        from = "Column::GroupId",
        to = "super::group_chat::Column::Id",
        on_delete = "Cascade"
    )]
    Group,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,
}

impl Related<super::group_chat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
