//! Create `group_message` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupMessage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMessage::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::GroupId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::SenderId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupMessage::Text).text())
                    .col(ColumnDef::new(GroupMessage::ImageId).string_len(32))
                    .col(ColumnDef::new(GroupMessage::FileId).string_len(32))
                    .col(
                        ColumnDef::new(GroupMessage::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::IsEdited)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::IsRevoked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GroupMessage::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_message_group")
                            .from(GroupMessage::Table, GroupMessage::GroupId)
                            .to(GroupChat::Table, GroupChat::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_message_sender")
                            .from(GroupMessage::Table, GroupMessage::SenderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_message_group_id")
                    .table(GroupMessage::Table)
                    .col(GroupMessage::GroupId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_message_created_at")
                    .table(GroupMessage::Table)
                    .col(GroupMessage::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupMessage::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GroupMessage {
    Table,
    Id,
    GroupId,
    SenderId,
    Text,
    ImageId,
    FileId,
    IsRead,
    IsEdited,
    IsRevoked,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum GroupChat {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
