//! Create `stored_file` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoredFile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoredFile::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoredFile::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(StoredFile::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(StoredFile::ContentType)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StoredFile::Size).big_integer().not_null())
                    .col(ColumnDef::new(StoredFile::Url).string_len(512).not_null())
                    .col(
                        ColumnDef::new(StoredFile::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stored_file_user")
                            .from(StoredFile::Table, StoredFile::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stored_file_user_id")
                    .table(StoredFile::Table)
                    .col(StoredFile::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoredFile::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum StoredFile {
    Table,
    Id,
    UserId,
    Name,
    ContentType,
    Size,
    Url,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
