use crate::entity_iden::EntityIden;
use model::entities::file_upload;
use model::entities::prelude::*;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileUpload::table())
                    .if_not_exists()
                    .col(pk_auto(FileUpload::column(file_upload::Column::Id)))
                    .col(string(FileUpload::column(file_upload::Column::FileName)))
                    .col(
                        string(FileUpload::column(file_upload::Column::StorageKey)).unique_key(),
                    )
                    .col(string(FileUpload::column(file_upload::Column::FileUrl)))
                    .col(string(FileUpload::column(file_upload::Column::FileType)))
                    .col(big_integer(FileUpload::column(file_upload::Column::FileSize)))
                    .col(date_time(FileUpload::column(
                        file_upload::Column::UploadedAt,
                    )))
                    .to_owned(),
            )
            .await?;

        // Listing is newest first
        manager
            .create_index(
                Index::create()
                    .name("idx_file_uploads_uploaded_at")
                    .table(FileUpload::table())
                    .col(FileUpload::column(file_upload::Column::UploadedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileUpload::table()).to_owned())
            .await
    }
}
