use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::{document_gap, top_query, user};
use sea_orm_migration::{prelude::*, schema::*};

/// Tables the AI backend writes and the dashboard reads. They may already
/// exist when the AI backend shares the database, hence `if_not_exists`.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TopQuery::table())
                    .if_not_exists()
                    .col(pk_auto(TopQuery::column(top_query::Column::Id)))
                    .col(text(TopQuery::column(top_query::Column::Query)))
                    .col(text(TopQuery::column(top_query::Column::LlmResponse)))
                    .col(text(TopQuery::column(top_query::Column::Source)))
                    .col(json(TopQuery::column(top_query::Column::PageNo)))
                    .col(text_null(TopQuery::column(top_query::Column::Topic)))
                    .col(integer(TopQuery::column(top_query::Column::Count)).default(1))
                    .col(integer_null(TopQuery::column(top_query::Column::UserId)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_top_queries_user")
                            .from(
                                TopQuery::table(),
                                TopQuery::column(top_query::Column::UserId),
                            )
                            .to(User::table(), User::column(user::Column::Id))
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DocumentGap::table())
                    .if_not_exists()
                    .col(pk_auto(DocumentGap::column(document_gap::Column::Id)))
                    .col(text_null(DocumentGap::column(
                        document_gap::Column::MainTopic,
                    )))
                    .col(integer(DocumentGap::column(document_gap::Column::Count)).default(0))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DocumentGap::table()).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TopQuery::table()).to_owned())
            .await?;

        Ok(())
    }
}
