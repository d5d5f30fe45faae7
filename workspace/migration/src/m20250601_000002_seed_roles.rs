use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::role;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert
            .into_table(Role::table())
            .columns([Role::column(role::Column::Name)]);

        for name in role::DEFAULT_ROLES {
            insert
                .values([name.into()])
                .map_err(|e| DbErr::Custom(e.to_string()))?;
        }

        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let delete = Query::delete()
            .from_table(Role::table())
            .and_where(Expr::col(Role::column(role::Column::Name)).is_in(role::DEFAULT_ROLES))
            .to_owned();

        manager.exec_stmt(delete).await
    }
}
