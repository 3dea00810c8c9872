//! `SeaORM` Entity for collection_seizures table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_seizures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub case_id: Uuid,
    pub account_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub ledger_transaction_id: Uuid,
    pub business_date: Date,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collections_cases::Entity",
        from = "Column::CaseId",
        to = "super::collections_cases::Column::Id"
    )]
    CollectionsCases,
}

impl Related<super::collections_cases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionsCases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
