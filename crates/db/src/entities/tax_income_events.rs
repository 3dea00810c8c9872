//! `SeaORM` Entity for tax_income_events table.

use super::sea_orm_active_enums::IncomeSource;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_income_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub source_type: IncomeSource,
    pub source_id: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub gross_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub taxable_amount: Decimal,
    pub occurred_on: Date,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
