//! `SeaORM` Entity for loans table.

use super::sea_orm_active_enums::LoanStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub disbursement_account_id: Uuid,
    pub autopay_account_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub principal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub outstanding: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 6)))")]
    pub weekly_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 6)))")]
    pub penalty_weekly_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub autopay_amount: Decimal,
    pub status: LoanStatus,
    pub autopay_failed_since: Option<Date>,
    pub last_accrued_on: Option<Date>,
    pub last_autopay_on: Option<Date>,
    pub disbursement_transaction_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::loan_payments::Entity")]
    LoanPayments,
}

impl Related<super::loan_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanPayments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
