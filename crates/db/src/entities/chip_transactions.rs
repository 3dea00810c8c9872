//! `SeaORM` Entity for chip_transactions table.

use super::sea_orm_active_enums::ChipTransactionKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "chip_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub kind: ChipTransactionKind,
    pub base_delta: i64,
    pub bonus_delta: i64,
    pub game_session_id: Option<String>,
    pub counterparty_customer_id: Option<Uuid>,
    pub ledger_transaction_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
