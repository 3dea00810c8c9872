//! `SeaORM` Entity for chip_locks table.

use super::sea_orm_active_enums::ChipLockStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "chip_locks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub game_session_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: Uuid,
    pub locked_base: i64,
    pub locked_bonus: i64,
    pub status: ChipLockStatus,
    pub payout: Option<i64>,
    pub created_at: DateTimeWithTimeZone,
    pub settled_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
