//! `SeaORM` Entity for collections_cases table.

use super::sea_orm_active_enums::{CaseKind, CaseStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "collections_cases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub kind: CaseKind,
    pub status: CaseStatus,
    pub assessment_id: Option<Uuid>,
    pub loan_id: Option<Uuid>,
    pub overdue_since: Option<Date>,
    pub blacklisted: bool,
    pub last_swept_on: Option<Date>,
    pub opened_at: DateTimeWithTimeZone,
    pub resolved_at: Option<DateTimeWithTimeZone>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::collection_seizures::Entity")]
    CollectionSeizures,
}

impl Related<super::collection_seizures::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionSeizures.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
