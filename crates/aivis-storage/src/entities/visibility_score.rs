use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "visibility_scores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub calculated_at: DateTimeWithTimeZone,
    pub overall_score: f64,
    pub grade: String,
    pub frequency_score: f64,
    pub position_score: f64,
    pub diversity_score: f64,
    pub context_score: f64,
    pub momentum_score: f64,
    pub delta_7d: Option<f64>,
    pub delta_30d: Option<f64>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
