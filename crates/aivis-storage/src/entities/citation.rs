use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "citations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub project_id: String,
    pub keyword_id: String,
    pub platform: String,
    pub tracked_at: DateTimeWithTimeZone,
    pub domain_mentioned: bool,
    pub citation_position: Option<i32>,
    pub citation_context: Option<String>,
    pub full_response_text: String,
    pub response_summary: String,
    pub sentiment: String,
    pub confidence_score: f64,
    pub word_count: i32,
    pub competitor_citations: String,
    pub total_sources_cited: i32,
    pub response_time_ms: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
