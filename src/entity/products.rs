use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable identifier chosen by the catalog editor.
    #[sea_orm(unique)]
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub size: Option<String>,
    pub tone: Option<String>,
    pub product_type: String,
    pub category: String,
    pub brand: String,
    pub images: Vec<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub description: String,
    pub details: Vec<String>,
    pub care_instructions: Vec<String>,
    pub in_stock: bool,
    pub rating: f64,
    pub review_count: i32,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
