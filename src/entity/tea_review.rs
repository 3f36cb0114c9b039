use sea_orm::entity::prelude::*;

pub const DEFAULT_RATING: i32 = 3;

pub const RATING_CHOICES: [(i32, &str); 5] = [
    (1, "★☆☆☆☆"),
    (2, "★★☆☆☆"),
    (3, "★★★☆☆"),
    (4, "★★★★☆"),
    (5, "★★★★★"),
];

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_tea_review")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub tea_id: i32,
    pub rating: i32,
    pub content: String,
    pub created: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::tea::Entity",
        from = "Column::TeaId",
        to = "super::tea::Column::Id"
    )]
    Tea,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::tea::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tea.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
