use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub nickname: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTimeUtc,
    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::favorite_tea::Entity")]
    FavoriteTea,
    #[sea_orm(has_many = "super::tea_review::Entity")]
    TeaReview,
}

impl Related<super::favorite_tea::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FavoriteTea.def()
    }
}

impl Related<super::tea_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TeaReview.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
