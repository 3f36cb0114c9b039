use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "t_tea")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: String,
    pub published_at: Option<DateTimeUtc>,
    pub created: Option<DateTimeUtc>,
    pub updated: Option<DateTimeUtc>,
}

impl Model {
    // visible once published_at is set and strictly in the past
    pub fn is_published(&self, now: DateTimeUtc) -> bool {
        matches!(self.published_at, Some(at) if at < now)
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn tea(published_at: Option<DateTimeUtc>) -> Model {
        Model {
            id: 1,
            name: "Sencha".to_string(),
            description: String::new(),
            published_at,
            created: None,
            updated: None,
        }
    }

    #[test]
    fn unpublished_tea_is_not_published() {
        assert!(!tea(None).is_published(Utc::now()));
    }

    #[test]
    fn past_publish_date_is_published() {
        let now = Utc::now();
        assert!(tea(Some(now - Duration::days(1))).is_published(now));
    }

    #[test]
    fn publish_boundary_is_exclusive() {
        let now = Utc::now();
        assert!(!tea(Some(now)).is_published(now));
        assert!(!tea(Some(now + Duration::minutes(5))).is_published(now));
    }
}
