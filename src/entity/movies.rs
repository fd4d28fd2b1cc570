use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub year: i32,
    pub duration_min: i32,
    pub imdb_rating: f64,
    pub votes: i32,
    pub price: i64,
    pub certification: Option<String>,
    pub is_available: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::favorites::Entity")]
    Favorites,
    #[sea_orm(has_many = "super::cart_items::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
    #[sea_orm(has_many = "super::ratings::Entity")]
    Ratings,
    #[sea_orm(has_many = "super::likes::Entity")]
    Likes,
}

impl Related<super::favorites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Favorites.def()
    }
}

impl Related<super::cart_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ratings.def()
    }
}

impl Related<super::likes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Likes.def()
    }
}

impl Related<super::genres::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_genres::Relation::Genres.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_genres::Relation::Movies.def().rev())
    }
}

impl Related<super::actors::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_actors::Relation::Actors.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_actors::Relation::Movies.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
