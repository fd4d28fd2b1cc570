use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "genres")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::movies::Entity> for Entity {
    fn to() -> RelationDef {
        super::movie_genres::Relation::Movies.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::movie_genres::Relation::Genres.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
