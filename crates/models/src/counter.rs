use sea_orm::{
    entity::prelude::*, sea_query::Expr, ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::errors;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "counters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_key(key: &str) -> Result<(), errors::ModelError> {
    if key.is_empty() {
        return Err(errors::ModelError::Validation("key required".into()));
    }
    Ok(())
}

pub async fn find<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<Model>, DbErr> {
    Entity::find_by_id(key.to_string()).one(db).await
}

/// Plain INSERT; a duplicate key fails on the primary key constraint.
pub async fn insert<C: ConnectionTrait>(db: &C, key: &str, value: i64) -> Result<Model, DbErr> {
    let am = ActiveModel {
        key: Set(key.to_string()),
        value: Set(value),
    };
    am.insert(db).await
}

/// Overwrite the value of an existing row; returns the number of rows touched.
pub async fn set_value<C: ConnectionTrait>(db: &C, key: &str, value: i64) -> Result<u64, DbErr> {
    let res = Entity::update_many()
        .col_expr(Column::Value, Expr::value(value))
        .filter(Column::Key.eq(key))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

/// Delete by key; returns the number of rows removed.
pub async fn delete<C: ConnectionTrait>(db: &C, key: &str) -> Result<u64, DbErr> {
    let res = Entity::delete_by_id(key.to_string()).exec(db).await?;
    Ok(res.rows_affected)
}

pub async fn list<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, DbErr> {
    Entity::find().order_by_asc(Column::Key).all(db).await
}
