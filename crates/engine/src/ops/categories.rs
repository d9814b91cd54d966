use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};

use crate::{Category, EngineError, ResultEngine, categories};

use super::{Engine, normalize_category_name};

impl Engine {
    /// All categories, ordered by id.
    pub async fn categories(&self) -> ResultEngine<Vec<Category>> {
        let models = categories::Entity::find()
            .order_by_asc(categories::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Category::from).collect())
    }

    /// Register a category. Names are unique after normalization.
    pub async fn create_category(&self, name: &str) -> ResultEngine<Category> {
        let (display, norm) = normalize_category_name(name)?;
        if categories::Entity::find()
            .filter(categories::Column::NameNorm.eq(norm.clone()))
            .one(&self.database)
            .await?
            .is_some()
        {
            return Err(EngineError::ExistingKey(display));
        }

        let model = categories::ActiveModel {
            name: ActiveValue::Set(display),
            name_norm: ActiveValue::Set(norm),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;
        tracing::info!(id = model.id, name = %model.name, "category created");
        Ok(model.into())
    }
}
