//! Typed facade over an [`ObjectStore`]

use keel_types::{DynamicObject, ObjectKey, Resource};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::store::{ListParams, ObjectStore};

/// Typed access to one resource kind
pub struct Api<R> {
    store: Arc<dyn ObjectStore>,
    _kind: PhantomData<fn() -> R>,
}

impl<R> Clone for Api<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<R: Resource> Api<R> {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn get(&self, key: &ObjectKey) -> StoreResult<Option<R>> {
        match self.store.get(R::KIND, key).await? {
            Some(object) => Ok(Some(object.into_resource()?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self, params: &ListParams) -> StoreResult<Vec<R>> {
        self.store
            .list(R::KIND, params)
            .await?
            .into_iter()
            .map(|object| object.into_resource().map_err(Into::into))
            .collect()
    }

    pub async fn list_all(&self) -> StoreResult<Vec<R>> {
        self.list(&ListParams::all()).await
    }

    pub async fn create(&self, resource: &R) -> StoreResult<R> {
        let created = self.store.create(DynamicObject::from_resource(resource)?).await?;
        Ok(created.into_resource()?)
    }

    pub async fn update(&self, resource: &R) -> StoreResult<R> {
        let updated = self.store.update(DynamicObject::from_resource(resource)?).await?;
        Ok(updated.into_resource()?)
    }

    pub async fn update_status(&self, resource: &R) -> StoreResult<R> {
        let updated = self
            .store
            .update_status(DynamicObject::from_resource(resource)?)
            .await?;
        Ok(updated.into_resource()?)
    }

    pub async fn delete(&self, key: &ObjectKey) -> StoreResult<bool> {
        self.store.delete(R::KIND, key).await
    }
}
