//! Entity manager
//!
//! Thin facade over one executor that hands out repositories per entity type
//! and forwards the common operations, so callers juggling several entity
//! types within one request do not have to build each repository by hand.

use rust_decimal::Decimal;

use super::repository::{Fetch, GridParameters, Repository};
use super::traits::Entity;
use crate::db::SqlExecutor;
use crate::error::Result;

pub struct EntityManager<'c, X: SqlExecutor + ?Sized> {
    executor: &'c mut X,
}

impl<'c, X: SqlExecutor + ?Sized> EntityManager<'c, X> {
    pub fn new(executor: &'c mut X) -> Self {
        Self { executor }
    }

    /// Repository for `E`, borrowing this manager's executor.
    pub fn repository<E: Entity>(&mut self) -> Result<Repository<'_, E, X>> {
        Repository::new(&mut *self.executor)
    }

    pub async fn get_one<E: Entity>(&mut self, fetch: Fetch<E::Field>) -> Result<Option<E>> {
        self.repository::<E>()?.get_one(fetch).await
    }

    pub async fn get_one_by_id<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        self.repository::<E>()?.get_one_by_id(id, &[]).await
    }

    pub async fn get_list<E: Entity>(&mut self, fetch: Fetch<E::Field>) -> Result<Vec<E>> {
        self.repository::<E>()?.get_list(fetch).await
    }

    pub async fn get_list_by_parameters<E: Entity>(
        &mut self,
        parameters: &GridParameters,
        fetch: Fetch<E::Field>,
    ) -> Result<(Vec<E>, i64)> {
        self.repository::<E>()?
            .get_list_by_parameters(parameters, fetch)
            .await
    }

    pub async fn get_aggregate<E: Entity>(
        &mut self,
        expression: &str,
        fetch: Fetch<E::Field>,
    ) -> Result<String> {
        self.repository::<E>()?
            .get_aggregate(expression, fetch)
            .await
    }

    pub async fn get_count<E: Entity>(&mut self, fetch: Fetch<E::Field>) -> Result<i64> {
        self.repository::<E>()?.get_count(fetch).await
    }

    pub async fn get_sum<E: Entity>(
        &mut self,
        field: E::Field,
        fetch: Fetch<E::Field>,
    ) -> Result<Decimal> {
        self.repository::<E>()?.get_sum(field, fetch).await
    }

    pub async fn insert<E: Entity>(&mut self, entity: &E) -> Result<Option<i64>> {
        self.repository::<E>()?.insert(entity).await
    }

    pub async fn update<E: Entity>(&mut self, entity: &E, filter: &str) -> Result<bool> {
        self.repository::<E>()?.update(entity, filter).await
    }

    pub async fn update_by_id<E: Entity>(&mut self, entity: &E, id: i64) -> Result<bool> {
        self.repository::<E>()?.update_by_id(entity, id).await
    }

    pub async fn update_entity<E: Entity>(&mut self, entity: &E) -> Result<bool> {
        self.repository::<E>()?.update_entity(entity).await
    }

    pub async fn delete_by_id<E: Entity>(&mut self, id: i64) -> Result<bool> {
        self.repository::<E>()?.delete_by_id(id).await
    }

    pub async fn delete<E: Entity>(&mut self, filter: &str) -> Result<bool> {
        self.repository::<E>()?.delete(filter).await
    }

    pub async fn delete_entity<E: Entity>(&mut self, entity: &E) -> Result<bool> {
        self.repository::<E>()?.delete_entity(entity).await
    }
}
