//! Business registration and built-in category provisioning.
//!
//! Registering a business is the only path that creates built-in
//! categories: every business starts with a `Default > Default` pair that
//! can be neither renamed nor deleted.

use std::sync::Arc;

use crate::category::{fail, now, store_failure};
use crate::context::RequestContext;
use crate::db::{
    DocumentStore, DocumentStoreExt, Filter, StoreResult, TABLE_BUSINESS, TABLE_SERVICE_CATEGORY,
};
use crate::error::{Error, Result};
use crate::models::{Business, BusinessScope, ServiceCategory};

pub(crate) const FIELD_BUSINESS_ID: &str = "bk_biz_id";

pub(crate) const BUILTIN_CATEGORY_NAME: &str = "Default";

pub(crate) fn is_registered(store: &dyn DocumentStore, business_id: i64) -> StoreResult<bool> {
    let count = store.count(
        TABLE_BUSINESS,
        &Filter::new().eq(FIELD_BUSINESS_ID, business_id),
    )?;
    Ok(count > 0)
}

#[derive(Clone)]
pub(crate) struct BusinessRegistry {
    store: Arc<dyn DocumentStore>,
}

impl BusinessRegistry {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Register a business and seed its built-in categories.
    pub(crate) fn add_business(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        name: &str,
    ) -> Result<Business> {
        let _span =
            tracing::info_span!("add_business", rid = %ctx.request_id, business_id).entered();

        if business_id <= 0 {
            return Err(fail(
                ctx,
                TABLE_BUSINESS,
                Error::invalid(FIELD_BUSINESS_ID, "business id must be positive"),
                "validation failed",
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(fail(
                ctx,
                TABLE_BUSINESS,
                Error::invalid("bk_biz_name", "business name can't be empty"),
                "validation failed",
            ));
        }

        let registered = is_registered(self.store.as_ref(), business_id)
            .map_err(store_failure(ctx, TABLE_BUSINESS, "business lookup failed"))?;
        if registered {
            return Err(fail(
                ctx,
                TABLE_BUSINESS,
                Error::AlreadyExists {
                    field: FIELD_BUSINESS_ID,
                    value: business_id.to_string(),
                },
                "business already registered",
            ));
        }

        let business = Business {
            id: business_id,
            name: name.to_string(),
            supplier_account: ctx.supplier_account.clone(),
            created_at: now(),
        };
        self.store
            .insert_record(TABLE_BUSINESS, &business)
            .map_err(store_failure(ctx, TABLE_BUSINESS, "insert failed"))?;

        let seeded = self.seed_builtin_categories(ctx, business_id)?;
        tracing::info!(
            business_id,
            builtin_categories = seeded.len(),
            "business registered"
        );
        Ok(business)
    }

    pub(crate) fn list_businesses(&self, ctx: &RequestContext) -> Result<Vec<Business>> {
        self.store
            .find_all_records(TABLE_BUSINESS, &Filter::new())
            .map_err(store_failure(ctx, TABLE_BUSINESS, "list failed"))
    }

    fn seed_builtin_categories(
        &self,
        ctx: &RequestContext,
        business_id: i64,
    ) -> Result<Vec<ServiceCategory>> {
        let root = self.insert_builtin(ctx, business_id, 0, 0)?;
        let child = self.insert_builtin(ctx, business_id, root.id, root.root_id)?;
        Ok(vec![root, child])
    }

    fn insert_builtin(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        parent_id: i64,
        root_id: i64,
    ) -> Result<ServiceCategory> {
        let id = self
            .store
            .next_sequence(TABLE_SERVICE_CATEGORY)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "generate id failed"))?
            as i64;
        let stamp = now();
        let category = ServiceCategory {
            id,
            name: BUILTIN_CATEGORY_NAME.to_string(),
            root_id: if root_id == 0 { id } else { root_id },
            parent_id,
            scope: BusinessScope::from_business_id(business_id),
            supplier_account: ctx.supplier_account.clone(),
            is_built_in: true,
            version: 0,
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        self.store
            .insert_record(TABLE_SERVICE_CATEGORY, &category)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "insert failed"))?;
        Ok(category)
    }
}
