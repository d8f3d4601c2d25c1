//! Service category hierarchy manager.
//!
//! Categories form per-business trees. Every node records its root so
//! ancestry checks never walk the tree. The manager keeps `root_id`
//! consistent on create, refuses to touch built-in records, and refuses to
//! delete anything still referenced by child categories or service templates.
//!
//! Each record carries a `version` that is bumped on rename and whenever a
//! child is attached. Deletes are conditional on the version that was
//! checked, so a child inserted between the dependency count and the delete
//! makes the delete re-check instead of orphaning the child.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::business;
use crate::context::RequestContext;
use crate::db::{
    DocumentStore, DocumentStoreExt, Filter, TABLE_BUSINESS, TABLE_SERVICE_CATEGORY,
    TABLE_SERVICE_TEMPLATE,
};
use crate::error::{Dependents, Error, Result, StoreError};
use crate::models::{
    BusinessScope, MultipleServiceCategory, ServiceCategory, ServiceCategoryWithStatistics,
};

pub(crate) const FIELD_ID: &str = "id";
pub(crate) const FIELD_NAME: &str = "name";
pub(crate) const FIELD_UPDATED_AT: &str = "updated_at";
pub(crate) const FIELD_PARENT_ID: &str = "parent_id";
pub(crate) const FIELD_METADATA: &str = "metadata";
pub(crate) const FIELD_VERSION: &str = "version";
pub(crate) const FIELD_SERVICE_CATEGORY_ID: &str = "service_category_id";

/// Parameter name reported when the business id in `metadata` is unusable.
pub(crate) const PARAM_BUSINESS_ID: &str = "metadata.label.bk_biz_id";

/// A delete gives up after losing this many version races.
const MAX_ATTEMPTS: usize = 3;

pub(crate) fn by_id(id: i64) -> Filter {
    Filter::new().eq(FIELD_ID, id)
}

pub(crate) fn in_business(business_id: i64) -> Filter {
    Filter::new().eq(
        FIELD_METADATA,
        BusinessScope::from_business_id(business_id).to_filter_value(),
    )
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn log_failure(ctx: &RequestContext, table: &str, err: &Error, message: &str) {
    tracing::error!(
        table,
        rid = %ctx.request_id,
        code = err.code(),
        error = %err,
        "{message}"
    );
}

/// Log `err` against `table` and hand it back for returning.
pub(crate) fn fail(ctx: &RequestContext, table: &str, err: Error, message: &str) -> Error {
    log_failure(ctx, table, &err, message);
    err
}

/// `map_err` adapter: wrap a store error unchanged, logging it first.
pub(crate) fn store_failure<'a>(
    ctx: &'a RequestContext,
    table: &'a str,
    message: &'a str,
) -> impl FnOnce(StoreError) -> Error + 'a {
    move |source| fail(ctx, table, Error::Store(source), message)
}

#[derive(Clone)]
pub(crate) struct CategoryManager {
    store: Arc<dyn DocumentStore>,
}

impl CategoryManager {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Persist a new, non-built-in category.
    ///
    /// Only `name`, `parent_id` and the business id inside `scope` are taken
    /// from the caller; everything else is assigned here.
    pub(crate) fn create_service_category(
        &self,
        ctx: &RequestContext,
        mut category: ServiceCategory,
    ) -> Result<ServiceCategory> {
        let _span =
            tracing::info_span!("create_service_category", rid = %ctx.request_id).entered();

        if let Err(err) = category.validate() {
            return Err(fail(ctx, TABLE_SERVICE_CATEGORY, err, "validation failed"));
        }
        let business_id = self.validate_business_id(ctx, &category.scope)?;

        // drop any labels other than the business id
        category.scope = BusinessScope::from_business_id(business_id);

        if !category.is_root() {
            let parent = self.resolve_parent(ctx, business_id, category.parent_id)?;
            category.root_id = parent.root_id;
        }

        let id = self
            .store
            .next_sequence(TABLE_SERVICE_CATEGORY)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "generate id failed"))?;
        category.id = id as i64;
        if category.is_root() {
            category.root_id = category.id;
        }

        category.is_built_in = false;
        category.version = 0;
        category.supplier_account = ctx.supplier_account.clone();
        category.created_at = now();
        category.updated_at = category.created_at.clone();

        self.store
            .insert_record(TABLE_SERVICE_CATEGORY, &category)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "insert failed"))?;

        if !category.is_root() {
            self.attach_to_parent(ctx, &category)?;
        }

        tracing::info!(
            id = category.id,
            root_id = category.root_id,
            parent_id = category.parent_id,
            business_id,
            "service category created"
        );
        Ok(category)
    }

    /// Look a category up by id alone, whatever business it belongs to.
    pub(crate) fn get_service_category(
        &self,
        ctx: &RequestContext,
        category_id: i64,
    ) -> Result<ServiceCategory> {
        self.lookup(ctx, by_id(category_id), category_id)
    }

    /// Like [`Self::get_service_category`], but a category of another
    /// business is reported as not found.
    pub(crate) fn get_service_category_in_business(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        category_id: i64,
    ) -> Result<ServiceCategory> {
        let filter = in_business(business_id).eq(FIELD_ID, category_id);
        self.lookup(ctx, filter, category_id)
    }

    /// Rename a category. No other field can be changed through this path.
    ///
    /// Concurrent renames do not conflict: the last write wins, and each one
    /// bumps the version.
    pub(crate) fn update_service_category(
        &self,
        ctx: &RequestContext,
        category_id: i64,
        input: ServiceCategory,
    ) -> Result<ServiceCategory> {
        let _span = tracing::info_span!(
            "update_service_category",
            rid = %ctx.request_id,
            id = category_id
        )
        .entered();

        let mut category = self.get_service_category(ctx, category_id)?;
        category.name = input.name;
        if let Err(err) = category.validate() {
            return Err(fail(ctx, TABLE_SERVICE_CATEGORY, err, "validation failed"));
        }

        if category.is_built_in {
            return Err(fail(
                ctx,
                TABLE_SERVICE_CATEGORY,
                Error::OperationForbidden { id: category_id },
                "forbidden update built-in category",
            ));
        }

        let mut patch = Map::new();
        patch.insert(FIELD_NAME.to_string(), Value::String(category.name));
        patch.insert(FIELD_UPDATED_AT.to_string(), Value::String(now()));

        let filter = by_id(category_id);
        let matched = self
            .store
            .update(TABLE_SERVICE_CATEGORY, &filter, &Value::Object(patch))
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "update failed"))?;
        if matched == 0 {
            return Err(fail(
                ctx,
                TABLE_SERVICE_CATEGORY,
                Error::NotFound { id: category_id },
                "category removed during update",
            ));
        }
        self.store
            .increment(TABLE_SERVICE_CATEGORY, &filter, FIELD_VERSION)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "bump version failed"))?;

        let updated = self.get_service_category(ctx, category_id)?;
        tracing::info!(id = category_id, name = %updated.name, "service category updated");
        Ok(updated)
    }

    /// All categories of a business, in store order.
    ///
    /// With `with_statistics`, each entry also reports how many service
    /// templates use it and how many direct children it has.
    pub(crate) fn list_service_categories(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        with_statistics: bool,
    ) -> Result<MultipleServiceCategory> {
        let _span = tracing::info_span!(
            "list_service_categories",
            rid = %ctx.request_id,
            business_id
        )
        .entered();

        let categories: Vec<ServiceCategory> = self
            .store
            .find_all_records(TABLE_SERVICE_CATEGORY, &in_business(business_id))
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "list failed"))?;

        let info = categories
            .into_iter()
            .map(|category| -> Result<ServiceCategoryWithStatistics> {
                if !with_statistics {
                    return Ok(ServiceCategoryWithStatistics {
                        category,
                        usage_amount: None,
                        child_amount: None,
                    });
                }
                let usage_amount = self.count_templates(ctx, category.id)?;
                let child_amount = self.count_children(ctx, category.id)?;
                Ok(ServiceCategoryWithStatistics {
                    category,
                    usage_amount: Some(usage_amount),
                    child_amount: Some(child_amount),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MultipleServiceCategory {
            count: info.len() as i64,
            info,
        })
    }

    /// Remove a leaf category that no service template uses.
    pub(crate) fn delete_service_category(&self, ctx: &RequestContext, category_id: i64) -> Result<()> {
        let _span = tracing::info_span!(
            "delete_service_category",
            rid = %ctx.request_id,
            id = category_id
        )
        .entered();

        for attempt in 1..=MAX_ATTEMPTS {
            let category = self.get_service_category(ctx, category_id)?;

            if category.is_built_in {
                return Err(fail(
                    ctx,
                    TABLE_SERVICE_CATEGORY,
                    Error::OperationForbidden { id: category.id },
                    "forbidden delete built-in category",
                ));
            }

            let children = self.count_children(ctx, category.id)?;
            if children > 0 {
                return Err(fail(
                    ctx,
                    TABLE_SERVICE_CATEGORY,
                    Error::HasDependents {
                        id: category.id,
                        dependents: Dependents::Children,
                        count: children,
                    },
                    "forbidden delete category has children node",
                ));
            }

            let usage = self.count_templates(ctx, category.id)?;
            if usage > 0 {
                return Err(fail(
                    ctx,
                    TABLE_SERVICE_TEMPLATE,
                    Error::HasDependents {
                        id: category.id,
                        dependents: Dependents::Templates,
                        count: usage,
                    },
                    "forbidden delete category referenced by service template",
                ));
            }

            let filter = by_id(category.id).eq(FIELD_VERSION, category.version);
            let removed = self
                .store
                .delete(TABLE_SERVICE_CATEGORY, &filter)
                .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "delete failed"))?;
            if removed > 0 {
                tracing::info!(id = category.id, "service category deleted");
                return Ok(());
            }
            tracing::warn!(
                rid = %ctx.request_id,
                id = category.id,
                attempt,
                "service category changed during delete, re-checking"
            );
        }

        Err(fail(
            ctx,
            TABLE_SERVICE_CATEGORY,
            Error::Conflict { id: category_id },
            "delete gave up",
        ))
    }

    fn lookup(
        &self,
        ctx: &RequestContext,
        filter: Filter,
        category_id: i64,
    ) -> Result<ServiceCategory> {
        self.store
            .find_one_record(TABLE_SERVICE_CATEGORY, &filter)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "get service category failed"))?
            .ok_or_else(|| {
                fail(
                    ctx,
                    TABLE_SERVICE_CATEGORY,
                    Error::NotFound { id: category_id },
                    "get service category failed",
                )
            })
    }

    fn validate_business_id(&self, ctx: &RequestContext, scope: &BusinessScope) -> Result<i64> {
        let Some(business_id) = scope.business_id() else {
            return Err(fail(
                ctx,
                TABLE_SERVICE_CATEGORY,
                Error::invalid(PARAM_BUSINESS_ID, "missing or non-positive business id"),
                "validation failed",
            ));
        };

        let registered = business::is_registered(self.store.as_ref(), business_id)
            .map_err(store_failure(ctx, TABLE_BUSINESS, "business lookup failed"))?;
        if !registered {
            return Err(fail(
                ctx,
                TABLE_BUSINESS,
                Error::invalid(
                    PARAM_BUSINESS_ID,
                    format!("business {business_id} does not exist"),
                ),
                "validation failed",
            ));
        }
        Ok(business_id)
    }

    fn resolve_parent(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        parent_id: i64,
    ) -> Result<ServiceCategory> {
        match self.get_service_category_in_business(ctx, business_id, parent_id) {
            Err(Error::NotFound { .. }) => Err(fail(
                ctx,
                TABLE_SERVICE_CATEGORY,
                Error::invalid(
                    FIELD_PARENT_ID,
                    format!("category {parent_id} does not exist in business {business_id}"),
                ),
                "parent id invalid",
            )),
            other => other,
        }
    }

    /// Bump the parent's version now that `child` is stored.
    ///
    /// The bump is an unconditional increment, so siblings created at the same
    /// time never contend. If the parent is already gone the child is removed
    /// again, so no orphan survives a concurrent delete of its parent.
    fn attach_to_parent(&self, ctx: &RequestContext, child: &ServiceCategory) -> Result<()> {
        let matched = self
            .store
            .increment(TABLE_SERVICE_CATEGORY, &by_id(child.parent_id), FIELD_VERSION)
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "touch parent failed"))?;
        if matched > 0 {
            return Ok(());
        }

        self.remove_orphan(ctx, child)?;
        Err(fail(
            ctx,
            TABLE_SERVICE_CATEGORY,
            Error::invalid(
                FIELD_PARENT_ID,
                format!("category {} was removed concurrently", child.parent_id),
            ),
            "parent id invalid",
        ))
    }

    fn remove_orphan(&self, ctx: &RequestContext, child: &ServiceCategory) -> Result<()> {
        self.store
            .delete(TABLE_SERVICE_CATEGORY, &by_id(child.id))
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "roll back child failed"))?;
        Ok(())
    }

    fn count_children(&self, ctx: &RequestContext, category_id: i64) -> Result<u64> {
        self.store
            .count(
                TABLE_SERVICE_CATEGORY,
                &Filter::new().eq(FIELD_PARENT_ID, category_id),
            )
            .map_err(store_failure(ctx, TABLE_SERVICE_CATEGORY, "count children failed"))
    }

    fn count_templates(&self, ctx: &RequestContext, category_id: i64) -> Result<u64> {
        self.store
            .count(
                TABLE_SERVICE_TEMPLATE,
                &Filter::new().eq(FIELD_SERVICE_CATEGORY_ID, category_id),
            )
            .map_err(store_failure(ctx, TABLE_SERVICE_TEMPLATE, "count templates failed"))
    }
}
