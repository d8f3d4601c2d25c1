//! Minimal service template registration.
//!
//! Templates belong to another subsystem; they are recorded here only so
//! that category deletes and usage statistics have something to count.

use std::sync::Arc;

use crate::category::{fail, store_failure, CategoryManager, FIELD_SERVICE_CATEGORY_ID};
use crate::context::RequestContext;
use crate::db::{DocumentStore, DocumentStoreExt, Filter, TABLE_SERVICE_TEMPLATE};
use crate::error::{Error, Result};
use crate::models::{BusinessScope, ServiceTemplate};

#[derive(Clone)]
pub(crate) struct TemplateRegistry {
    store: Arc<dyn DocumentStore>,
    categories: CategoryManager,
}

impl TemplateRegistry {
    pub(crate) fn new(store: Arc<dyn DocumentStore>) -> Self {
        let categories = CategoryManager::new(store.clone());
        Self { store, categories }
    }

    /// Record a template that uses `category_id` of the same business.
    pub(crate) fn add_service_template(
        &self,
        ctx: &RequestContext,
        business_id: i64,
        name: &str,
        category_id: i64,
    ) -> Result<ServiceTemplate> {
        let name = name.trim();
        if name.is_empty() {
            return Err(fail(
                ctx,
                TABLE_SERVICE_TEMPLATE,
                Error::invalid("name", "template name can't be empty"),
                "validation failed",
            ));
        }

        match self
            .categories
            .get_service_category_in_business(ctx, business_id, category_id)
        {
            Ok(_) => {}
            Err(Error::NotFound { .. }) => {
                return Err(fail(
                    ctx,
                    TABLE_SERVICE_TEMPLATE,
                    Error::invalid(
                        FIELD_SERVICE_CATEGORY_ID,
                        format!("category {category_id} does not exist in business {business_id}"),
                    ),
                    "validation failed",
                ));
            }
            Err(err) => return Err(err),
        }

        let id = self
            .store
            .next_sequence(TABLE_SERVICE_TEMPLATE)
            .map_err(store_failure(ctx, TABLE_SERVICE_TEMPLATE, "generate id failed"))?
            as i64;
        let template = ServiceTemplate {
            id,
            name: name.to_string(),
            service_category_id: category_id,
            scope: BusinessScope::from_business_id(business_id),
            supplier_account: ctx.supplier_account.clone(),
        };
        self.store
            .insert_record(TABLE_SERVICE_TEMPLATE, &template)
            .map_err(store_failure(ctx, TABLE_SERVICE_TEMPLATE, "insert failed"))?;

        tracing::info!(id, category_id, business_id, "service template registered");
        Ok(template)
    }

    pub(crate) fn templates_using(
        &self,
        ctx: &RequestContext,
        category_id: i64,
    ) -> Result<Vec<ServiceTemplate>> {
        self.store
            .find_all_records(
                TABLE_SERVICE_TEMPLATE,
                &Filter::new().eq(FIELD_SERVICE_CATEGORY_ID, category_id),
            )
            .map_err(store_failure(ctx, TABLE_SERVICE_TEMPLATE, "list failed"))
    }
}
