mod business;
mod category;
mod config;
mod context;
mod db;
mod error;
mod logging;
mod models;
mod run;
mod template;

use anyhow::Result;
use std::sync::Arc;

use config::Config;
use context::RequestContext;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;
    logging::init(&config.log_filter)?;

    let store = Arc::new(db::SqliteStore::open(&config.db_path)?);
    let services = run::Services {
        categories: category::CategoryManager::new(store.clone()),
        businesses: business::BusinessRegistry::new(store.clone()),
        templates: template::TemplateRegistry::new(store),
    };

    let mut ctx = RequestContext::new(config.supplier_account);
    if let Some(rid) = config.request_id {
        ctx = ctx.with_request_id(rid);
    }
    tracing::debug!(rid = %ctx.request_id, db = %config.db_path.display(), "starting");

    run::as_cli(&args, &services, &ctx)
}
