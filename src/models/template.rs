use serde::{Deserialize, Serialize};

use super::BusinessScope;

/// A service template; only its link to a category matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTemplate {
    pub id: i64,
    pub name: String,
    pub service_category_id: i64,
    #[serde(rename = "metadata", default)]
    pub scope: BusinessScope,
    #[serde(rename = "bk_supplier_account", default)]
    pub supplier_account: String,
}
