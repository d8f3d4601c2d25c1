use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const LABEL_BUSINESS_ID: &str = "bk_biz_id";

/// Tenant scope embedded in every category, e.g. `{"label": {"bk_biz_id": "100"}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessScope {
    #[serde(default)]
    pub label: BTreeMap<String, String>,
}

impl BusinessScope {
    pub fn from_business_id(business_id: i64) -> Self {
        let mut label = BTreeMap::new();
        label.insert(LABEL_BUSINESS_ID.to_string(), business_id.to_string());
        Self { label }
    }

    /// The business this scope points at, if the label holds a positive id.
    pub fn business_id(&self) -> Option<i64> {
        self.label
            .get(LABEL_BUSINESS_ID)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
    }

    /// The exact value stored under `metadata`, for equality filters.
    pub fn to_filter_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
