use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    #[serde(rename = "bk_biz_id")]
    pub id: i64,
    #[serde(rename = "bk_biz_name")]
    pub name: String,
    #[serde(rename = "bk_supplier_account", default)]
    pub supplier_account: String,
    #[serde(default)]
    pub created_at: String,
}

impl Business {
    pub fn new(id: i64, name: String) -> Self {
        Self {
            id,
            name,
            supplier_account: String::new(),
            created_at: String::new(),
        }
    }
}

impl std::fmt::Display for Business {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
