use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::BusinessScope;
use crate::error::{Error, Result};

pub const NAME_MAX_LENGTH: usize = 256;

/// Printable, single-line, no surrounding whitespace.
const NAME_PATTERN: &str = r"^[^\s\p{Cc}](?:[^\p{Cc}]*[^\s\p{Cc}])?$";

fn name_regex() -> Option<&'static Regex> {
    static NAME_RE: OnceLock<Option<Regex>> = OnceLock::new();
    NAME_RE.get_or_init(|| Regex::new(NAME_PATTERN).ok()).as_ref()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub root_id: i64,
    #[serde(default)]
    pub parent_id: i64,
    #[serde(rename = "metadata", default)]
    pub scope: BusinessScope,
    #[serde(rename = "bk_supplier_account", default)]
    pub supplier_account: String,
    #[serde(default)]
    pub is_built_in: bool,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl ServiceCategory {
    /// A not-yet-persisted category; `parent_id == 0` makes it a root.
    pub fn new(name: String, parent_id: i64, business_id: i64) -> Self {
        Self {
            id: 0,
            name,
            root_id: 0,
            parent_id,
            scope: BusinessScope::from_business_id(business_id),
            supplier_account: String::new(),
            is_built_in: false,
            version: 0,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid("name", "name can't be empty"));
        }
        let len = self.name.chars().count();
        if len > NAME_MAX_LENGTH {
            return Err(Error::invalid(
                "name",
                format!("name too long, input: {len} > max: {NAME_MAX_LENGTH}"),
            ));
        }
        if !name_regex().is_some_and(|re| re.is_match(&self.name)) {
            return Err(Error::invalid(
                "name",
                "name must be a single line without surrounding whitespace",
            ));
        }
        if self.parent_id < 0 {
            return Err(Error::invalid("parent_id", "parent id can't be negative"));
        }
        Ok(())
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A category as returned by list, optionally carrying usage figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCategoryWithStatistics {
    #[serde(flatten)]
    pub category: ServiceCategory,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub child_amount: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleServiceCategory {
    pub count: i64,
    pub info: Vec<ServiceCategoryWithStatistics>,
}
