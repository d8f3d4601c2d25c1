mod business;
mod category;
mod scope;
mod template;

pub use business::Business;
pub use category::{
    MultipleServiceCategory, ServiceCategory, ServiceCategoryWithStatistics, NAME_MAX_LENGTH,
};
pub use scope::{BusinessScope, LABEL_BUSINESS_ID};
pub use template::ServiceTemplate;
