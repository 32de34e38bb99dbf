pub mod awning_price;
pub mod catalog;
pub mod config_diff;
pub mod config_links;
pub mod discount;
pub mod ordering;
pub mod reconcile;

pub use awning_price::{quote_awning, AwningPriceQuery, AwningPriceSource};
pub use catalog::{assemble_groups, CatalogRows};
pub use config_diff::{diff_configs, ConfigDiff};
pub use config_links::{relink_config, replace_subconfigs, ConfigLinkStore, SubconfigError};
pub use discount::{apply_discounts, apply_tiers, DiscountContext, DiscountSource};
pub use ordering::{move_item, IndexOutOfRange};
pub use reconcile::{
    reconcile, FieldMappingSource, OrderForwarder, ReconcileError, ReconcileOutcome, RequestStore,
};
