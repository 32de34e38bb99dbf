pub mod pool;
pub mod queries;
pub mod rows;
pub mod store;
pub mod table;

pub use pool::create_pool;
pub use rows::{Filter, Row, Select};
pub use store::PgStore;
pub use table::Table;
