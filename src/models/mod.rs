pub mod pricing;
pub mod request;
pub mod session;

pub use pricing::{DiscountTiers, PricedLine};
pub use request::{
    ArticleKind, FieldMapping, RequestArticle, RequestFilter, RequestRecord, RequestType,
};
pub use session::{AuthUser, ClientContext, CommercialData, Role, UserMetadata};
