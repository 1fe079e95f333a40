pub mod core;
pub mod exchanges;

pub use core::errors::{ApiError, ExchangeError};
pub use core::pagination::{Page, Paged, PaginationParams};
pub use core::shape::{Shape, ShapeStore};
pub use exchanges::coinbase::{CoinbaseBuilder, CoinbaseClient, DevelopmentRest};
