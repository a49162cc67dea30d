//! candlewick-middleware
//!
//! Wrappers layered around a [`BarProvider`](candlewick_core::BarProvider)
//! and the builder that composes them.

mod builder;
mod quota;

pub use crate::builder::ProviderBuilder;
pub use crate::quota::{QuotaAwareProvider, QuotaMiddleware};
