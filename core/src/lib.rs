//! Shared building blocks for the Tableau MCP tools: cursor-style page accumulation,
//! bounded-context result shaping, and the REST content types both sides exchange.

pub mod bounded;
pub mod content;
pub mod error;
pub mod pagination;

pub use bounded::{BoundedContext, ConstrainedResult, Dimension, ResourcePolicy};
pub use error::ContentError;
pub use pagination::{Page, PageConfig, PageRequest, Pagination, effective_limit, paginate};
