//! Built-in loaders
//!
//! The core normalizer plus the dialect adapters and the render pool they
//! share. Custom loaders implement [`Loader`](crate::loader::Loader)
//! directly and register through the plugin options.

pub mod css;
pub mod dialect;
pub mod render_pool;

pub use css::{CssLoader, CssLoaderOptions, IdentityProcessor, StyleProcessor};
pub use dialect::{DialectLoader, RenderOutput, RenderRequest, StyleRenderer};
pub use render_pool::RenderPool;
