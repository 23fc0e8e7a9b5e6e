//! PostgreSQL parameter binding.
//!
//! Rendered parameters are `serde_json::Value`s; [`PgValue`] encodes them
//! for whatever type PostgreSQL inferred for each `$n`.
//!
//! ```ignore
//! let config = EngineConfig::new().placeholder(PlaceholderStyle::Dollar);
//! let result = engine.render("blog.findActive", &ctx)?;
//! let params = result.pg_params();
//! let rows = client.query(&result.sql, &params.params_ref()).await?;
//! ```

mod pg_value;

pub use pg_value::{PgParams, PgValue};
