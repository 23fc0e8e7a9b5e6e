//! # dynsql
//!
//! MyBatis-style dynamic SQL templates for Rust.
//!
//! ## Features
//!
//! - **Injection safe**: `#{expr}` always becomes a positional placeholder plus a bound value
//! - **Familiar markup**: `if`, `choose`/`when`/`otherwise`, `where`, `set`, `trim`, `foreach`, `bind`, `include`
//! - **Parse once**: expressions are checked at parse time; parsed templates are immutable and shared
//! - **Fragments**: `<sql>` fragments with include properties, validated as a DAG on registration
//! - **Concurrent**: render from any number of threads; a cache parses each template once
//! - **Driver neutral**: `?` or `$n` placeholders, `serde_json::Value` parameters, optional `tokio-postgres` binding
//!
//! ## Example
//!
//! ```ignore
//! use dynsql::{Context, Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.load_mapper(r#"
//! <mapper namespace="blog">
//!   <select id="findActiveBlogLike">
//!     SELECT * FROM blog
//!     <where>
//!       <if test="state != null">state = #{state}</if>
//!       <if test="title != null">AND title like #{title}</if>
//!     </where>
//!   </select>
//! </mapper>"#)?;
//!
//! let ctx = Context::new().with("title", "%Rust%");
//! let result = engine.render("blog.findActiveBlogLike", &ctx)?;
//! assert_eq!(result.sql, "SELECT * FROM blog WHERE title like ?");
//! ```
//!
//! Lower-level pieces are usable on their own: [`parse_template`],
//! [`FragmentRegistry`], [`Renderer`] / [`render`] and [`TemplateCache`].

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod expr;
pub mod node;
pub mod parser;
pub mod preview;
pub mod registry;
pub mod render;

#[cfg(feature = "postgres")]
pub mod types;

pub use cache::{CacheStats, TemplateCache};
pub use config::{EngineConfig, PlaceholderStyle};
pub use context::{Context, Scope};
pub use engine::Engine;
pub use error::{DynSqlError, DynSqlResult, Location, RenderError};
pub use expr::{Expr, eval_bool, eval_value};
pub use node::{Node, ParsedTemplate, Segment, WhenClause};
pub use parser::{Mapper, Statement, StatementKind, parse_mapper, parse_template};
pub use registry::FragmentRegistry;
pub use render::{RenderResult, Renderer, render};

#[cfg(feature = "postgres")]
pub use types::{PgParams, PgValue};
