//! The library code for the `runestone` content manager. It edits the
//! Markdown documents of a static site: each document is a YAML-like
//! frontmatter header followed by a Markdown body, stored at
//! `{content root}/{section}/[{category}/]{slug}.md`. The architecture can be
//! broken down into layers, leaves first:
//!
//! 1. The frontmatter codec ([`crate::frontmatter`]), which converts between
//!    documents on disk and `(Frontmatter, body)` pairs and writes them back
//!    deterministically.
//! 2. Path confinement ([`crate::path`]), which refuses any path that would
//!    escape the content root.
//! 3. Document CRUD ([`crate::content`]), built on the two above, with
//!    per-document locking ([`crate::lock`]) and content-type defaults and
//!    validation ([`crate::schema`]).
//! 4. Tag usage ([`crate::tag`]) and bulk tag mutations
//!    ([`crate::rewrite`]), which walk the whole tree on every call.
//!
//! Around the core, [`crate::site`] wires one repository per configured
//! language from a [`crate::config::Config`], [`crate::scan`] lints every
//! language's tree, and [`crate::build`] and [`crate::publish`] drive the
//! external generator and `git`.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod content;
pub mod frontmatter;
pub mod lock;
pub mod markdown;
pub mod path;
pub mod publish;
pub mod rewrite;
pub mod scan;
pub mod schema;
pub mod site;
pub mod tag;
pub mod tree;
mod util;
