//! # CLI Module
//!
//! The `atomrouter` binary: offline tooling over a service configuration.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---|---|
//! | `routes` | registrations in resolution order (`--json` for machine output) |
//! | `resolve <path>` | target a path resolves to |
//! | `url-for <name> [k=v]...` | expand a named route |
//! | `request <uri>` | full pipeline against in-memory collections |
//!
//! ## Examples
//!
//! ```bash
//! atomrouter -c blog.yaml routes
//! atomrouter -c blog.yaml resolve /posts/hello
//! atomrouter -c blog.yaml url-for posts.entry entry=hello
//! atomrouter -c blog.yaml request -X POST /posts -H 'Slug: hello' -d @entry.json
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run, run_cli, Cli, Commands};
