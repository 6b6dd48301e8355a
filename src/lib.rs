//! MCP server that lets LLMs work with GitHub Projects V2 and Issues.
//!
//! Every tool is a thin, validated proxy for one GitHub GraphQL query or
//! mutation. A small SQLite tracking list records which repositories and
//! projects an agent has been asked to keep an eye on.

pub mod config;
pub mod error;
pub mod graphql;
pub mod server;
pub mod tools;
pub mod tracking;
