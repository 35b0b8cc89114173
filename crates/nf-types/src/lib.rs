//! Foundation types for node-factory.
//!
//! This crate provides the data model shared by every other node-factory
//! crate: node identifiers, the closed set of node types, persisted and
//! expanded nodes, and the validator that turns untrusted client input into
//! a normalized [`Node`].
//!
//! # Key Types
//!
//! - [`NodeId`] -- UUID identifier, with the reserved [`NodeId::ROOT`] sentinel
//! - [`NodeType`] -- node type tag resolving to a static [`TypeSpec`]
//! - [`Node`] -- the persisted shape (`id`, `type`, `parent`, `value`)
//! - [`ExpandedNode`] -- a node with its materialized `children`
//! - [`NodeCandidate`] -- partial, caller-supplied node fields
//!
//! # Validation
//!
//! [`validate_and_format_node`] checks the fields of a candidate in the fixed
//! order `id`, `type`, `parent`, `value` and fails on the first violation with
//! the message listed in [`NODE_SCHEMA`].

pub mod error;
pub mod id;
pub mod node;
pub mod schema;

pub use error::{TypeError, ValidationError};
pub use id::NodeId;
pub use node::{ExpandedNode, Node, NodeCandidate, NodeType, TypeSpec};
pub use schema::{validate_and_format_node, FieldRule, NodeField, NODE_SCHEMA};
