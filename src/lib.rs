//! A persistent, block-oriented table storage core.
//!
//! Five layers, leaves first: a growing file of fixed-size pages
//! ([`dbfile`]), a typed view over exactly one page ([`block`]), a
//! declarative field-description engine that reads/writes typed values out
//! of a byte range ([`fieldtype`], [`structure`]), a multi-segment logical
//! byte space for records that outgrow one page ([`vbuffer`]), and a table
//! schema compiled from a human-authored `.ini` definition ([`schema`],
//! [`column`], [`index`], [`complextype`], [`iniparse`]).
//!
//! Deliberately out of scope: the network-facing client/server, the
//! directory-root daemon, the compiled query/filter language (scripts are
//! opaque bytes here), CRC helpers, and a logging subsystem — callers wire
//! this crate's `trace` feature into whatever logging they already run.

pub mod block;
pub mod blocktypes;
pub mod column;
pub mod complextype;
pub mod config;
pub mod dbfile;
pub mod error;
pub mod fieldtype;
pub mod index;
pub mod iniparse;
pub mod schema;
pub mod stg;
pub mod structure;
mod util;
pub mod vbuffer;

pub use block::{BlockBase, BlockHandle, DbType, TableHandle};
pub use column::Column;
pub use complextype::{load_complex_types, BasicType, ComplexType, TypeRef};
pub use config::EngineConfig;
pub use dbfile::{PageFile, PageRef};
pub use error::{CoreError, Result};
pub use fieldtype::{Description, FieldDescriptor, FieldType};
pub use index::{IndexKind, SecondaryIndex, SortColumn};
pub use schema::{CompareResult, Schema};
pub use stg::{SimpleFileStorage, Storage};
pub use structure::{Backing, Structure};
pub use vbuffer::VirtualBuffer;
