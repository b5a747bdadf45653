//! A reduced, ordered binary decision diagram (ROBDD) engine with
//! complement edges, hash-consing, an apply cache, reference-counted
//! garbage collection and dynamic variable reordering via Rudell
//! sifting.
//!
//! The only types a caller needs are [`Manager`], which owns the shared
//! node table and exposes every Boolean operation, and [`Bdd`], a
//! cheap, reference-counted handle to a function living in one
//! manager. Handles from different managers are never comparable or
//! combinable; every operation that takes two handles checks this and
//! returns [`Error::ManagerMismatch`] rather than panicking.
//!
//! ```
//! use robdd::Manager;
//!
//! let m = Manager::new();
//! let vars = m.declare(&["x", "y"]).unwrap();
//! let x = m.var(vars[0]).unwrap();
//! let y = m.var(vars[1]).unwrap();
//! let f = m.and(&x, &y).unwrap();
//! assert!(f.eval(&[(vars[0], true), (vars[1], true)]).unwrap());
//! assert!(!f.eval(&[(vars[0], true), (vars[1], false)]).unwrap());
//! ```

#![doc = document_features::document_features!()]

mod apply_cache;
mod config;
mod edge;
mod error;
#[cfg(feature = "expr")]
mod expr;
mod gc;
mod handle;
mod kernel;
mod manager;
mod node;
mod persist;
mod reorder;
mod stats;
mod unique_table;

pub use config::{Config, ConfigBuilder, ConfigBuilderError};
pub use error::{Error, Result};
pub use handle::Bdd;
pub use manager::{Manager, VarId};
pub use stats::Stats;

#[cfg(feature = "expr")]
pub use expr::{parse as parse_expr, Expr};
