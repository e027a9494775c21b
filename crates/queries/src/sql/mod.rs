//! Raw SQL builder with placeholder verbs.
//!
//! ```ignore
//! use queries::{Arg, appendf, build};
//!
//! let mut qb = queries::Builder::new();
//! appendf!(qb, "SELECT %s FROM users WHERE 1=1", "id, name")?;
//! if let Some(role) = role {
//!     appendf!(qb, " AND role = %$", role)?;
//! }
//! appendf!(qb, " AND id IN (%+$)", Arg::list(ids))?;
//! let (query, args) = qb.build();
//! ```

mod builder;


pub use builder::{Arg, Builder, Placeholder, build};
