//! Process-wide, name-keyed driver registry.
//!
//! ```ignore
//! queries::registry::register("sqlite-logged", Interceptor::new(SqliteDriver))?;
//! let db = Db::open("sqlite-logged", "file:app.db")?;
//! ```

use crate::driver::Driver;
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

type Drivers = RwLock<HashMap<String, Arc<dyn Driver>>>;

fn drivers_map() -> &'static Drivers {
    static DRIVERS: OnceLock<Drivers> = OnceLock::new();
    DRIVERS.get_or_init(Drivers::default)
}

/// Make a driver available under `name`.
///
/// Registering the same name twice fails with [`DbError::DuplicateDriver`].
pub fn register<D: Driver>(name: impl Into<String>, driver: D) -> DbResult<()> {
    register_arc(name, Arc::new(driver))
}

/// Like [`register`], for an already shared driver.
pub fn register_arc(name: impl Into<String>, driver: Arc<dyn Driver>) -> DbResult<()> {
    let name = name.into();
    let mut drivers = drivers_map()
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if drivers.contains_key(&name) {
        return Err(DbError::DuplicateDriver(name));
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(target: "queries.registry", driver = %name, "registered driver");

    drivers.insert(name, driver);
    Ok(())
}

/// Sorted names of the registered drivers.
pub fn drivers() -> Vec<String> {
    let mut names: Vec<String> = drivers_map()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

/// Look up a registered driver.
pub fn lookup(name: &str) -> DbResult<Arc<dyn Driver>> {
    drivers_map()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| DbError::UnknownDriver(name.to_string()))
}
