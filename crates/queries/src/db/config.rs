/// Configuration for a [`Db`](super::Db) handle.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Maximum number of connections kept for reuse. `0` closes every
    /// connection after use. Default is 2.
    pub max_idle_conns: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_idle_conns: 2 }
    }
}

impl DbConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of idle connections.
    pub fn with_max_idle_conns(mut self, max: usize) -> Self {
        self.max_idle_conns = max;
        self
    }
}
