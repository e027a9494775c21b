use super::Conn;
use std::fmt;

/// An optional sub-interface a driver connection may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// [`Pinger`](super::Pinger)
    Ping,
    /// [`ExecerContext`](super::ExecerContext)
    Exec,
    /// [`QueryerContext`](super::QueryerContext)
    Query,
    /// [`ConnPrepareContext`](super::ConnPrepareContext)
    Prepare,
    /// [`ConnBeginTx`](super::ConnBeginTx)
    BeginTx,
    /// [`SessionResetter`](super::SessionResetter)
    SessionReset,
    /// [`Validator`](super::Validator)
    Validate,
    /// [`NamedValueChecker`](super::NamedValueChecker)
    NamedValueCheck,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Ping,
        Capability::Exec,
        Capability::Query,
        Capability::Prepare,
        Capability::BeginTx,
        Capability::SessionReset,
        Capability::Validate,
        Capability::NamedValueCheck,
    ];

    /// Name of the trait that provides this capability.
    pub fn trait_name(self) -> &'static str {
        match self {
            Capability::Ping => "Pinger",
            Capability::Exec => "ExecerContext",
            Capability::Query => "QueryerContext",
            Capability::Prepare => "ConnPrepareContext",
            Capability::BeginTx => "ConnBeginTx",
            Capability::SessionReset => "SessionResetter",
            Capability::Validate => "Validator",
            Capability::NamedValueCheck => "NamedValueChecker",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trait_name())
    }
}

/// The set of optional capabilities one connection implements.
///
/// Computed once per physical connection by [`Capabilities::probe`] and never
/// updated afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    flags: [bool; 8],
}

impl Capabilities {
    /// The empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Ask `conn` for each of its optional facets.
    pub fn probe(conn: &dyn Conn) -> Self {
        let mut caps = Self::none();
        caps.set(Capability::Ping, conn.as_pinger().is_some());
        caps.set(Capability::Exec, conn.as_execer().is_some());
        caps.set(Capability::Query, conn.as_queryer().is_some());
        caps.set(Capability::Prepare, conn.as_preparer().is_some());
        caps.set(Capability::BeginTx, conn.as_beginner().is_some());
        caps.set(
            Capability::SessionReset,
            conn.as_session_resetter().is_some(),
        );
        caps.set(Capability::Validate, conn.as_validator().is_some());
        caps.set(
            Capability::NamedValueCheck,
            conn.as_named_value_checker().is_some(),
        );
        caps
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.set(capability, true);
        self
    }

    fn set(&mut self, capability: Capability, present: bool) {
        self.flags[capability.index()] = present;
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.flags[capability.index()]
    }

    /// Iterate over the capabilities present in this set.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.contains(*capability))
    }

    pub fn is_empty(&self) -> bool {
        !self.flags.iter().any(|present| *present)
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
