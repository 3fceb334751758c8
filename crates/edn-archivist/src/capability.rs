//! Capabilities the archivist consults instead of ambient global state.

use edn_types::{PrincipalId, Timestamp};

/// Supplies the currently authenticated actor.
///
/// Consulted once per `prepare`; the answer is never cached.
pub trait ActorProvider: Send + Sync {
    fn current_actor(&self) -> PrincipalId;
}

/// Always reports the same actor.
#[derive(Clone, Debug)]
pub struct StaticActor(PrincipalId);

impl StaticActor {
    pub fn new(principal: PrincipalId) -> Self {
        Self(principal)
    }

    /// An actor for unauthenticated hosts.
    pub fn anonymous() -> Self {
        Self(PrincipalId::anonymous())
    }
}

impl ActorProvider for StaticActor {
    fn current_actor(&self) -> PrincipalId {
        self.0.clone()
    }
}

/// Source of the preparation-time timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock stuck at one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
