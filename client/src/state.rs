// client/src/state.rs
use siwe_common::Address;

use crate::error::ClientError;

/// Client-visible handshake phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Anonymous,
    Authenticating,
    Authenticated,
    Error,
}

/// Local session state. Updated only by atomic in-place modification of the
/// previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientState {
    pub address: Option<Address>,
    pub loading: bool,
    pub error: Option<ClientError>,
    /// Bumped by every sign-in start and sign-out; an in-flight operation may
    /// only apply its result while this still matches the value it started with.
    pub(crate) attempt: u64,
}

impl ClientState {
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Authenticating
        } else if self.address.is_some() {
            Phase::Authenticated
        } else if self.error.is_some() {
            Phase::Error
        } else {
            Phase::Anonymous
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == Phase::Authenticated
    }
}
