//! Single-writer gate.
//!
//! The owner is fixed when the gate is built. There is no transfer or
//! rotation path; a new owner means a new registry.

use crate::error::AuthError;
use crate::types::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    owner: Identity,
}

impl AccessGate {
    pub fn new(owner: Identity) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn is_owner(&self, caller: &Identity) -> bool {
        *caller == self.owner
    }

    /// Fails with [`AuthError::Unauthorized`] unless `caller` is the owner.
    ///
    /// Comparison follows [`Identity`] equality: exact, except that hex
    /// addresses ignore case.
    pub fn authorize(&self, caller: &Identity) -> Result<(), AuthError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(AuthError::Unauthorized {
                caller: caller.clone(),
            })
        }
    }
}
