//! Permission checks for registry removal
//!
//! Who a caller is and how that was established is decided elsewhere; the
//! monitor only asks whether a named caller may remove a given endpoint.

use shared::Endpoint;
use std::collections::HashSet;

pub trait Authorizer: Send + Sync {
    fn can_remove(&self, caller: &str, endpoint: &Endpoint) -> bool;
}

/// Grants removal to a fixed set of administrators
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: admins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_admin(&self, caller: &str) -> bool {
        self.admins.contains(caller)
    }
}

impl Authorizer for AdminList {
    fn can_remove(&self, caller: &str, _endpoint: &Endpoint) -> bool {
        self.is_admin(caller)
    }
}

/// Lets anyone remove anything. For single-operator setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_remove(&self, _caller: &str, _endpoint: &Endpoint) -> bool {
        true
    }
}
