//! Caller identity as produced by the upstream authenticator

use std::collections::HashSet;

/// An authenticated (or anonymous) caller and the roles it was granted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub authenticated: bool,
    pub roles: HashSet<String>,
}

impl Identity {
    /// An authenticated caller holding `roles`
    pub fn authenticated<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authenticated: true,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// No authentication took place
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// First of the caller's roles found in `required`, in sorted order so
    /// that repeated decisions report the same role
    pub fn first_role_in<'a>(&'a self, required: &HashSet<String>) -> Option<&'a str> {
        let mut granted: Vec<&str> = self
            .roles
            .iter()
            .filter(|role| required.contains(*role))
            .map(String::as_str)
            .collect();
        granted.sort_unstable();
        granted.first().copied()
    }
}
