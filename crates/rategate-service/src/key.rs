//! Rate-limit key derivation.
//!
//! General protection keys by address alone (`203.0.113.7`). Action-scoped
//! protection prefixes the action name (`login:203.0.113.7`) so sensitive
//! actions never share a budget with each other or with plain traffic.

use std::fmt;
use std::sync::Arc;

use crate::address::ClientAddress;

/// Separator between the action name and the base key.
pub const ACTION_SEPARATOR: char = ':';

/// Per-request facts the governor works from.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub address: ClientAddress,
    pub path: String,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
}

impl RequestContext {
    pub fn new(address: ClientAddress, path: impl Into<String>) -> Self {
        Self {
            address,
            path: path.into(),
            user_agent: None,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

type DeriveFn = dyn Fn(&RequestContext) -> String + Send + Sync;

/// Computes the base key for a request.
#[derive(Clone, Default)]
pub enum KeyDeriver {
    /// The resolved client address.
    #[default]
    Address,
    /// Caller-supplied derivation, e.g. keying by user id when present.
    Custom(Arc<DeriveFn>),
}

impl KeyDeriver {
    pub fn custom<F>(derive: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(derive))
    }

    pub fn base_key(&self, ctx: &RequestContext) -> String {
        match self {
            Self::Address => address_key(ctx.address),
            Self::Custom(derive) => derive(ctx),
        }
    }

    /// Full key: the base key, prefixed with `action` when one is set.
    pub fn derive(&self, action: Option<&str>, ctx: &RequestContext) -> String {
        let base = self.base_key(ctx);
        match action {
            Some(action) => format!("{action}{ACTION_SEPARATOR}{base}"),
            None => base,
        }
    }
}

impl fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("Address"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

pub fn address_key(address: ClientAddress) -> String {
    address.to_string()
}

pub fn action_key(action: &str, address: ClientAddress) -> String {
    format!("{action}{ACTION_SEPARATOR}{address}")
}
