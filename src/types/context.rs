use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Cooperative cancellation for a single call: a deadline, a token, or both.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Interrupt {
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn is_triggered(&self) -> bool {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Who is calling, and which namespaces they may see private projects in.
///
/// An anonymous caller sees public projects only. The owner of a namespace
/// and admins of it also see its private projects.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    namespace: Option<String>,
    admin_of: BTreeSet<String>,
    interrupt: Interrupt,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn owner(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into().to_lowercase()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_admin_of<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admin_of
            .extend(namespaces.into_iter().map(|ns| ns.into().to_lowercase()));
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.interrupt = self.interrupt.with_deadline(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.interrupt = self.interrupt.with_token(token);
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn admin_of(&self) -> &BTreeSet<String> {
        &self.admin_of
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn is_anonymous(&self) -> bool {
        self.namespace.is_none() && self.admin_of.is_empty()
    }
}
