//! Cache dependencies: disposable handles that invalidate an entry when the
//! thing they watch changes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait CacheDependency: Send + Sync + fmt::Debug {
    fn has_changed(&self) -> bool;

    /// Release whatever the dependency holds. Called once an entry no
    /// longer needs it, including when the insert that would have used it
    /// fails.
    fn dispose(&self);
}

/// Builds the dependency for one cache insert. Each call must return a
/// dependency the caller owns, since a failed insert disposes it.
pub type DependencyFactory = Arc<dyn Fn() -> Arc<dyn CacheDependency> + Send + Sync>;

/// Changes when any of its parts change; disposing disposes every part.
#[derive(Debug)]
pub struct AggregateDependency {
    parts: Vec<Arc<dyn CacheDependency>>,
}

impl AggregateDependency {
    pub fn new(parts: Vec<Arc<dyn CacheDependency>>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[Arc<dyn CacheDependency>] {
        &self.parts
    }

    /// Combine optional dependencies without nesting: no parts gives
    /// `None`, a single part is returned as is.
    pub fn compose(
        parts: impl IntoIterator<Item = Option<Arc<dyn CacheDependency>>>,
    ) -> Option<Arc<dyn CacheDependency>> {
        let mut parts: Vec<_> = parts.into_iter().flatten().collect();
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Arc::new(Self::new(parts))),
        }
    }
}

impl CacheDependency for AggregateDependency {
    fn has_changed(&self) -> bool {
        self.parts.iter().any(|part| part.has_changed())
    }

    fn dispose(&self) {
        for part in &self.parts {
            part.dispose();
        }
    }
}

/// A dependency changed by hand, e.g. from a change notification.
#[derive(Debug, Default)]
pub struct SignalDependency {
    changed: AtomicBool,
    disposed: AtomicBool,
}

impl SignalDependency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.changed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl CacheDependency for SignalDependency {
    fn has_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_flattens() {
        let a: Arc<dyn CacheDependency> = Arc::new(SignalDependency::new());
        assert!(AggregateDependency::compose([None, None]).is_none());

        let single = AggregateDependency::compose([None, Some(a.clone())]).unwrap();
        assert!(Arc::ptr_eq(&single, &a));
    }

    #[test]
    fn aggregate_tracks_and_disposes_parts() {
        let a = Arc::new(SignalDependency::new());
        let b = Arc::new(SignalDependency::new());
        let both = AggregateDependency::compose([
            Some(a.clone() as Arc<dyn CacheDependency>),
            Some(b.clone() as Arc<dyn CacheDependency>),
        ])
        .unwrap();
        assert!(!both.has_changed());
        b.signal();
        assert!(both.has_changed());
        both.dispose();
        assert!(a.is_disposed() && b.is_disposed());
    }
}
