use std::marker::PhantomData;
use std::rc::Rc;

use crate::census::{registry, Snapshot};
use crate::probe::MemoryProbe;
use crate::CensusConfig;

/// Probe backed by the calling thread's registry
///
/// When created with allocation collection enabled, the probe keeps a
/// collection session open until it is dropped. The session belongs to the
/// creating thread's registry, so the probe cannot leave that thread:
///
/// ```compile_fail
/// use census::InProcessProbe;
///
/// let probe = InProcessProbe::collecting_allocations();
/// std::thread::spawn(move || drop(probe));
/// ```
#[derive(Debug)]
pub struct InProcessProbe {
    config: CensusConfig,
    session: Option<u64>,
    _local: PhantomData<Rc<()>>,
}

impl InProcessProbe {
    /// Attach a probe to the current thread
    pub fn new(config: CensusConfig) -> Self {
        let session = config.collect_allocations.then(registry::start_collecting);
        Self {
            config,
            session,
            _local: PhantomData,
        }
    }

    /// Probe that also records allocation traffic
    pub fn collecting_allocations() -> Self {
        Self::new(CensusConfig::default().with_allocation_collection(true))
    }

    /// Collection session held by this probe, if any
    pub fn session(&self) -> Option<u64> {
        self.session
    }

    /// Configuration in effect
    pub fn config(&self) -> &CensusConfig {
        &self.config
    }
}

impl Default for InProcessProbe {
    fn default() -> Self {
        Self::new(CensusConfig::default())
    }
}

impl MemoryProbe for InProcessProbe {
    fn capture(&self) -> Snapshot {
        Snapshot::capture()
    }

    fn verbose(&self) -> bool {
        self.config.verbose
    }
}

impl Drop for InProcessProbe {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            registry::stop_collecting();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::{ObjectRecord, Tracked};

    struct Token {
        _tracked: Tracked<Token>,
    }

    #[test]
    fn test_probe_scopes_collection() {
        assert!(!registry::is_collecting());
        {
            let probe = InProcessProbe::collecting_allocations();
            assert!(probe.session().is_some());
            assert!(registry::is_collecting());
        }
        assert!(!registry::is_collecting());
    }

    #[test]
    fn test_probe_session_ignores_other_threads() {
        let mine = InProcessProbe::collecting_allocations();

        // A probe living and dying on another thread touches only that
        // thread's registry.
        std::thread::spawn(|| {
            let theirs = InProcessProbe::collecting_allocations();
            assert!(theirs.session().is_some());
        })
        .join()
        .expect("worker thread");

        assert!(registry::is_collecting());
        drop(mine);
        assert!(!registry::is_collecting());
    }

    #[test]
    fn test_query_filters_current_census() {
        let probe = InProcessProbe::default();
        let _token = Token {
            _tracked: Tracked::new(),
        };
        let found = probe.query(&|r: &ObjectRecord| r.type_is::<Token>());
        assert_eq!(found.count(), 1);
    }

    #[test]
    fn test_check_returns_closure_value() {
        let probe = InProcessProbe::default();
        let count = probe.check(|memory| memory.of_type::<Token>().count());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let probe = InProcessProbe::default();
        let dynamic: &dyn MemoryProbe = &probe;
        let _token = Token {
            _tracked: Tracked::new(),
        };
        let before = dynamic.checkpoint("dyn");
        assert_eq!(before.of_type::<Token>().count(), 1);
        let tokens = dynamic.query(&|r: &ObjectRecord| r.type_is::<Token>());
        assert_eq!(tokens.count(), 1);
    }
}
