use crate::{
    cache::{self, CacheRole},
    hierarchy::{CacheHierarchy, CacheId},
    memory::{AccessKind, AccessMask, MemTraceEvent},
};

/// Endpoint the execution core reports committed accesses to.
pub trait MemTracer {
    fn interested_in(&self, kind: AccessKind) -> bool;
    fn trace(&self, caches: &mut CacheHierarchy, event: &MemTraceEvent) -> cache::Result<()>;
}

/// feeds one cache instance of the hierarchy
#[derive(Clone, Copy)]
pub struct CacheTracer {
    cache: CacheId,
    interest: AccessMask,
}

impl CacheTracer {
    pub fn new(cache: CacheId, interest: AccessMask) -> Self {
        Self { cache, interest }
    }
    pub fn for_role(cache: CacheId, role: CacheRole) -> Self {
        Self::new(cache, role.interest())
    }
    pub fn cache(&self) -> CacheId {
        self.cache
    }
}

impl MemTracer for CacheTracer {
    fn interested_in(&self, kind: AccessKind) -> bool {
        self.interest.contains(kind.mask())
    }
    fn trace(&self, caches: &mut CacheHierarchy, event: &MemTraceEvent) -> cache::Result<()> {
        caches.access(self.cache, *event)?;
        Ok(())
    }
}

/// tracers registered on one hart's memory unit
#[derive(Default)]
pub struct MemTracers {
    tracers: Vec<Box<dyn MemTracer>>,
}

impl MemTracers {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn register_memtracer(&mut self, tracer: Box<dyn MemTracer>) {
        self.tracers.push(tracer)
    }
    pub fn len(&self) -> usize {
        self.tracers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tracers.is_empty()
    }
    /// delivers `event` once to every interested tracer
    pub fn trace(&self, caches: &mut CacheHierarchy, event: &MemTraceEvent) -> cache::Result<()> {
        for t in self.tracers.iter().filter(|t| t.interested_in(event.kind)) {
            t.trace(caches, event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::CacheInstance, config::CacheConfig};

    #[test]
    fn test_split_caches_see_their_kinds() {
        let mut h = CacheHierarchy::new();
        let ic = h.add(CacheInstance::new(
            CacheConfig::parse("4:1:32", "I$").unwrap(),
            CacheRole::Instruction,
        ));
        let dc = h.add(CacheInstance::new(
            CacheConfig::parse("4:1:32", "D$").unwrap(),
            CacheRole::Data,
        ));
        let mut tracers = MemTracers::new();
        tracers.register_memtracer(Box::new(CacheTracer::for_role(ic, CacheRole::Instruction)));
        tracers.register_memtracer(Box::new(CacheTracer::for_role(dc, CacheRole::Data)));
        assert_eq!(2, tracers.len());

        for e in [
            MemTraceEvent::fetch(0x0, 4),
            MemTraceEvent::fetch(0x4, 4),
            MemTraceEvent::load(0x80, 4),
            MemTraceEvent::store(0x84, 4),
            MemTraceEvent::fetch(0x8, 4),
        ] {
            tracers.trace(&mut h, &e).unwrap();
        }
        let ci = h.get(ic).unwrap().counters();
        let cd = h.get(dc).unwrap().counters();
        assert_eq!((3, 1, 0), (ci.accesses, ci.misses, ci.write_accesses));
        assert_eq!((2, 1, 1), (cd.accesses, cd.misses, cd.write_accesses));
    }
    #[test]
    fn test_no_tracers() {
        let mut h = CacheHierarchy::new();
        let tracers = MemTracers::new();
        assert!(tracers.is_empty());
        tracers.trace(&mut h, &MemTraceEvent::load(0, 4)).unwrap();
    }
}
