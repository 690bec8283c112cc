use std::io;

use thiserror::Error;

use crate::{
    cache::{AccessError, CacheInstance, CacheRole},
    config::{self, SimConfig},
    hierarchy::{CacheHierarchy, CacheId},
    memory::MemTraceEvent,
    stat::{AddStats, Stats},
    tracer::{CacheTracer, MemTracers},
};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("access retired by hart {hart}, but only {harts} hart(s) are simulated")]
    UnknownHart { hart: usize, harts: usize },
    #[error(transparent)]
    InvalidAccess(#[from] AccessError),
}

type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// one simulated hart: the tracers its memory unit reports to
struct Hart {
    tracers: MemTracers,
    retired: u64,
}

/// Cache hierarchy of the whole simulated system.
///
/// Every hart gets private instruction and data caches. When a second
/// level is configured it is shared by all of them.
pub struct Simulator {
    caches: CacheHierarchy,
    harts: Vec<Hart>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> config::Result<Self> {
        let mut caches = CacheHierarchy::new();
        let mut l1: Vec<CacheId> = Vec::new();
        let mut harts = Vec::with_capacity(config.harts);
        for hart in 0..config.harts {
            let mut tracers = MemTracers::new();
            for (cache, role) in config.points() {
                let Some(cache) = cache else { continue };
                let cache = if config.harts > 1 {
                    cache.relabel(format!("{}{hart}", cache.label()))
                } else {
                    cache.clone()
                };
                let id = caches.add(CacheInstance::new(cache, role));
                tracers.register_memtracer(Box::new(CacheTracer::for_role(id, role)));
                l1.push(id);
            }
            log::debug!("hart {hart}: {} tracer(s) registered", tracers.len());
            harts.push(Hart {
                tracers,
                retired: 0,
            });
        }
        if let Some(l2) = config.l2 {
            let l2 = caches.add(CacheInstance::new(l2, CacheRole::Unified));
            for id in l1 {
                caches.set_miss_handler(id, l2)?;
            }
        }
        log::info!(
            "simulating {} hart(s) with {} cache instance(s)",
            harts.len(),
            caches.len()
        );
        Ok(Self { caches, harts })
    }

    /// reports one committed access of `hart` to its tracers
    pub fn retire(&mut self, hart: usize, event: MemTraceEvent) -> Result<()> {
        let harts = self.harts.len();
        let Some(h) = self.harts.get_mut(hart) else {
            return Err(RuntimeError::UnknownHart { hart, harts });
        };
        h.tracers.trace(&mut self.caches, &event)?;
        h.retired += 1;
        Ok(())
    }

    pub fn caches(&self) -> &CacheHierarchy {
        &self.caches
    }

    pub fn num_harts(&self) -> usize {
        self.harts.len()
    }

    /// number of accesses `hart` has retired so far
    pub fn retired(&self, hart: usize) -> Option<u64> {
        self.harts.get(hart).map(|h| h.retired)
    }

    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }

    pub fn print_stats(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        self.collect_stat().print_stats(sink)
    }
}

impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        self.caches.add_stats(buf);
    }
}
