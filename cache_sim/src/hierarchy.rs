use std::fmt;

use crate::{
    cache::{self, CacheInstance, CacheRole},
    config::{self, WiringError},
    memory::{AccessKind, Addr, MemTraceEvent},
    stat::{AddStats, Stats},
};

/// longest allowed miss chain, counted in cache levels
pub const MAX_CHAIN_DEPTH: usize = 4;

/// index of a cache instance in its hierarchy, in registration order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(usize);

impl CacheId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owns every cache instance of the simulated system and the table of
/// miss handlers between them.
///
/// The table is filled once during assembly. Each entry names the cache a
/// miss (and any dirty-victim writeback) is forwarded to; a cache with no
/// entry is backed by memory, which always satisfies the access.
#[derive(Debug, Default)]
pub struct CacheHierarchy {
    caches: Vec<CacheInstance>,
    miss_handlers: Vec<Option<CacheId>>,
    accessed: bool,
}

impl CacheHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cache: CacheInstance) -> CacheId {
        let id = CacheId(self.caches.len());
        log::debug!("registered `{}` as cache {id}", cache.label());
        self.caches.push(cache);
        self.miss_handlers.push(None);
        id
    }

    pub fn get(&self, id: CacheId) -> Option<&CacheInstance> {
        self.caches.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// caches in registration order
    pub fn iter(&self) -> impl Iterator<Item = (CacheId, &CacheInstance)> + '_ {
        self.caches.iter().enumerate().map(|(i, c)| (CacheId(i), c))
    }

    pub fn miss_handler(&self, id: CacheId) -> Option<CacheId> {
        self.miss_handlers.get(id.0).copied().flatten()
    }

    /// `id` followed by every level its misses travel through
    pub fn chain(&self, id: CacheId) -> Vec<CacheId> {
        let mut chain = vec![id];
        let mut cur = id;
        while let Some(next) = self.miss_handler(cur) {
            chain.push(next);
            cur = next;
        }
        chain
    }

    fn levels_above(&self, id: CacheId) -> usize {
        self.miss_handlers
            .iter()
            .enumerate()
            .filter(|(_, h)| **h == Some(id))
            .map(|(i, _)| 1 + self.levels_above(CacheId(i)))
            .max()
            .unwrap_or(0)
    }

    fn lookup(&self, id: CacheId) -> config::Result<&CacheInstance> {
        Ok(self.get(id).ok_or(WiringError::UnknownCache(id.0))?)
    }

    /// forwards misses of `from` to `to`. allowed once per cache, before
    /// the first simulated access.
    pub fn set_miss_handler(&mut self, from: CacheId, to: CacheId) -> config::Result<()> {
        let src = self.lookup(from)?;
        let dst = self.lookup(to)?;
        if self.accessed || src.counters().accesses != 0 || dst.counters().accesses != 0 {
            return Err(WiringError::AfterAccess.into());
        }
        if self.miss_handler(from).is_some() {
            return Err(WiringError::AlreadyWired {
                label: src.label().to_owned(),
            }
            .into());
        }
        if dst.role() == CacheRole::Instruction {
            return Err(WiringError::InstructionHandler {
                label: dst.label().to_owned(),
            }
            .into());
        }
        let (from_bytes, to_bytes) = (src.config().block_bytes(), dst.config().block_bytes());
        if to_bytes < from_bytes {
            return Err(WiringError::BlockShrinks {
                from: src.label().to_owned(),
                from_bytes,
                to: dst.label().to_owned(),
                to_bytes,
            }
            .into());
        }
        let below = self.chain(to);
        if below.contains(&from) {
            return Err(WiringError::Cycle {
                from: src.label().to_owned(),
                to: dst.label().to_owned(),
            }
            .into());
        }
        if self.levels_above(from) + 1 + below.len() > MAX_CHAIN_DEPTH {
            return Err(WiringError::TooDeep {
                label: src.label().to_owned(),
                max: MAX_CHAIN_DEPTH,
            }
            .into());
        }
        log::debug!("`{}` misses go to `{}`", src.label(), dst.label());
        self.miss_handlers[from.0] = Some(to);
        Ok(())
    }

    /// simulates one committed access starting at cache `id`, returning
    /// whether that first level hit.
    pub fn access(&mut self, id: CacheId, event: MemTraceEvent) -> cache::Result<bool> {
        self.accessed = true;
        self.forward(id, event.addr, event.size, event.kind)
    }

    fn forward(&mut self, id: CacheId, addr: Addr, size: u64, kind: AccessKind) -> cache::Result<bool> {
        let cache = &mut self.caches[id.0];
        let outcome = cache.access(addr, size, kind)?;
        let block_bytes = cache.config().block_bytes();
        if let Some(next) = self.miss_handlers[id.0] {
            if let Some(victim) = outcome.writeback {
                self.forward(next, victim, block_bytes, AccessKind::Store)?;
            }
            if !outcome.hit {
                self.forward(next, addr, size, kind)?;
            }
        }
        Ok(outcome.hit)
    }
}

impl AddStats for CacheHierarchy {
    fn add_stats(&self, buf: &mut Stats) {
        for c in &self.caches {
            c.add_stats(buf);
        }
    }
}
