use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{self, CacheConfig},
    memory::{AccessKind, AccessMask, Addr},
    stat::{AddStats, Stats},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRole {
    Instruction,
    Data,
    Unified,
}

impl CacheRole {
    /// access kinds a cache of this role observes from the core
    pub fn interest(self) -> AccessMask {
        match self {
            CacheRole::Instruction => AccessMask::Fetch,
            CacheRole::Data => AccessMask::Load | AccessMask::Store,
            CacheRole::Unified => AccessMask::Fetch | AccessMask::Load | AccessMask::Store,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessError {
    #[error("{size}-byte {kind} at {addr} on `{label}`: size must be between 1 and the {block_bytes}-byte block")]
    BadSize {
        label: String,
        addr: Addr,
        size: u64,
        kind: AccessKind,
        block_bytes: u64,
    },
    #[error("{size}-byte {kind} at {addr} on `{label}` crosses a {block_bytes}-byte block boundary")]
    CrossesBlock {
        label: String,
        addr: Addr,
        size: u64,
        kind: AccessKind,
        block_bytes: u64,
    },
    #[error("store at {addr} reached instruction cache `{label}`")]
    StoreToInstructionCache { label: String, addr: Addr },
}

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    pub dirty: bool,
    pub tag: u64,
}

/// W ways plus an exact LRU stack of way indices (front is MRU)
#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
    recency: Vec<usize>,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways],
            recency: (0..ways).collect(),
        }
    }
    fn find(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|l| l.valid && l.tag == tag)
    }
    fn touch(&mut self, way: usize) {
        if let Some(pos) = self.recency.iter().position(|&w| w == way) {
            self.recency.remove(pos);
        }
        self.recency.insert(0, way);
    }
    fn victim(&self) -> usize {
        // a set always has at least one way
        self.recency[self.recency.len() - 1]
    }
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
    /// way indices from most to least recently used
    pub fn recency(&self) -> &[usize] {
        &self.recency
    }
}

/// block offset, set index and tag of one byte address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposed {
    pub offset: u64,
    pub set_index: u64,
    pub tag: u64,
}

/// result of a lookup in a single cache level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOutcome {
    pub hit: bool,
    /// block address of an evicted dirty line
    pub writeback: Option<Addr>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounters {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub writebacks: u64,
    pub read_accesses: u64,
    pub write_accesses: u64,
    pub read_misses: u64,
    pub write_misses: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl CacheCounters {
    pub fn miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}

pub struct CacheInstance {
    config: CacheConfig,
    role: CacheRole,
    sets: Vec<CacheSet>,
    counters: CacheCounters,
}

impl CacheInstance {
    /// parses `S:W:B` and builds a unified cache named `label`
    pub fn construct(spec: &str, label: &str) -> config::Result<Self> {
        Ok(Self::new(CacheConfig::parse(spec, label)?, CacheRole::Unified))
    }

    pub fn new(config: CacheConfig, role: CacheRole) -> Self {
        let sets = (0..config.sets())
            .map(|_| CacheSet::new(config.ways() as usize))
            .collect();
        log::info!("instantiated {config}");
        Self {
            config,
            role,
            sets,
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn label(&self) -> &str {
        self.config.label()
    }
    pub fn role(&self) -> CacheRole {
        self.role
    }
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }
    pub fn set(&self, index: usize) -> &CacheSet {
        &self.sets[index]
    }

    pub fn decompose(&self, addr: Addr) -> Decomposed {
        let b = self.config.block_bytes();
        let s = self.config.sets();
        let a = addr.inner();
        let offset = a % b;
        let block_number = (a - offset) / b;
        Decomposed {
            offset,
            set_index: block_number % s,
            tag: block_number / s,
        }
    }

    /// block address of the line holding `tag` in set `set_index`
    pub fn block_addr(&self, set_index: u64, tag: u64) -> Addr {
        Addr::new((tag * self.config.sets() + set_index) * self.config.block_bytes())
    }

    fn check(&self, addr: Addr, size: u64, kind: AccessKind, offset: u64) -> Result<()> {
        let block_bytes = self.config.block_bytes();
        if size == 0 || size > block_bytes {
            return Err(AccessError::BadSize {
                label: self.label().to_owned(),
                addr,
                size,
                kind,
                block_bytes,
            });
        }
        if offset + size > block_bytes {
            return Err(AccessError::CrossesBlock {
                label: self.label().to_owned(),
                addr,
                size,
                kind,
                block_bytes,
            });
        }
        if self.role == CacheRole::Instruction && kind.is_write() {
            return Err(AccessError::StoreToInstructionCache {
                label: self.label().to_owned(),
                addr,
            });
        }
        Ok(())
    }

    /// looks `addr` up in this level only. the caller forwards the
    /// writeback and the miss to the next level, if there is one.
    pub fn access(&mut self, addr: Addr, size: u64, kind: AccessKind) -> Result<AccessOutcome> {
        let Decomposed {
            offset,
            set_index,
            tag,
        } = self.decompose(addr);
        self.check(addr, size, kind, offset)?;

        let c = &mut self.counters;
        c.accesses += 1;
        if kind.is_write() {
            c.write_accesses += 1;
            c.bytes_written += size;
        } else {
            c.read_accesses += 1;
            c.bytes_read += size;
        }

        let set = &mut self.sets[set_index as usize];
        if let Some(way) = set.find(tag) {
            set.touch(way);
            if kind.is_write() {
                set.lines[way].dirty = true;
            }
            self.counters.hits += 1;
            return Ok(AccessOutcome {
                hit: true,
                writeback: None,
            });
        }

        let c = &mut self.counters;
        c.misses += 1;
        if kind.is_write() {
            c.write_misses += 1;
        } else {
            c.read_misses += 1;
        }
        log::trace!(
            "{} {} miss {addr}",
            self.config.label(),
            if kind.is_write() { "write" } else { "read" }
        );

        let set = &mut self.sets[set_index as usize];
        let way = set.victim();
        let victim = set.lines[way];
        set.lines[way] = CacheLine {
            valid: true,
            dirty: kind.is_write(),
            tag,
        };
        set.touch(way);

        let writeback = if victim.valid && victim.dirty {
            self.counters.writebacks += 1;
            Some(self.block_addr(set_index, victim.tag))
        } else {
            None
        };
        Ok(AccessOutcome {
            hit: false,
            writeback,
        })
    }
}

impl fmt::Debug for CacheInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheInstance")
            .field("config", &self.config)
            .field("role", &self.role)
            .field("counters", &self.counters)
            .finish()
    }
}

impl AddStats for CacheInstance {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::CacheStat::new(self.label(), self.counters)));
    }
}

mod stat {
    use super::*;
    use crate::stat::*;

    /// counters of one cache, frozen at report time
    #[derive(Serialize)]
    pub struct CacheStat {
        label: String,
        #[serde(flatten)]
        counters: CacheCounters,
        miss_rate: f64,
    }

    impl CacheStat {
        pub fn new(label: &str, counters: CacheCounters) -> Self {
            Self {
                label: label.to_owned(),
                counters,
                miss_rate: counters.miss_rate(),
            }
        }
    }

    impl Stat for CacheStat {
        fn view(&self) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
        fn to_json(&self) -> serde_json::Result<serde_json::Value> {
            serde_json::to_value(self)
        }
    }

    impl StatView for &'_ CacheStat {
        fn header(&self) -> &str {
            &self.label
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ CacheStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let c = &self.counters;
            let rate = format!("{:.6}%", 100. * self.miss_rate);
            writeln!(f, "       accesses: {:>14}", c.accesses)?;
            writeln!(f, "         misses: {:>14}", c.misses)?;
            writeln!(f, "      miss rate: {rate:>14}")?;
            writeln!(f, "     writebacks: {:>14}", c.writebacks)?;
            writeln!(f, "     bytes read: {:>14}", c.bytes_read)?;
            writeln!(f, "  bytes written: {:>14}", c.bytes_written)?;
            writeln!(f, "  read accesses: {:>14}", c.read_accesses)?;
            writeln!(f, " write accesses: {:>14}", c.write_accesses)?;
            writeln!(f, "    read misses: {:>14}", c.read_misses)?;
            writeln!(f, "   write misses: {:>14}", c.write_misses)
        }
    }
}
