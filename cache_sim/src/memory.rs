use std::fmt;

use bitmask_enum::bitmask;

/// already-translated byte address of a committed access
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Fetch,
    Load,
    Store,
}

impl AccessKind {
    /// fetches are looked up exactly like loads
    pub fn is_write(self) -> bool {
        matches!(self, AccessKind::Store)
    }
    pub fn mask(self) -> AccessMask {
        match self {
            AccessKind::Fetch => AccessMask::Fetch,
            AccessKind::Load => AccessMask::Load,
            AccessKind::Store => AccessMask::Store,
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Fetch => write!(f, "fetch"),
            AccessKind::Load => write!(f, "load"),
            AccessKind::Store => write!(f, "store"),
        }
    }
}

/// set of access kinds a tracer endpoint wants to observe
#[bitmask(u8)]
pub enum AccessMask {
    Fetch,
    Load,
    Store,
}

impl fmt::Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = [
            (Self::Fetch, "fetch"),
            (Self::Load, "load"),
            (Self::Store, "store"),
        ]
        .into_iter()
        .filter(|(m, _)| self.contains(*m))
        .map(|(_, n)| n)
        .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("/"))
        }
    }
}

/// one committed memory operation, produced and consumed synchronously
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemTraceEvent {
    pub addr: Addr,
    pub size: u64,
    pub kind: AccessKind,
}

impl MemTraceEvent {
    pub fn new(addr: Addr, size: u64, kind: AccessKind) -> Self {
        Self { addr, size, kind }
    }
    pub fn fetch(addr: u64, size: u64) -> Self {
        Self::new(Addr::new(addr), size, AccessKind::Fetch)
    }
    pub fn load(addr: u64, size: u64) -> Self {
        Self::new(Addr::new(addr), size, AccessKind::Load)
    }
    pub fn store(addr: u64, size: u64) -> Self {
        Self::new(Addr::new(addr), size, AccessKind::Store)
    }
}

impl fmt::Display for MemTraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} bytes)", self.kind, self.addr, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mask_display() {
        assert_eq!("fetch", format!("{}", AccessMask::Fetch));
        assert_eq!("load/store", format!("{}", AccessMask::Load | AccessMask::Store));
        assert_eq!("none", format!("{}", AccessMask::none()));
    }
    #[test]
    fn test_kind_in_mask() {
        let data = AccessMask::Load | AccessMask::Store;
        assert!(data.contains(AccessKind::Store.mask()));
        assert!(!data.contains(AccessKind::Fetch.mask()));
        assert!(AccessKind::Store.is_write());
        assert!(!AccessKind::Fetch.is_write());
    }
}
