use std::fmt;

use nom::{
    character::complete::{char, u64},
    combinator::all_consuming,
    sequence::{preceded, tuple},
    IResult,
};
use thiserror::Error;

use crate::cache::CacheRole;

/// geometry field a power-of-two check failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryField {
    Sets,
    BlockBytes,
}

impl fmt::Display for GeometryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryField::Sets => write!(f, "sets"),
            GeometryField::BlockBytes => write!(f, "block size"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WiringError {
    #[error("no cache with id {0}")]
    UnknownCache(usize),
    #[error("`{label}` already has a miss handler")]
    AlreadyWired { label: String },
    #[error("miss chain cannot change once accesses have been simulated")]
    AfterAccess,
    #[error("wiring `{from}` to `{to}` would form a cycle")]
    Cycle { from: String, to: String },
    #[error("miss chain through `{label}` is deeper than {max} levels")]
    TooDeep { label: String, max: usize },
    #[error("instruction cache `{label}` cannot handle misses of another cache")]
    InstructionHandler { label: String },
    #[error("`{to}` has {to_bytes}-byte blocks, smaller than the {from_bytes}-byte blocks of `{from}`")]
    BlockShrinks {
        from: String,
        from_bytes: u64,
        to: String,
        to_bytes: u64,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed cache spec `{spec}`: expected S:W:B with W >= 1")]
    MalformedSpec { spec: String },
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo { field: GeometryField, value: u64 },
    #[error("invalid wiring: {0}")]
    InvalidWiring(#[from] WiringError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// cache geometry, immutable after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    sets: u64,
    ways: u64,
    block_bytes: u64,
    label: String,
}

fn geometry(input: &str) -> IResult<&str, (u64, u64, u64)> {
    all_consuming(tuple((u64, preceded(char(':'), u64), preceded(char(':'), u64))))(input)
}

impl CacheConfig {
    /// parses an `S:W:B` literal: S sets, W ways and B-byte blocks,
    /// with S and B both powers of two.
    pub fn parse(spec: &str, label: impl Into<String>) -> Result<Self> {
        let Ok((_, (sets, ways, block_bytes))) = geometry(spec) else {
            return Err(ConfigError::MalformedSpec {
                spec: spec.to_owned(),
            });
        };
        Self::new(sets, ways, block_bytes, label).map_err(|e| match e {
            ConfigError::MalformedSpec { .. } => ConfigError::MalformedSpec {
                spec: spec.to_owned(),
            },
            e => e,
        })
    }

    pub fn new(sets: u64, ways: u64, block_bytes: u64, label: impl Into<String>) -> Result<Self> {
        if !sets.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: GeometryField::Sets,
                value: sets,
            });
        }
        if !block_bytes.is_power_of_two() {
            return Err(ConfigError::NotPowerOfTwo {
                field: GeometryField::BlockBytes,
                value: block_bytes,
            });
        }
        if ways == 0 {
            return Err(ConfigError::MalformedSpec {
                spec: format!("{sets}:{ways}:{block_bytes}"),
            });
        }
        Ok(Self {
            sets,
            ways,
            block_bytes,
            label: label.into(),
        })
    }

    pub fn sets(&self) -> u64 {
        self.sets
    }
    pub fn ways(&self) -> u64 {
        self.ways
    }
    pub fn block_bytes(&self) -> u64 {
        self.block_bytes
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn capacity_bytes(&self) -> u64 {
        self.sets
            .saturating_mul(self.ways)
            .saturating_mul(self.block_bytes)
    }
    /// same geometry under another name, e.g. one copy per hart
    pub fn relabel(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} sets x {} ways x {} B",
            self.label, self.sets, self.ways, self.block_bytes
        )
    }
}

/// whole-hierarchy configuration handed to the simulator by value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub harts: usize,
    pub icache: Option<CacheConfig>,
    pub dcache: Option<CacheConfig>,
    pub l2: Option<CacheConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            harts: 1,
            icache: None,
            dcache: None,
            l2: None,
        }
    }
}

impl SimConfig {
    /// parses the optional `S:W:B` literals of the three configuration points
    pub fn parse(
        harts: usize,
        icache: Option<&str>,
        dcache: Option<&str>,
        l2: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            harts,
            icache: icache.map(|s| CacheConfig::parse(s, "I$")).transpose()?,
            dcache: dcache.map(|s| CacheConfig::parse(s, "D$")).transpose()?,
            l2: l2.map(|s| CacheConfig::parse(s, "L2$")).transpose()?,
        })
    }

    /// role each configuration point instantiates
    pub fn points(&self) -> [(Option<&CacheConfig>, CacheRole); 2] {
        [
            (self.icache.as_ref(), CacheRole::Instruction),
            (self.dcache.as_ref(), CacheRole::Data),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        let c = CacheConfig::parse("64:4:32", "D$").unwrap();
        assert_eq!((64, 4, 32), (c.sets(), c.ways(), c.block_bytes()));
        assert_eq!("D$", c.label());
        assert_eq!(8192, c.capacity_bytes());
        // ways need not be a power of two
        let c = CacheConfig::parse("1:3:64", "L2$").unwrap();
        assert_eq!(3, c.ways());
    }
    #[test]
    fn test_not_power_of_two() {
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                field: GeometryField::Sets,
                value: 3
            }),
            CacheConfig::parse("3:2:64", "D$")
        );
        assert_eq!(
            Err(ConfigError::NotPowerOfTwo {
                field: GeometryField::BlockBytes,
                value: 48
            }),
            CacheConfig::parse("4:2:48", "D$")
        );
        assert!(matches!(
            CacheConfig::parse("0:1:64", "D$"),
            Err(ConfigError::NotPowerOfTwo {
                field: GeometryField::Sets,
                ..
            })
        ));
    }
    #[test]
    fn test_malformed() {
        for spec in ["", "64:4", "64:4:32:1", "64:4:", "a:b:c", "64:4:32 ", "-4:1:64", "4:0:64"] {
            assert!(
                matches!(
                    CacheConfig::parse(spec, "D$"),
                    Err(ConfigError::MalformedSpec { .. })
                ),
                "spec: {spec:?}"
            );
        }
    }
    #[test]
    fn test_sim_config() {
        let c = SimConfig::parse(2, Some("64:4:64"), None, Some("512:8:64")).unwrap();
        assert_eq!(2, c.harts);
        assert_eq!("I$", c.icache.as_ref().unwrap().label());
        assert!(c.dcache.is_none());
        assert_eq!("L2$", c.l2.as_ref().unwrap().label());
        assert!(SimConfig::parse(1, None, Some("6:1:64"), None).is_err());
    }
}
