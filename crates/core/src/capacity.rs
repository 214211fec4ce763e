use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Bound on the number of workers a manager keeps running at once.
///
/// The policy is a pure function of the current active-worker count and
/// carries no state, so a single value can be shared by any number of
/// managers.
///
/// In config files it is written either as a worker count (`capacity = 4`)
/// or as a string (`"unlimited"`, `"limited(4)"`, `"4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CapacityRepr", into = "String")]
pub enum Capacity {
    /// At most `n` concurrent workers.
    Limited(usize),
    /// Never saturated. Meant for job factories that queue work elsewhere
    /// (e.g. an external batch system).
    Unlimited,
}

impl Capacity {
    /// At most `njobs` concurrent workers. `limited(0)` admits none, so
    /// a manager using it never launches anything.
    pub fn limited(njobs: usize) -> Self {
        Self::Limited(njobs)
    }

    pub fn unlimited() -> Self {
        Self::Unlimited
    }

    /// One worker per logical CPU (4 if the count cannot be determined).
    pub fn from_cpus() -> Self {
        let n = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::Limited(n)
    }

    /// Whether a pool with `active` running workers is saturated.
    pub fn is_full(&self, active: usize) -> bool {
        match self {
            Self::Limited(njobs) => *njobs <= active,
            Self::Unlimited => false,
        }
    }

    /// Upper bound on concurrent workers, `None` when unbounded.
    pub fn bound(&self) -> Option<usize> {
        match self {
            Self::Limited(njobs) => Some(*njobs),
            Self::Unlimited => None,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::from_cpus()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(njobs) => write!(f, "limited({njobs})"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl FromStr for Capacity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }

        let count = s
            .strip_prefix("limited(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(s);

        match count.trim().parse::<usize>() {
            Ok(0) => Err(CoreError::InvalidCapacity(
                "limited capacity must allow at least one worker".into(),
            )),
            Ok(njobs) => Ok(Self::Limited(njobs)),
            Err(_) => Err(CoreError::InvalidCapacity(s.to_string())),
        }
    }
}

impl From<Capacity> for String {
    fn from(capacity: Capacity) -> Self {
        capacity.to_string()
    }
}

/// Accepted serialized forms: a bare count or any string `FromStr` takes.
#[derive(Deserialize)]
#[serde(untagged)]
enum CapacityRepr {
    Count(usize),
    Text(String),
}

impl TryFrom<CapacityRepr> for Capacity {
    type Error = CoreError;

    fn try_from(repr: CapacityRepr) -> Result<Self, Self::Error> {
        match repr {
            CapacityRepr::Count(0) => Err(CoreError::InvalidCapacity(
                "limited capacity must allow at least one worker".into(),
            )),
            CapacityRepr::Count(njobs) => Ok(Self::Limited(njobs)),
            CapacityRepr::Text(text) => text.parse(),
        }
    }
}
