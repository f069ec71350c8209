//! Version ordering and requirement matching.
//!
//! A [`Version`] is a dot-delimited list of numeric components. Missing
//! trailing components compare as zero, so `1.2` and `1.2.0` are the same
//! version. A [`Requirement`] is a conjunction of [`Constraint`]s; the empty
//! requirement accepts everything and resolution then picks the highest.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u64>,
}

impl Version {
    /// Parse a version such as `1.2.0`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Parse("empty version string".into()));
        }

        let components = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::Parse(format!("malformed version: '{}'", s)));
                }
                part.parse::<u64>()
                    .map_err(|_| Error::Parse(format!("version component out of range: '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { components })
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Upper bound used by `~>`: drop the last component (unless it is the
    /// only one) and increment the new last one.
    ///
    /// `1.2.3` -> `1.3`, `1.2` -> `2`, `1` -> `2`.
    pub fn bump(&self) -> Version {
        let mut components = self.components.clone();
        if components.len() > 1 {
            components.pop();
        }
        if let Some(last) = components.last_mut() {
            *last = last.saturating_add(1);
        }
        Version { components }
    }

    /// Components without trailing zeros; equal versions share this slice.
    fn significant(&self) -> &[u64] {
        let len = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..len]
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.components {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}

/// Comparison operator of a single constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `~>`: at least the version, below its [`Version::bump`]
    Pessimistic,
}

impl Op {
    // Longest tokens first so ">=" is not read as ">"
    const TOKENS: [(&'static str, Op); 7] = [
        ("~>", Op::Pessimistic),
        (">=", Op::GtEq),
        ("<=", Op::LtEq),
        ("!=", Op::NotEq),
        ("=", Op::Eq),
        (">", Op::Gt),
        ("<", Op::Lt),
    ];

    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::NotEq => "!=",
            Op::Lt => "<",
            Op::LtEq => "<=",
            Op::Gt => ">",
            Op::GtEq => ">=",
            Op::Pessimistic => "~>",
        }
    }
}

/// An operator paired with a version, e.g. `< 0.0.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: Op,
    pub version: Version,
}

impl Constraint {
    pub fn new(op: Op, version: Version) -> Self {
        Self { op, version }
    }

    /// Parse `"<0.0.2"`, `">= 1.0"` or a bare `"1.2"` (meaning `= 1.2`).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (op, rest) = Op::TOKENS
            .iter()
            .find_map(|&(token, op)| s.strip_prefix(token).map(|rest| (op, rest)))
            .unwrap_or((Op::Eq, s));

        let version = Version::parse(rest)
            .map_err(|_| Error::Parse(format!("malformed version constraint: '{}'", s)))?;
        Ok(Self { op, version })
    }

    pub fn satisfied_by(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => v == &self.version,
            Op::NotEq => v != &self.version,
            Op::Lt => v < &self.version,
            Op::LtEq => v <= &self.version,
            Op::Gt => v > &self.version,
            Op::GtEq => v >= &self.version,
            Op::Pessimistic => v >= &self.version && v < &self.version.bump(),
        }
    }

    /// `>= 0` holds for every version.
    pub fn is_trivial(&self) -> bool {
        self.op == Op::GtEq && self.version.components().iter().all(|&n| n == 0)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.as_str(), self.version)
    }
}

/// A set of constraints that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    constraints: Vec<Constraint>,
}

impl Requirement {
    /// Matches every version.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Parse a comma-separated list such as `">= 1.0, < 2"`. An empty string
    /// is [`Requirement::any`], and so is `">= 0"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::any());
        }
        let constraints = s
            .split(',')
            .map(Constraint::parse)
            .filter(|c| !matches!(c, Ok(c) if c.is_trivial()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { constraints })
    }

    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn satisfied_by(&self, v: &Version) -> bool {
        self.constraints.iter().all(|c| c.satisfied_by(v))
    }

    /// Pick the highest item whose version satisfies this requirement.
    ///
    /// Returns `None` when nothing matches; callers decide which error that is.
    pub fn best_match<'a, T, I, F>(&self, items: I, version_of: F) -> Option<&'a T>
    where
        I: IntoIterator<Item = &'a T>,
        F: Fn(&T) -> &Version,
    {
        items
            .into_iter()
            .filter(|item| self.satisfied_by(version_of(*item)))
            .max_by(|a, b| version_of(*a).cmp(version_of(*b)))
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Requirement::parse(s)
    }
}

impl From<Constraint> for Requirement {
    fn from(c: Constraint) -> Self {
        Self::new(vec![c])
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return f.write_str(">= 0");
        }
        let parts: Vec<String> = self.constraints.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}
