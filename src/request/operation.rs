//! Operation chain parsing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Operation used when neither the request nor the settings name one.
pub const DEFAULT_OPERATION: &str = "resize";

/// A single transform in the operation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Region,
    Resize,
    Rotate,
    Noop,
    Watermark,
}

impl Operation {
    /// Every supported operation.
    pub const ALL: [Operation; 5] = [
        Operation::Region,
        Operation::Resize,
        Operation::Rotate,
        Operation::Noop,
        Operation::Watermark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Region => "region",
            Operation::Resize => "resize",
            Operation::Rotate => "rotate",
            Operation::Noop => "noop",
            Operation::Watermark => "watermark",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation name that is not part of [`Operation::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "region" => Ok(Operation::Region),
            "resize" => Ok(Operation::Resize),
            "rotate" => Ok(Operation::Rotate),
            "noop" => Ok(Operation::Noop),
            "watermark" => Ok(Operation::Watermark),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}

/// Parse a comma-separated operation list, keeping request order.
///
/// Duplicates are kept; callers that need set semantics use
/// [`operation_set`].
pub fn parse_operations(list: &str) -> Result<Vec<Operation>, UnknownOperation> {
    list.split(',').map(|name| name.trim().parse()).collect()
}

/// Collapse an ordered operation list into a set.
pub fn operation_set(operations: &[Operation]) -> HashSet<Operation> {
    operations.iter().copied().collect()
}
