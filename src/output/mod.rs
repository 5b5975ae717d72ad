//! Scalar values reduced across ranks and printed as thermo columns.
use std::{fmt::Display, ops::Add};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Usize(usize),
    Float(f64),
}
impl Value {
    /// Combine two values of the same variant; `First` keeps `self`
    pub fn combine(self, other: Self, op: Operation) -> Result<Self, Error> {
        let mismatch = || {
            Error::protocol(format!(
                "Cannot combine {:?} with {:?} in a reduction",
                self, other
            ))
        };
        Ok(match (self, other) {
            (Value::Float(a), Value::Float(b)) => Value::Float(match op {
                Operation::First => a,
                Operation::Max => a.max(b),
                Operation::Min => a.min(b),
                Operation::Sum => a + b,
            }),
            (Value::Usize(a), Value::Usize(b)) => Value::Usize(match op {
                Operation::First => a,
                Operation::Max => a.max(b),
                Operation::Min => a.min(b),
                Operation::Sum => a + b,
            }),
            _ => return Err(mismatch()),
        })
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            Value::Usize(v) => *v as f64,
        }
    }
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Usize(v) => Some(*v),
            Value::Float(_) => None,
        }
    }
}
impl Add for Value {
    type Output = Value;
    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Float(i), Value::Float(j)) => Value::Float(i + j),
            (Value::Usize(i), Value::Usize(j)) => Value::Usize(i + j),
            (a, b) => Value::Float(a.as_f64() + b.as_f64()),
        }
    }
}
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{:>14.6}", v),
            Value::Usize(v) => write!(f, "{:>14}", v),
        }
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}
impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Usize(value)
    }
}

/// How per-rank contributions are combined into a global value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    First,
    Max,
    Min,
    Sum,
}

/// Anything that knows how its per-rank values reduce
pub trait Operatable {
    fn op(&self) -> Operation;
}

/// Right-aligned header line for a set of thermo columns
pub fn header<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| format!("{:>14}", n.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn row(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_respects_operation() {
        let a = Value::Float(2.0);
        let b = Value::Float(-1.0);
        assert_eq!(a.combine(b, Operation::Sum).unwrap(), Value::Float(1.0));
        assert_eq!(a.combine(b, Operation::Min).unwrap(), Value::Float(-1.0));
        assert_eq!(b.combine(a, Operation::First).unwrap(), Value::Float(-1.0));
        assert_eq!(
            Value::Usize(3).combine(Value::Usize(5), Operation::Max).unwrap(),
            Value::Usize(5)
        );
        assert!(a.combine(Value::Usize(1), Operation::Sum).is_err());
    }

    #[test]
    fn header_and_row_align() {
        let h = header(&["step", "temp"]);
        let r = row(&[Value::Usize(10), Value::Float(1.5)]);
        assert_eq!(h.len(), r.len());
    }
}
