use std::ops::RangeInclusive;

/// Selection of atom types (1-based) for coefficient assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Types {
    One(usize),
    Range(RangeInclusive<usize>),
    All,
}
impl Types {
    pub fn to_vec(&self, num_types: usize) -> Vec<usize> {
        self.to_range(num_types).collect()
    }
    pub fn to_range(&self, num_types: usize) -> RangeInclusive<usize> {
        match self {
            Types::One(i) => *i..=*i,
            Types::Range(r) => r.clone(),
            Types::All => 1..=num_types,
        }
    }
}
impl From<RangeInclusive<usize>> for Types {
    fn from(value: RangeInclusive<usize>) -> Self {
        Types::Range(value)
    }
}
impl From<usize> for Types {
    fn from(value: usize) -> Self {
        Self::One(value)
    }
}
