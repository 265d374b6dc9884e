use crate::error::{Error, Result};
use crate::variable::Variable;
use std::collections::btree_map::{self, BTreeMap};
use std::iter;

/// An observation that a variable is in one particular state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Finding {
    /// The observed variable.
    pub variable: Variable,
    /// Index of the observed state.
    pub state: usize,
}

/// A set of findings with at most one finding per variable.
///
/// The same type doubles as a (possibly partial) assignment of states to variables, for
/// example when evaluating a potential at one configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvidenceCase {
    findings: BTreeMap<Variable, usize>,
}

impl EvidenceCase {
    /// Creates an empty evidence case.
    pub fn new() -> Self {
        EvidenceCase::default()
    }

    /// Records that `variable` was observed in `state`.
    ///
    /// Repeating an existing finding is fine; contradicting one is an error and leaves the case
    /// unchanged.
    ///
    /// ```
    /// use potential_inference::{Error, EvidenceCase, Variable};
    ///
    /// let a = Variable::new(0, 2);
    /// let mut evidence = EvidenceCase::new();
    /// evidence.add_finding(a, 1).unwrap();
    /// evidence.add_finding(a, 1).unwrap();
    /// assert!(matches!(
    ///     evidence.add_finding(a, 0),
    ///     Err(Error::InconsistentEvidence { existing: 1, conflicting: 0, .. })
    /// ));
    /// assert!(evidence.add_finding(a, 2).is_err());
    /// assert_eq!(evidence.state_of(a), Some(1));
    /// ```
    pub fn add_finding(&mut self, variable: Variable, state: usize) -> Result<&mut Self> {
        variable.check_state(state)?;
        match self.findings.entry(variable) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(state);
            }
            btree_map::Entry::Occupied(entry) => {
                if *entry.get() != state {
                    return Err(Error::InconsistentEvidence {
                        variable,
                        existing: *entry.get(),
                        conflicting: state,
                    });
                }
            }
        }
        Ok(self)
    }

    /// Adds every finding from `other`, failing without changes if any of them conflicts.
    pub fn merge(&mut self, other: &EvidenceCase) -> Result<()> {
        for finding in other.iter() {
            if let Some(existing) = self.state_of(finding.variable) {
                if existing != finding.state {
                    return Err(Error::InconsistentEvidence {
                        variable: finding.variable,
                        existing,
                        conflicting: finding.state,
                    });
                }
            }
        }
        self.findings.extend(other.findings.iter());
        Ok(())
    }

    /// Forgets the finding for `variable`, returning its state.
    pub fn remove(&mut self, variable: Variable) -> Option<usize> {
        self.findings.remove(&variable)
    }

    /// The observed state of `variable`, if any.
    pub fn state_of(&self, variable: Variable) -> Option<usize> {
        self.findings.get(&variable).copied()
    }

    /// Returns `true` if `variable` has a finding.
    pub fn contains(&self, variable: Variable) -> bool {
        self.findings.contains_key(&variable)
    }

    /// Number of findings.
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Returns `true` if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings in ascending variable order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Finding> + ExactSizeIterator + '_ {
        self.findings
            .iter()
            .map(|(&variable, &state)| Finding { variable, state })
    }

    /// The observed variables in ascending order.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.findings.keys().copied()
    }
}

impl iter::FromIterator<Finding> for Result<EvidenceCase> {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut evidence = EvidenceCase::new();
        for finding in iter {
            evidence.add_finding(finding.variable, finding.state)?;
        }
        Ok(evidence)
    }
}
