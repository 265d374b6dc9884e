use crate::variable::Variable;
use thiserror::Error;

/// Shorthand for results whose error type is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while building potentials, networks, and clique trees, or while
/// running inference and learning.
///
/// Structural errors leave no partial result behind. Numeric degeneracy
/// ([`Error::NormalizeNullVector`], [`Error::DivisionByZero`]) is recoverable: see
/// [`ZeroSumPolicy`][crate::ZeroSumPolicy]. Evidence problems get their own variants so that
/// callers can tell the user that the evidence itself is at fault.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The graph has a directed cycle, or an edit would create one.
    #[error("the graph contains a directed cycle through {0:?}")]
    Cycle(Variable),

    /// An operation named a variable that the potential does not range over.
    #[error("{variable:?} is not in the scope {scope:?}")]
    VariableNotInScope {
        /// The missing variable.
        variable: Variable,
        /// The scope that was searched.
        scope: Vec<Variable>,
    },

    /// A complete assignment was required but this variable had no state.
    #[error("no state was assigned to {0:?}")]
    UnassignedVariable(Variable),

    /// No variable with this name exists.
    #[error("no variable named {0:?}")]
    UnknownVariable(String),

    /// A variable with this name already exists.
    #[error("a variable named {0:?} already exists")]
    DuplicateVariable(String),

    /// A variable was declared without any states.
    #[error("variable {0:?} must have at least one state")]
    NoStates(String),

    /// A scope listed the same variable twice.
    #[error("{0:?} appears more than once in the same scope")]
    RepeatedVariable(Variable),

    /// The link is already present.
    #[error("there is already a link {from:?} -> {to:?}")]
    DuplicateLink {
        /// Parent end of the link.
        from: Variable,
        /// Child end of the link.
        to: Variable,
    },

    /// The link is not present.
    #[error("there is no link {from:?} -> {to:?}")]
    NoSuchLink {
        /// Parent end of the link.
        from: Variable,
        /// Child end of the link.
        to: Variable,
    },

    /// The number of values does not match the product of the scope's state counts.
    #[error("a table over {scope:?} needs {expected} values but {actual} were given")]
    TableSize {
        /// Scope of the table.
        scope: Vec<Variable>,
        /// Required number of cells.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// A state index is not below the variable's state count.
    #[error("state {state} is out of range for {variable:?}")]
    StateOutOfRange {
        /// The variable.
        variable: Variable,
        /// The offending state index.
        state: usize,
    },

    /// A node needed a potential but has none.
    #[error("{0:?} has no potential")]
    MissingPotential(Variable),

    /// A potential does not range over the variables it was supposed to.
    #[error("expected a potential over {expected:?}, got one over {actual:?}")]
    ScopeMismatch {
        /// Required scope; for conditional potentials the child comes first.
        expected: Vec<Variable>,
        /// Scope of the rejected potential.
        actual: Vec<Variable>,
    },

    /// Normalization found a configuration whose values sum to exactly zero.
    #[error("cannot normalize a configuration whose values sum to zero")]
    NormalizeNullVector,

    /// A non-zero value was divided by zero.
    #[error("division of a non-zero value by zero")]
    DivisionByZero,

    /// Two findings disagree about the state of one variable.
    #[error("conflicting findings for {variable:?}: state {existing} and state {conflicting}")]
    InconsistentEvidence {
        /// The variable with conflicting findings.
        variable: Variable,
        /// State already recorded.
        existing: usize,
        /// State that was rejected.
        conflicting: usize,
    },

    /// The evidence has probability zero under the network, so no posterior exists.
    #[error("the evidence has probability zero")]
    ImpossibleEvidence,

    /// The run observed its cancellation token.
    #[error("the computation was cancelled")]
    Cancelled,

    /// A clique-tree propagation step was invoked out of order.
    #[error("propagation step requires the {expected} state, but the tree is {actual}")]
    PropagationOrder {
        /// State the step needs.
        expected: &'static str,
        /// State the tree is in.
        actual: &'static str,
    },

    /// A case file could not be parsed.
    #[error("malformed dataset on line {line}: {message}")]
    Dataset {
        /// Line number, starting at 1.
        line: u64,
        /// Description of the problem.
        message: String,
    },

    /// An algorithm parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Reading input failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
