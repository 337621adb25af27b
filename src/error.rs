use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("malformed tournament config: {0}")]
    MalformedConfig(String),

    #[error("unknown fixture {reference} referenced by match {fixture}")]
    DanglingReference { fixture: u32, reference: u32 },

    #[error("fixture graph has a cycle through match {0}")]
    Cycle(u32),

    #[error("third-place slot in match {0} has an empty candidate pool")]
    EmptyPool(u32),

    #[error("no third-place assignment exists for qualifying groups {0}")]
    AssignmentExhausted(String),

    #[error("actual result does not fit the bracket: {0}")]
    OverrideMismatch(String),

    #[error("simulation cancelled after {completed} of {requested} trials")]
    Cancelled { completed: u32, requested: u32 },

    #[error("invalid simulation settings: {0}")]
    InvalidSettings(String),
}
