use super::{H_PARAMETER, H_TOO_HARD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A guest-supplied value breaks a bounds, alignment or permission rule.
    Parameter,
    /// The current execution context cannot finish the call;
    /// it has to be retried on a slower path.
    TooHard,
}

impl From<Error> for usize {
    fn from(err: Error) -> Self {
        match err {
            Error::Parameter => H_PARAMETER,
            Error::TooHard => H_TOO_HARD,
        }
    }
}
