use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// An unrecoverable analysis condition with a static description.
#[derive(Debug, Clone, Copy)]
pub struct CoverageError {
    pub msg: &'static str,
}

impl Display for CoverageError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for CoverageError {}
