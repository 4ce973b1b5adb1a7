use crate::cil;
use std::io;

/// Ways reading or manipulating a listing can go wrong
#[derive(Debug)]
pub enum ListingError {
    Io(io::Error),

    /// Malformed line (lines are numbered from 1)
    Syntax { line: usize, message: String },

    UnknownLabel(String),

    DuplicateLabel { line: usize, label: String },

    Body(cil::Error),
}

impl ListingError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> ListingError {
        ListingError::Syntax {
            line,
            message: message.into(),
        }
    }
}

impl From<io::Error> for ListingError {
    fn from(err: io::Error) -> ListingError {
        ListingError::Io(err)
    }
}

impl From<cil::Error> for ListingError {
    fn from(err: cil::Error) -> ListingError {
        ListingError::Body(err)
    }
}
