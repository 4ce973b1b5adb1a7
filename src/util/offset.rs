use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Elements with an encoded width in bytes
pub trait Width {
    fn width(&self) -> usize;
}

/// Byte offset from the start of a method body
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Offset(pub usize);

impl Offset {
    /// Offset of the element following one of the given width
    pub fn after<W: Width + ?Sized>(self, elem: &W) -> Offset {
        Offset(self.0 + elem.width())
    }
}

impl Sub for Offset {
    type Output = isize;

    fn sub(self, other: Offset) -> isize {
        (self.0 as isize) - (other.0 as isize)
    }
}

impl Add<usize> for Offset {
    type Output = Offset;

    fn add(self, width: usize) -> Offset {
        Offset(self.0 + width)
    }
}

impl AddAssign<usize> for Offset {
    fn add_assign(&mut self, width: usize) {
        self.0 += width;
    }
}

impl Sum<usize> for Offset {
    fn sum<I: Iterator<Item = usize>>(iter: I) -> Offset {
        Offset(iter.sum())
    }
}

impl fmt::Debug for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}
