//! Target language version.

use std::fmt;

/// A `major.minor` version of the language being compiled.
///
/// Emission decisions that changed between language releases take one of
/// these as an explicit input rather than a hard-coded constant.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Decode the `0x350` style used in version switches.
    pub const fn from_hex(hex: u16) -> Self {
        Self {
            major: ((hex >> 8) & 0xF) as u8,
            minor: ((hex >> 4) & 0xF) as u8,
        }
    }

    pub fn is_python2(self) -> bool {
        self.major < 3
    }
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self::new(3, 11)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
