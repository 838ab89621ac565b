use std::fmt;

/// User input accepted by index resolution.
///
/// A textual token may be a full hash, a hash prefix, or a string of digits.
/// Which of these it is gets decided against the catalog at resolve time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A literal catalog index.
    Index(u64),
    /// Free-form text: full hash, hash prefix, or digits.
    Text(String),
}

impl Token {
    /// The literal index this token denotes, if it is numeric.
    ///
    /// Text counts as numeric when it is non-empty and every character is an
    /// ASCII digit. Digit strings too large for `u64` are not numeric.
    pub fn as_index(&self) -> Option<u64> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Text(s) if is_numeric(s) => s.parse().ok(),
            Self::Text(_) => None,
        }
    }
}

/// Returns `true` if `s` is non-empty and consists only of ASCII digits.
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl From<u64> for Token {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}
