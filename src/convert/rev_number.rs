use smallvec::SmallVec;

/// A dotted RCS number, such as `1.2`, `1.2.4.1` or the magic branch
/// number `1.2.0.4`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RevNumber(SmallVec<[u32; 6]>);

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ParseError;

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("invalid revision number")
    }
}

impl RevNumber {
    pub(crate) fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Err(ParseError);
        }

        let mut parts = SmallVec::new();
        for component in raw.split('.') {
            if component.is_empty() || !component.bytes().all(|c| c.is_ascii_digit()) {
                return Err(ParseError);
            }
            parts.push(component.parse().map_err(|_| ParseError)?);
        }
        Ok(Self(parts))
    }

    #[cfg(test)]
    pub(crate) fn from_parts(parts: &[u32]) -> Self {
        Self(parts.into())
    }

    #[inline]
    pub(crate) fn parts(&self) -> &[u32] {
        &self.0
    }

    #[inline]
    pub(crate) fn is_trunk(&self) -> bool {
        self.0.len() == 2
    }

    /// Whether this numbers an actual revision (`1.2`, `1.2.4.1`).
    pub(crate) fn is_revision(&self) -> bool {
        self.0.len() >= 2 && self.0.len() % 2 == 0 && self.0.iter().all(|&n| n != 0)
    }

    /// Whether this is a magic branch number (`1.2.0.4`), the form CVS
    /// stores for branch symbols.
    pub(crate) fn is_magic_branch(&self) -> bool {
        let len = self.0.len();
        len >= 4
            && len % 2 == 0
            && self.0[len - 2] == 0
            && self
                .0
                .iter()
                .enumerate()
                .all(|(i, &n)| i == len - 2 || n != 0)
    }

    /// Whether this is a plain branch number (`1.2.4`, or a vendor branch
    /// such as `1.1.1`).
    pub(crate) fn is_branch(&self) -> bool {
        self.0.len() >= 3 && self.0.len() % 2 == 1 && self.0.iter().all(|&n| n != 0)
    }

    pub(crate) fn is_vendor_branch(&self) -> bool {
        self.is_branch() && self.0.len() == 3 && self.0[2] % 2 == 1
    }

    /// Converts a symbol number to the branch number it names, if it names
    /// a branch at all. `1.2.0.4` becomes `1.2.4`.
    pub(crate) fn to_branch(&self) -> Option<Self> {
        if self.is_magic_branch() {
            let len = self.0.len();
            let mut parts = self.0.clone();
            parts.remove(len - 2);
            Some(Self(parts))
        } else if self.is_branch() {
            Some(self.clone())
        } else {
            None
        }
    }

    /// The branch a revision lives on; `None` for trunk revisions.
    pub(crate) fn branch(&self) -> Option<Self> {
        if self.0.len() > 2 {
            Some(Self(self.0[..self.0.len() - 1].into()))
        } else {
            None
        }
    }

    /// The revision a branch number sprouts from (`1.2.4` -> `1.2`).
    pub(crate) fn branch_point(&self) -> Option<Self> {
        if self.0.len() >= 3 {
            Some(Self(self.0[..self.0.len() - 1].into()))
        } else {
            None
        }
    }
}

impl std::str::FromStr for RevNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RevNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, n) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(".")?;
            }
            write!(f, "{n}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RevNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::RevNumber;

    fn num(s: &str) -> RevNumber {
        RevNumber::parse(s).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(num("1.2.4.1").parts(), &[1, 2, 4, 1]);
        assert_eq!(num("1.10").to_string(), "1.10");

        assert!(RevNumber::parse("").is_err());
        assert!(RevNumber::parse("1..2").is_err());
        assert!(RevNumber::parse("1.2.").is_err());
        assert!(RevNumber::parse("1.x").is_err());
        assert!(RevNumber::parse("+1.2").is_err());
    }

    #[test]
    fn test_classify() {
        assert!(num("1.1").is_revision());
        assert!(num("1.1").is_trunk());
        assert!(num("1.2.4.1").is_revision());
        assert!(!num("1.2.4.1").is_trunk());
        assert!(!num("1.2.4").is_revision());
        assert!(!num("1.0").is_revision());

        assert!(num("1.2.0.4").is_magic_branch());
        assert!(!num("1.2.0.4").is_revision());
        assert!(!num("1.0.2.4").is_magic_branch());

        assert!(num("1.2.4").is_branch());
        assert!(num("1.1.1").is_vendor_branch());
        assert!(!num("1.2.4").is_vendor_branch());
    }

    #[test]
    fn test_branch_relations() {
        assert_eq!(num("1.2.0.4").to_branch(), Some(num("1.2.4")));
        assert_eq!(num("1.1.1").to_branch(), Some(num("1.1.1")));
        assert_eq!(num("1.3").to_branch(), None);

        assert_eq!(num("1.2.4.7").branch(), Some(num("1.2.4")));
        assert_eq!(num("1.7").branch(), None);
        assert_eq!(num("1.2.4").branch_point(), Some(num("1.2")));
        assert_eq!(num("1.2.4.1.2").branch_point(), Some(num("1.2.4.1")));
    }

    #[test]
    fn test_order() {
        assert!(num("1.2") < num("1.10"));
        assert!(num("1.2") < num("1.2.4.1"));
        assert!(num("1.2.4.1") < num("1.3"));
        assert_eq!(RevNumber::from_parts(&[1, 2]), num("1.2"));
    }
}
