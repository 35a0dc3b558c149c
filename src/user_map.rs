use crate::FHashMap;

/// Maps CVS user names to git identities.
pub(crate) struct UserMap {
    map: FHashMap<String, UserMapEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UserMapEntry {
    name: String,
    email: String,
}

pub(crate) enum UserMapParseError {
    Io(std::io::Error),
    BadLine(usize, Vec<u8>),
    Duplicate(usize, String),
}

impl From<std::io::Error> for UserMapParseError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl std::fmt::Display for UserMapParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Io(ref e) => std::fmt::Display::fmt(e, f),
            Self::BadLine(line, ref line_data) => {
                write!(f, "bad line {}: \"{}\"", line + 1, line_data.escape_ascii())
            }
            Self::Duplicate(line, ref user) => {
                write!(f, "line {}: user {user:?} is already mapped", line + 1)
            }
        }
    }
}

impl UserMap {
    pub(crate) fn new() -> Self {
        Self {
            map: FHashMap::default(),
        }
    }

    /// Parses `user = Name <email>` lines. Blank lines and lines starting
    /// with `#` are ignored.
    pub(crate) fn parse(src: &mut dyn std::io::BufRead) -> Result<Self, UserMapParseError> {
        let mut map = FHashMap::default();

        let mut line_i = 0;
        let mut line = Vec::new();
        loop {
            line.clear();
            src.read_until(b'\n', &mut line)?;

            match parse_line(&line) {
                Some(Some((user, entry))) => {
                    if map.contains_key(&user) {
                        return Err(UserMapParseError::Duplicate(line_i, user));
                    }
                    map.insert(user, entry);
                }
                Some(None) => {}
                None => return Err(UserMapParseError::BadLine(line_i, line)),
            }

            if !line.ends_with(b"\n") {
                break;
            }

            line_i += 1;
        }

        Ok(Self { map })
    }

    pub(crate) fn get(&self, user: &str) -> Option<(&str, &str)> {
        self.map
            .get(user)
            .map(|entry| (entry.name.as_str(), entry.email.as_str()))
    }
}

fn parse_line(line: &[u8]) -> Option<Option<(String, UserMapEntry)>> {
    let line = std::str::from_utf8(line).ok()?;
    let line = line.trim_matches([' ', '\t', '\r', '\n']);

    if line.is_empty() || line.starts_with('#') {
        return Some(None);
    }

    let (user, rem) = line.split_once('=')?;
    let user = user.trim_matches([' ', '\t']);
    if user.is_empty() || user.contains([' ', '\t']) {
        return None;
    }

    let (name, rem) = rem.split_once('<')?;
    let (email, rem) = rem.split_once('>')?;
    if !rem.trim_matches([' ', '\t']).is_empty() || email.contains('<') {
        return None;
    }

    Some(Some((
        user.to_owned(),
        UserMapEntry {
            name: name.trim_matches([' ', '\t']).to_owned(),
            email: email.to_owned(),
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::{UserMap, UserMapEntry, parse_line};

    fn entry(name: &str, email: &str) -> UserMapEntry {
        UserMapEntry {
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line(b" joe = Joe User <joe@example.com> \n"),
            Some(Some(("joe".into(), entry("Joe User", "joe@example.com")))),
        );
        assert_eq!(
            parse_line(b"joe=Joe User<joe@example.com>"),
            Some(Some(("joe".into(), entry("Joe User", "joe@example.com")))),
        );
        assert_eq!(parse_line(b"   \r\n"), Some(None));
        assert_eq!(parse_line(b"# comment"), Some(None));
        assert_eq!(parse_line(b"joe Joe <joe@example.com>"), None);
        assert_eq!(parse_line(b"j oe = Joe <joe@example.com>"), None);
        assert_eq!(parse_line(b"joe = Joe <joe@example.com> extra"), None);
    }

    #[test]
    fn test_parse_map() {
        let mut src: &[u8] = b"joe = Joe <joe@example.com>\n\nann = Ann <ann@example.com>";
        let map = UserMap::parse(&mut src).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(map.get("joe"), Some(("Joe", "joe@example.com")));
        assert_eq!(map.get("ann"), Some(("Ann", "ann@example.com")));
        assert_eq!(map.get("bob"), None);

        let mut src: &[u8] = b"joe = Joe <joe@example.com>\njoe = Other <o@example.com>\n";
        assert!(UserMap::parse(&mut src).is_err());
    }
}
