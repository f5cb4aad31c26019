//! Dotted property addresses such as `Layer.Group 1.Transform.Position`.
//!
//! `*` matches exactly one segment, `**` matches any number of segments
//! (including none).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Name(String),
    Any,
    Globstar,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        match raw {
            "*" => Segment::Any,
            "**" => Segment::Globstar,
            name => Segment::Name(name.to_string()),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Any => f.write_str("*"),
            Segment::Globstar => f.write_str("**"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keypath {
    segments: Vec<Segment>,
}

impl Keypath {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Segment::parse)
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_wildcards(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Any | Segment::Globstar))
    }

    /// Whether this pattern addresses the full segment list `address`.
    pub fn matches<S: AsRef<str>>(&self, address: &[S]) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        match_segments(&self.segments, address)
    }
}

fn match_segments<S: AsRef<str>>(pattern: &[Segment], address: &[S]) -> bool {
    match pattern.split_first() {
        None => address.is_empty(),
        Some((Segment::Globstar, rest)) => {
            (0..=address.len()).any(|skip| match_segments(rest, &address[skip..]))
        }
        Some((Segment::Any, rest)) => {
            !address.is_empty() && match_segments(rest, &address[1..])
        }
        Some((Segment::Name(name), rest)) => {
            address.first().is_some_and(|head| name == head.as_ref())
                && match_segments(rest, &address[1..])
        }
    }
}

impl FromStr for Keypath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Keypath::parse(s))
    }
}

impl From<&str> for Keypath {
    fn from(s: &str) -> Self {
        Keypath::parse(s)
    }
}

impl fmt::Display for Keypath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Vec<&str> {
        s.split('.').collect()
    }

    #[test]
    fn test_exact_match() {
        let kp = Keypath::parse("Layer.Group 1.Transform.Position");
        assert!(kp.matches(&addr("Layer.Group 1.Transform.Position")));
        assert!(!kp.matches(&addr("Layer.Group 1.Transform")));
        assert!(!kp.matches(&addr("Layer.Group 2.Transform.Position")));
        assert!(!kp.has_wildcards());
    }

    #[test]
    fn test_single_wildcard() {
        let kp = Keypath::parse("Layer.*.Color");
        assert!(kp.matches(&addr("Layer.Fill 1.Color")));
        assert!(!kp.matches(&addr("Layer.Group 1.Fill 1.Color")));
    }

    #[test]
    fn test_globstar() {
        let kp = Keypath::parse("**.Color");
        assert!(kp.matches(&addr("Layer.Fill 1.Color")));
        assert!(kp.matches(&addr("Layer.Group 1.Fill 1.Color")));
        assert!(!kp.matches(&addr("Layer.Fill 1.Opacity")));

        let kp = Keypath::parse("Layer.**.Transform.Opacity");
        assert!(kp.matches(&addr("Layer.Transform.Opacity")));
        assert!(kp.matches(&addr("Layer.A.B.Transform.Opacity")));
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        assert!(!Keypath::parse("").matches(&addr("Layer")));
    }

    #[test]
    fn test_display_round_trip() {
        let kp: Keypath = "Shape Layer 1.**.Stroke 1.*".parse().unwrap();
        assert_eq!(kp.to_string(), "Shape Layer 1.**.Stroke 1.*");
    }
}
