//! Dotted paths into configuration trees
//!
//! A [`Path`] is an ordered list of segments. Struct fields contribute their
//! field name, map entries their key, and list elements `Name[i]`. The string
//! form joins segments with `.`; a literal `.` or `\` inside a segment is
//! escaped with `\` so rendering followed by [`Path::parse`] is lossless.

use std::fmt;

/// Separator between path segments in the rendered form
pub const PATH_SEPARATOR: char = '.';

const ESCAPE: char = '\\';

/// A location inside a configuration tree
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path (the tree root)
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from raw (unescaped) segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a rendered path, honouring `\` escapes
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::root();
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => match chars.next() {
                    Some(next) => current.push(next),
                    None => current.push(ESCAPE),
                },
                PATH_SEPARATOR => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        Self(segments)
    }

    /// A new path with `segment` appended. `self` is left untouched so
    /// sibling branches of a walk never share storage.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Self(segments)
    }

    /// A new path with the indexed segment `field[index]` appended
    pub fn indexed_child(&self, field: &str, index: usize) -> Self {
        self.child(format!("{}[{}]", field, index))
    }

    /// Raw segments
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Render with the first character of every segment lower-cased, the
    /// way fields are spelled in user-facing YAML (`Components.Pilot.Hub`
    /// becomes `components.pilot.hub`).
    pub fn to_yaml_path(&self) -> String {
        let lowered: Vec<String> = self.0.iter().map(|s| first_char_to_lower(s)).collect();
        join_escaped(&lowered)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_escaped(&self.0))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Escape separator and escape characters inside a single segment
pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == PATH_SEPARATOR || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Split an indexed segment such as `IngressGateways[3]` into its field
/// name and index. Returns `None` for plain segments.
pub fn split_index(segment: &str) -> Option<(&str, usize)> {
    let open = segment.rfind('[')?;
    let inner = segment[open + 1..].strip_suffix(']')?;
    let index = inner.parse().ok()?;
    Some((&segment[..open], index))
}

fn join_escaped(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| escape_segment(s))
        .collect::<Vec<_>>()
        .join(&PATH_SEPARATOR.to_string())
}

fn first_char_to_lower(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_segments_joined_by_dots() {
        let p = Path::from_segments(["Components", "Pilot", "Hub"]);
        assert_eq!(p.to_string(), "Components.Pilot.Hub");
    }

    #[test]
    fn child_does_not_mutate_parent() {
        let parent = Path::from_segments(["Components"]);
        let a = parent.child("Pilot");
        let b = parent.child("Cni");
        assert_eq!(parent.len(), 1);
        assert_eq!(a.to_string(), "Components.Pilot");
        assert_eq!(b.to_string(), "Components.Cni");
    }

    #[test]
    fn indexed_child_uses_brackets() {
        let p = Path::from_segments(["Components"]).indexed_child("IngressGateways", 2);
        assert_eq!(p.to_string(), "Components.IngressGateways[2]");
        assert_eq!(split_index(p.last().unwrap()), Some(("IngressGateways", 2)));
    }

    #[test]
    fn split_index_rejects_plain_segments() {
        assert_eq!(split_index("Hub"), None);
        assert_eq!(split_index("Gateways[*]"), None);
        assert_eq!(split_index("Gateways[1"), None);
    }

    #[test]
    fn separator_inside_segment_is_escaped() {
        let p = Path::from_segments(["Labels", "app.kubernetes.io/name"]);
        assert_eq!(p.to_string(), r"Labels.app\.kubernetes\.io/name");
    }

    #[test]
    fn parse_reverses_render() {
        let segments = ["MeshConfig", "a.b", r"c\d", "", "e"];
        let p = Path::from_segments(segments);
        assert_eq!(Path::parse(&p.to_string()), p);
    }

    #[test]
    fn parse_empty_string_is_root() {
        assert!(Path::parse("").is_empty());
    }

    #[test]
    fn yaml_path_lowercases_first_letters() {
        let p = Path::from_segments(["Components", "IngressGateways[0]", "Name"]);
        assert_eq!(p.to_yaml_path(), "components.ingressGateways[0].name");
    }
}
