use crate::error::{AppError, AppResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one path segment
    Single,
    /// `**`: zero or more path segments
    Any,
}

/// Ant-style request path pattern (`/**`, `/api/*/items`, `/health`).
///
/// Matching is per segment; empty segments in the request path are ignored,
/// so `/api//x/` and `/api/x` are treated alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Pattern covering every request path
    pub fn any() -> Self {
        Self {
            raw: "/**".to_string(),
            segments: vec![Segment::Any],
        }
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(AppError::InvalidPathPattern(format!(
                "{} (must start with '/')",
                raw
            )));
        }

        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Ok(Segment::Any),
                "*" => Ok(Segment::Single),
                _ if s.contains('*') => Err(AppError::InvalidPathPattern(format!(
                    "{} (wildcards must span a whole segment)",
                    raw
                ))),
                _ => Ok(Segment::Literal(s.to_string())),
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match_segments(&self.segments, &parts)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Any, rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((segment, rest)) => match path.split_first() {
            None => false,
            Some((head, tail)) => {
                let head_matches = match segment {
                    Segment::Literal(literal) => literal == head,
                    _ => true,
                };
                head_matches && match_segments(rest, tail)
            }
        },
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
