//! Ant-style path pattern matching
//!
//! Patterns are split on `/` into segments. Within a segment:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `{name}` matches zero or more characters
//! - `{name:regex}` matches the embedded regex
//!
//! A segment that is exactly `**` matches zero or more whole segments.
//! Matching is case-sensitive and performs no normalization: empty segments
//! (duplicate slashes) are skipped, `..` is an ordinary literal.

use crate::error::PatternError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// A single compiled pattern segment
#[derive(Debug, Clone)]
enum Segment {
    /// `**`
    AnyDepth,
    /// `*` on its own
    AnySegment,
    /// No wildcard characters at all
    Literal(String),
    /// Anything containing `*`, `?` or `{...}`
    Wildcard(Regex),
}

impl Segment {
    fn compile(pattern: &str, segment: &str) -> Result<Self, PatternError> {
        match segment {
            "**" => return Ok(Segment::AnyDepth),
            "*" => return Ok(Segment::AnySegment),
            _ => {}
        }

        if !segment.contains(['*', '?', '{']) {
            return Ok(Segment::Literal(segment.to_string()));
        }

        let mut body = String::with_capacity(segment.len() * 2);
        let mut chars = segment.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            match c {
                '*' => body.push_str(".*"),
                '?' => body.push('.'),
                '{' => {
                    let close = find_closing_brace(segment, idx).ok_or_else(|| {
                        PatternError::new(pattern, format!("unclosed '{{' in segment '{segment}'"))
                    })?;
                    let inner = &segment[idx + 1..close];
                    if inner.is_empty() {
                        return Err(PatternError::new(pattern, "empty '{}' variable"));
                    }
                    match inner.split_once(':') {
                        Some((_, constraint)) if constraint.is_empty() => {
                            return Err(PatternError::new(
                                pattern,
                                format!("empty constraint in '{{{inner}}}'"),
                            ));
                        }
                        Some((_, constraint)) => {
                            body.push_str("(?:");
                            body.push_str(constraint);
                            body.push(')');
                        }
                        None => body.push_str(".*"),
                    }
                    while chars.peek().is_some_and(|(i, _)| *i <= close) {
                        chars.next();
                    }
                }
                other => body.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }

        let regex = Regex::new(&format!("^(?s:{body})$"))
            .map_err(|e| PatternError::new(pattern, e.to_string()))?;

        Ok(Segment::Wildcard(regex))
    }

    fn is_any_depth(&self) -> bool {
        matches!(self, Segment::AnyDepth)
    }

    fn is_any_segment(&self) -> bool {
        matches!(self, Segment::AnySegment)
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::AnyDepth | Segment::AnySegment => true,
            Segment::Literal(literal) => literal == segment,
            Segment::Wildcard(regex) => regex.is_match(segment),
        }
    }
}

/// Byte index of the `}` closing the `{` at `open`, honouring nested braces
/// inside regex constraints such as `{id:\d{2,4}}`.
fn find_closing_brace(segment: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, c) in segment[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_segments(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|seg| !seg.is_empty())
}

/// A compiled Ant-style path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    leading_slash: bool,
    trailing_slash: bool,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern, reporting malformed segments
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let segments = split_segments(pattern)
            .map(|seg| Segment::compile(pattern, seg))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            leading_slash: pattern.starts_with('/'),
            trailing_slash: pattern.ends_with('/'),
            segments,
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether `path` matches this pattern in full
    pub fn matches(&self, path: &str) -> bool {
        if self.leading_slash != path.starts_with('/') {
            return false;
        }

        let pattern = &self.segments;
        let path_segments: Vec<&str> = split_segments(path).collect();
        let path_trailing = path.ends_with('/');

        // Half-open windows [ps, pe) over the pattern and [ss, se) over the path
        let (mut ps, mut pe) = (0, pattern.len());
        let (mut ss, mut se) = (0, path_segments.len());

        // Leading segments up to the first `**`
        while ps < pe && ss < se {
            if pattern[ps].is_any_depth() {
                break;
            }
            if !pattern[ps].matches(path_segments[ss]) {
                return false;
            }
            ps += 1;
            ss += 1;
        }

        if ss == se {
            if ps == pe {
                return self.trailing_slash == path_trailing;
            }
            if ps + 1 == pe && pattern[ps].is_any_segment() && path_trailing {
                return true;
            }
            return pattern[ps..pe].iter().all(Segment::is_any_depth);
        } else if ps == pe {
            return false;
        }

        // Trailing segments back to the last `**`
        while ps < pe && ss < se {
            if pattern[pe - 1].is_any_depth() {
                break;
            }
            if !pattern[pe - 1].matches(path_segments[se - 1]) {
                return false;
            }
            if pe == pattern.len() && self.trailing_slash != path_trailing {
                return false;
            }
            pe -= 1;
            se -= 1;
        }

        if ss == se {
            return pattern[ps..pe].iter().all(Segment::is_any_depth);
        }

        // Fixed runs between pairs of `**`, each placed at its first fit
        while ps + 1 < pe && ss < se {
            let Some(next) = (ps + 1..pe).find(|&i| pattern[i].is_any_depth()) else {
                break;
            };
            if next == ps + 1 {
                ps += 1;
                continue;
            }

            let run = &pattern[ps + 1..next];
            let available = se - ss;
            if run.len() > available {
                return false;
            }

            let found = (0..=available - run.len()).find(|&offset| {
                run.iter()
                    .zip(&path_segments[ss + offset..])
                    .all(|(seg, part)| seg.matches(part))
            });

            match found {
                Some(offset) => {
                    ps = next;
                    ss += offset + run.len();
                }
                None => return false,
            }
        }

        pattern[ps..pe].iter().all(Segment::is_any_depth)
    }
}

/// Match `path` against `pattern` without keeping the compiled form.
///
/// Malformed patterns never match.
pub fn match_path(pattern: &str, path: &str) -> bool {
    match PathPattern::compile(pattern) {
        Ok(compiled) => compiled.matches(path),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed path pattern");
            false
        }
    }
}

/// Compiled, ordered list of path patterns
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<PathPattern>,
}

impl PatternMatcher {
    /// Compile every pattern, failing on the first malformed one
    pub fn new(patterns: &[String]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| PathPattern::compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Compile every pattern, dropping malformed ones with a warning
    pub fn lenient(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| {
                PathPattern::compile(p)
                    .inspect_err(|e| warn!(error = %e, "Dropping malformed path pattern"))
                    .ok()
            })
            .collect();
        Self { patterns }
    }

    /// Create an empty matcher (matches nothing)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if a path matches any pattern
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// The first pattern that matches `path`
    pub fn find_match(&self, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.matches(path))
            .map(PathPattern::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(PathPattern::as_str)
    }
}

/// Default bound on [`PatternCache`] entries
pub const DEFAULT_PATTERN_CACHE_CAPACITY: usize = 4096;

/// Compiled patterns keyed by their source text.
///
/// Malformed patterns are cached as `None` so they are reported once. The
/// cache is cleared when it would exceed its capacity.
#[derive(Debug)]
pub struct PatternCache {
    compiled: RwLock<HashMap<String, Option<Arc<PathPattern>>>>,
    capacity: usize,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PATTERN_CACHE_CAPACITY)
    }
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Compiled form of `pattern`, `None` if it is malformed
    pub fn get(&self, pattern: &str) -> Option<Arc<PathPattern>> {
        if let Some(hit) = self
            .compiled
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pattern)
        {
            return hit.clone();
        }

        let compiled = PathPattern::compile(pattern)
            .inspect_err(|e| warn!(error = %e, "Skipping malformed policy pattern"))
            .ok()
            .map(Arc::new);

        let mut cache = self.compiled.write().unwrap_or_else(|e| e.into_inner());
        if cache.len() >= self.capacity {
            cache.clear();
        }
        cache.insert(pattern.to_string(), compiled.clone());
        compiled
    }

    pub fn len(&self) -> usize {
        self.compiled.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
