//! Source spans.
//!
//! A [`Span`] is a byte range into the source text. [`Spanned`] attaches a
//! span to any value so later phases can point diagnostics at the code that
//! produced it.

use std::ops::Range;

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span from a byte range.
    pub fn new(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end.max(range.start),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Create a union of two spans (encompassing both)
    pub fn union(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start)..self.end.max(other.end))
    }

    /// Locates the line containing the start of this span.
    ///
    /// # Examples
    ///
    /// ```
    /// use diagrammer_parser::Span;
    ///
    /// let source = "a = 1\nb = open\n";
    /// let line = Span::new(10..14).line_in(source);
    /// assert_eq!(line.number(), 2);
    /// assert_eq!(line.text(), "b = open");
    /// ```
    pub fn line_in<'a>(&self, source: &'a str) -> SourceLine<'a> {
        let offset = self.start.min(source.len());
        let line_start = source[..offset].rfind('\n').map_or(0, |idx| idx + 1);
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |idx| offset + idx);
        let number = source[..line_start].matches('\n').count() + 1;

        SourceLine {
            number,
            text: source[line_start..line_end].trim_end_matches('\r'),
        }
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range)
    }
}

/// A 1-based line number together with the verbatim line text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    number: usize,
    text: &'a str,
}

impl<'a> SourceLine<'a> {
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn text(&self) -> &'a str {
        self.text
    }
}

/// A value together with the span it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    value: T,
    span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Get a reference to the underlying value
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Consume the wrapper and return the inner value
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Transform the value while keeping the span.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_union() {
        let a = Span::new(4..8);
        let b = Span::new(1..5);
        assert_eq!(a.union(b), Span::new(1..8));
        assert_eq!(a.len(), 4);
        assert!(Span::new(3..3).is_empty());
    }

    #[test]
    fn test_line_in_first_and_last_line() {
        let source = "first\nsecond\nthird";
        assert_eq!(Span::new(0..1).line_in(source).number(), 1);
        assert_eq!(Span::new(0..1).line_in(source).text(), "first");

        let third = Span::new(14..15).line_in(source);
        assert_eq!(third.number(), 3);
        assert_eq!(third.text(), "third");
    }

    #[test]
    fn test_line_in_past_end() {
        let source = "only\n";
        let line = Span::new(99..100).line_in(source);
        assert_eq!(line.number(), 2);
        assert_eq!(line.text(), "");
    }

    #[test]
    fn test_line_in_strips_carriage_return() {
        let source = "a\r\nb\r\n";
        let line = Span::new(3..4).line_in(source);
        assert_eq!(line.number(), 2);
        assert_eq!(line.text(), "b");
    }

    #[test]
    fn test_spanned_map() {
        let spanned = Spanned::new("graph", Span::new(0..5)).map(str::len);
        assert_eq!(*spanned.inner(), 5);
        assert_eq!(spanned.span(), Span::new(0..5));
    }
}
