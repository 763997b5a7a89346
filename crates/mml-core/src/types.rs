use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    pub fn at(location: SourceLocation) -> Self {
        Self {
            start: location,
            end: location,
        }
    }

    pub fn synthetic() -> Self {
        Self::at(SourceLocation::start())
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn span_serializes_with_line_and_column() {
        let span = SourceSpan::new(
            SourceLocation { line: 1, column: 2 },
            SourceLocation { line: 1, column: 5 },
        );
        let json = serde_json::to_string(&span).expect("span should serialize");
        assert_eq!(
            json,
            r#"{"start":{"line":1,"column":2},"end":{"line":1,"column":5}}"#
        );
    }

    #[test]
    fn synthetic_span_points_at_first_column() {
        let span = SourceSpan::synthetic();
        assert_eq!(span.start, SourceLocation::start());
        assert_eq!(span.start, span.end);
    }
}
