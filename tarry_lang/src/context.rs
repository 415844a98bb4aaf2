use std::fmt;

use logos::Span;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSpan {
    pub start: usize,
    pub end_line: u32,
    pub len: u32,
}

impl ContextSpan {
    pub fn new(span: Span, end_line: u32) -> Self {
        Self {
            start: span.start,
            end_line,
            len: (span.end - span.start) as u32,
        }
    }
}

impl From<ContextSpan> for Span {
    fn from(ctx: ContextSpan) -> Self {
        ctx.start..ctx.start + ctx.len as usize
    }
}

/// A failure located in source text, rendered with a caret marker under the
/// offending token when formatted with `{:#}`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorContext {
    pub file_name: String,
    pub line_num: u32,
    pub line_content: String,
    pub token_location: Span,
    pub message: String,
}

impl ErrorContext {
    pub fn new(
        file_name: String,
        last_line_num: u32,
        source: &str,
        token_location: Span,
        message: String,
    ) -> Self {
        let token_start = token_location.start.min(source.len());
        let token_end = token_location.end.clamp(token_start, source.len());
        let start_pos = source[..token_start]
            .rfind('\n')
            .map(|loc| loc + 1)
            .unwrap_or(0);
        let end_pos = source[token_end..]
            .find('\n')
            .map(|loc| loc + token_end)
            .unwrap_or(source.len());
        let line_content = source[start_pos..end_pos].to_string();
        let contained_lines = line_content.chars().filter(|&c| c == '\n').count() as u32;
        Self {
            file_name,
            line_num: last_line_num.saturating_sub(contained_lines),
            line_content,
            token_location: (token_start - start_pos)..(token_end - start_pos),
            message,
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            return write!(f, "{}:{} {}", self.file_name, self.line_num, self.message);
        }
        writeln!(f, "Error at {}:{}", self.file_name, self.line_num)?;
        let mut line_num = self.line_num;
        let width = (self.line_num as usize + self.line_content.matches('\n').count())
            .to_string()
            .len();
        let mut offset = 0;
        for line in self.line_content.split('\n') {
            let carets: String = line
                .char_indices()
                .map(|(idx, _)| {
                    let idx = idx + offset;
                    if idx >= self.token_location.start && idx < self.token_location.end {
                        '^'
                    } else {
                        ' '
                    }
                })
                .collect();
            writeln!(f, "{:width$} |{}", line_num, line, width = width)?;
            writeln!(f, "{:width$} |{}", "", carets.trim_end(), width = width)?;
            offset += line.len() + 1;
            line_num += 1;
        }
        write!(f, "{}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_line_in_source() {
        let source = "let x = 1;\nlet y = ?;\nx;";
        let ctx = ErrorContext::new("test".into(), 2, source, 19..20, "Unknown token".into());
        assert_eq!(ctx.line_num, 2);
        assert_eq!(ctx.line_content, "let y = ?;");
        assert_eq!(ctx.token_location, 8..9);
        assert_eq!(format!("{}", ctx), "test:2 Unknown token");
        let rendered = format!("{:#}", ctx);
        assert!(rendered.contains("2 |let y = ?;"));
        assert!(rendered.contains(" |        ^"));
    }
}
