//! CSS pretty-printer.
//!
//! A small comment- and string-aware tokenizer. Each declaration gets its
//! own line, `{` opens an indented block and `}` closes it on its own line.
//! Runs of whitespace collapse to one space. Strings, comments and
//! backslash escapes (`.a\{`) are copied verbatim, and `;`/`{`/`}` inside parentheses (`url(data:...;base64,...)`)
//! are plain text.

/// Pretty-print a stylesheet with `indent` spaces per level.
pub fn format_css(source: &str, indent: usize) -> String {
    let mut out = Lines::new(indent);
    let mut buf = String::new();
    let mut parens = 0usize;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut comment = String::from("/*");
                let mut prev = '\0';
                for c in chars.by_ref() {
                    comment.push(c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                if buf.trim().is_empty() {
                    buf.clear();
                    out.push(&comment);
                } else {
                    buf.push_str(&comment);
                }
            }
            '"' | '\'' => {
                buf.push(c);
                while let Some(n) = chars.next() {
                    buf.push(n);
                    if n == '\\' {
                        if let Some(escaped) = chars.next() {
                            buf.push(escaped);
                        }
                    } else if n == c {
                        break;
                    }
                }
            }
            '\\' => {
                buf.push(c);
                if let Some(escaped) = chars.next() {
                    buf.push(escaped);
                }
            }
            '(' => {
                parens += 1;
                buf.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                buf.push(c);
            }
            c if c.is_ascii_whitespace() => {
                if !buf.is_empty() && !buf.ends_with(' ') {
                    buf.push(' ');
                }
            }
            '{' if parens == 0 => {
                let selector = buf.trim();
                if selector.is_empty() {
                    out.push("{");
                } else {
                    out.push(&format!("{selector} {{"));
                }
                buf.clear();
                out.depth += 1;
            }
            ';' if parens == 0 => {
                let declaration = buf.trim();
                if !declaration.is_empty() {
                    out.push(&format!("{declaration};"));
                }
                buf.clear();
            }
            '}' if parens == 0 => {
                let declaration = buf.trim();
                if !declaration.is_empty() {
                    out.push(&format!("{declaration};"));
                }
                buf.clear();
                out.depth = out.depth.saturating_sub(1);
                out.push("}");
                if out.depth == 0 {
                    out.blank();
                }
            }
            _ => buf.push(c),
        }
    }

    let rest = buf.trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out.finish()
}

struct Lines {
    lines: Vec<String>,
    indent: usize,
    depth: usize,
}

impl Lines {
    fn new(indent: usize) -> Self {
        Self {
            lines: Vec::new(),
            indent,
            depth: 0,
        }
    }

    fn push(&mut self, text: &str) {
        self.lines
            .push(format!("{}{text}", " ".repeat(self.depth * self.indent)));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| !l.is_empty()) {
            self.lines.push(String::new());
        }
    }

    fn finish(mut self) -> String {
        while self.lines.last().is_some_and(|l| l.is_empty()) {
            self.lines.pop();
        }
        if self.lines.is_empty() {
            return String::new();
        }
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}
