//! JavaScript re-indenter.
//!
//! JavaScript is not reformatted token by token: line breaks are kept and
//! each line is trimmed and re-indented by its bracket depth. A scanner
//! tracks strings, template literals (including `${}` interpolation),
//! comments and regex literals so brackets inside them don't count.
//!
//! Lines that start inside a template literal, a block comment or a
//! continued string are content and are kept byte for byte.

/// Re-indent a script with `indent` spaces per bracket level.
pub fn format_js(source: &str, indent: usize) -> String {
    let mut scanner = Scanner::default();
    let mut lines: Vec<String> = Vec::new();

    for line in source.lines() {
        if scanner.in_content() {
            lines.push(line.to_string());
            scanner.scan(line);
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        let closers = trimmed
            .chars()
            .take_while(|c| matches!(c, '}' | ']' | ')'))
            .count();
        let level = scanner.depth.saturating_sub(closers);
        lines.push(format!("{}{trimmed}", " ".repeat(level * indent)));
        scanner.scan(trimmed);
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Inside a template literal's text.
    Template,
    /// Inside `${ ... }`, with the count of unclosed `{` in it.
    Interpolation(usize),
}

#[derive(Debug, Default)]
struct Scanner {
    depth: usize,
    stack: Vec<Context>,
    block_comment: bool,
    /// Open quote of a string continued with a trailing backslash.
    string: Option<char>,
    /// Last significant code character, across lines.
    prev: Option<char>,
}

const KEYWORDS_BEFORE_REGEX: &[&str] = &[
    "return", "typeof", "instanceof", "case", "do", "else", "in", "of", "new", "delete", "void",
    "throw", "yield", "await",
];

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

impl Scanner {
    fn in_template(&self) -> bool {
        self.stack.last() == Some(&Context::Template)
    }

    fn in_content(&self) -> bool {
        self.block_comment || self.string.is_some() || self.in_template()
    }

    /// A `/` at `i` starts a regex literal rather than a division.
    fn regex_allowed(&self, chars: &[char], i: usize) -> bool {
        let mut j = i;
        while j > 0 && chars[j - 1].is_whitespace() {
            j -= 1;
        }
        let prev = if j > 0 { Some(chars[j - 1]) } else { self.prev };
        match prev {
            None => true,
            Some(c) if is_ident(c) => {
                if j == 0 {
                    return false;
                }
                let mut start = j;
                while start > 0 && is_ident(chars[start - 1]) {
                    start -= 1;
                }
                let word: String = chars[start..j].iter().collect();
                KEYWORDS_BEFORE_REGEX.contains(&word.as_str())
            }
            Some(c) => !matches!(c, ')' | ']' | '}' | '"' | '\'' | '`'),
        }
    }

    fn scan(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.block_comment {
                if c == '*' && next == Some('/') {
                    self.block_comment = false;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }
            if let Some(quote) = self.string {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == quote {
                    self.string = None;
                    self.prev = Some(quote);
                }
                i += 1;
                continue;
            }
            if self.in_template() {
                match c {
                    '\\' => i += 2,
                    '`' => {
                        self.stack.pop();
                        self.prev = Some('`');
                        i += 1;
                    }
                    '$' if next == Some('{') => {
                        self.stack.push(Context::Interpolation(0));
                        self.prev = Some('{');
                        i += 2;
                    }
                    _ => i += 1,
                }
                continue;
            }

            match c {
                '/' if next == Some('/') => break,
                '/' if next == Some('*') => {
                    self.block_comment = true;
                    i += 2;
                    continue;
                }
                '/' if self.regex_allowed(&chars, i) => {
                    i = skip_regex(&chars, i + 1);
                    self.prev = Some('/');
                    continue;
                }
                '\'' | '"' => self.string = Some(c),
                '`' => self.stack.push(Context::Template),
                '{' => {
                    if let Some(Context::Interpolation(open)) = self.stack.last_mut() {
                        *open += 1;
                    }
                    self.depth += 1;
                }
                '}' => {
                    if let Some(Context::Interpolation(open)) = self.stack.last_mut() {
                        if *open == 0 {
                            self.stack.pop();
                            self.prev = Some('}');
                            i += 1;
                            continue;
                        }
                        *open -= 1;
                    }
                    self.depth = self.depth.saturating_sub(1);
                }
                '(' | '[' => self.depth += 1,
                ')' | ']' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            if !c.is_whitespace() {
                self.prev = Some(c);
            }
            i += 1;
        }

        // Strings end with the line unless continued with a backslash.
        if self.string.is_some() && !line.ends_with('\\') {
            self.string = None;
        }
    }
}

/// Index just past the regex literal whose body starts at `i`.
fn skip_regex(chars: &[char], mut i: usize) -> usize {
    let mut in_class = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => return i + 1,
            _ => {}
        }
        i += 1;
    }
    i
}
