//! Lexical analysis of a command line: splitting into pipe segments and into words.
//!
//! Both passes share one finite state machine. Quotes and backslash escapes are
//! honoured by both, but only word splitting removes them; pipe splitting keeps
//! the segment text verbatim so that it can be tokenized again later.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    SingleQuote,
    DoubleQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitMode {
    /// Separate on unquoted whitespace, dropping quotes and escapes.
    Words,
    /// Separate on unquoted `|`, keeping everything else.
    Pipes,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    mode: SplitMode,
    buffer: String,
    out: Vec<String>,
}

impl LexingFSM {
    fn new(line: &str, mode: SplitMode) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            mode,
            buffer: String::new(),
            out: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<String> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch),
                LexingState::SingleQuote => self.handle_single_quote(ch),
                LexingState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        // An unmatched quote simply ends here; its content is already buffered.
        match self.mode {
            SplitMode::Words => self.flush_word(),
            SplitMode::Pipes => {
                if !self.out.is_empty() || !self.buffer.trim().is_empty() {
                    self.flush_segment();
                }
            }
        }
        self.out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn keeps_syntax(&self) -> bool {
        self.mode == SplitMode::Pipes
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            '\\' => {
                // A trailing backslash escapes nothing and is dropped.
                if let Some(next) = self.read_char() {
                    // `\$` stays escaped so the expander leaves it alone.
                    if self.keeps_syntax() || next == '$' {
                        self.buffer.push('\\');
                    }
                    self.buffer.push(next);
                } else if self.keeps_syntax() {
                    self.buffer.push('\\');
                }
            }
            '\'' => {
                self.state = LexingState::SingleQuote;
                if self.keeps_syntax() {
                    self.buffer.push(ch);
                }
            }
            '"' => {
                self.state = LexingState::DoubleQuote;
                if self.keeps_syntax() {
                    self.buffer.push(ch);
                }
            }
            '$' if self.peek_char() == Some('(') => self.copy_substitution(),
            c if c.is_whitespace() && self.mode == SplitMode::Words => self.flush_word(),
            '|' if self.mode == SplitMode::Pipes => self.flush_segment(),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => {
                self.state = LexingState::Unquoted;
                if self.keeps_syntax() {
                    self.buffer.push(ch);
                }
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => {
                self.state = LexingState::Unquoted;
                if self.keeps_syntax() {
                    self.buffer.push(ch);
                }
            }
            '$' if self.peek_char() == Some('(') => self.copy_substitution(),
            c => self.buffer.push(c),
        }
    }

    /// Copies a whole `$( ... )` span verbatim. The `$` has been consumed and
    /// `self.pos` points at the opening parenthesis.
    fn copy_substitution(&mut self) {
        self.buffer.push('$');
        let end = matching_paren(&self.input, self.pos).unwrap_or(self.input.len() - 1);
        self.buffer.extend(&self.input[self.pos..=end]);
        self.pos = end + 1;
    }

    fn flush_word(&mut self) {
        if !self.buffer.is_empty() {
            self.out.push(std::mem::take(&mut self.buffer));
        }
    }

    fn flush_segment(&mut self) {
        let segment = std::mem::take(&mut self.buffer);
        self.out.push(segment.trim().to_string());
    }
}

/// Finds the `)` closing the `(` at `input[open]`.
///
/// Nested parentheses are counted; parentheses inside quotes or escaped with a
/// backslash are ignored. Returns `None` when the input ends first.
pub(crate) fn matching_paren(input: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = open;
    while i < input.len() {
        let ch = input[i];
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\\' => i += 1,
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Splits a line into words on unquoted whitespace.
///
/// Quotes group characters and are removed; a backslash outside quotes makes
/// the next character literal. Command substitutions `$( ... )` are kept whole.
pub fn tokenize(line: &str) -> Vec<String> {
    LexingFSM::new(line, SplitMode::Words).run()
}

/// Splits a line into trimmed segments on unquoted `|`.
///
/// Quotes and escapes are kept in the segment text. A blank line yields no
/// segments; a blank segment between or around pipes is kept as `""`.
pub fn split_pipes(line: &str) -> Vec<String> {
    LexingFSM::new(line, SplitMode::Pipes).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_plain_and_quoted() {
        assert_eq!(tokenize("a \"b c\" d"), words(&["a", "b c", "d"]));
        assert_eq!(tokenize("  echo   hello\tworld  "), words(&["echo", "hello", "world"]));
        assert_eq!(tokenize("'single quoted' x"), words(&["single quoted", "x"]));
    }

    #[test]
    fn test_tokenize_joins_adjacent_quoted_parts() {
        assert_eq!(tokenize("ab\"c d\"e"), words(&["abc de"]));
    }

    #[test]
    fn test_tokenize_keeps_other_quote_inside_quotes() {
        assert_eq!(tokenize("\"it's\""), words(&["it's"]));
        assert_eq!(tokenize("'say \"hi\"'"), words(&["say \"hi\""]));
    }

    #[test]
    fn test_tokenize_escapes() {
        assert_eq!(tokenize(r"a\ b c"), words(&["a b", "c"]));
        assert_eq!(tokenize(r#"\"x\""#), words(&["\"x\""]));
        // trailing backslash is dropped
        assert_eq!(tokenize(r"abc\"), words(&["abc"]));
        // inside quotes the backslash stays for the expander
        assert_eq!(tokenize(r"\$HOME"), words(&[r"\$HOME"]));
        assert_eq!(tokenize(r#""\$HOME""#), words(&[r"\$HOME"]));
    }

    #[test]
    fn test_tokenize_unmatched_quote_runs_to_end() {
        assert_eq!(tokenize("echo \"unterminated  text"), words(&["echo", "unterminated  text"]));
    }

    #[test]
    fn test_tokenize_empty_quotes_produce_nothing() {
        assert_eq!(tokenize("a \"\" b"), words(&["a", "b"]));
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_substitution_whole() {
        assert_eq!(tokenize("echo $(echo a b) c"), words(&["echo", "$(echo a b)", "c"]));
        assert_eq!(tokenize("x\"$(echo \"q r\")\"y"), words(&["x$(echo \"q r\")y"]));
        assert_eq!(tokenize("echo $(echo (a"), words(&["echo", "$(echo (a"]));
    }

    #[test]
    fn test_split_pipes_respects_quotes() {
        assert_eq!(split_pipes("echo \"a|b\" | wc"), words(&["echo \"a|b\"", "wc"]));
        assert_eq!(split_pipes("echo 'x|y'|grep x"), words(&["echo 'x|y'", "grep x"]));
    }

    #[test]
    fn test_split_pipes_keeps_escapes_verbatim() {
        assert_eq!(split_pipes(r"echo a\|b | wc"), words(&[r"echo a\|b", "wc"]));
        assert_eq!(tokenize(r"echo a\|b"), words(&["echo", "a|b"]));
    }

    #[test]
    fn test_split_pipes_ignores_pipes_in_substitution() {
        assert_eq!(
            split_pipes("echo $(echo a | wc) | wc"),
            words(&["echo $(echo a | wc)", "wc"])
        );
    }

    #[test]
    fn test_split_pipes_keeps_empty_segments() {
        assert_eq!(split_pipes("echo a |"), words(&["echo a", ""]));
        assert_eq!(split_pipes("| wc"), words(&["", "wc"]));
        assert!(split_pipes("   ").is_empty());
    }

    #[test]
    fn test_matching_paren_nesting_and_quotes() {
        let input: Vec<char> = "(a (b) \")\" c) d".chars().collect();
        assert_eq!(matching_paren(&input, 0), Some(12));
        let open: Vec<char> = "(a (b)".chars().collect();
        assert_eq!(matching_paren(&open, 0), None);
    }
}
