//! Variable and command-substitution expansion of single tokens.

use crate::lexer::matching_paren;
use crate::parser::ParseError;

/// Services the expander needs from its caller.
///
/// The interpreter implements this by reading its variable store and by
/// running substituted text through the whole parse/execute pipeline again.
pub trait ExpansionContext {
    /// Value of `name`, or an empty string when it is not set.
    fn lookup(&self, name: &str) -> String;

    /// Run `line` as a command line with no stdin and return its stdout.
    fn substitute(&mut self, line: &str) -> Result<String, ParseError>;
}

/// Expands `$NAME`, `${NAME}` and, when `allow_substitution` is set, `$(...)`.
///
/// A `$` directly after a backslash is not expanded, and every `\$` of the
/// result collapses to `$` at the end. Substituted output loses its trailing
/// whitespace.
pub fn expand(
    token: &str,
    ctx: &mut dyn ExpansionContext,
    allow_substitution: bool,
) -> Result<String, ParseError> {
    let chars: Vec<char> = token.chars().collect();
    let mut out = String::with_capacity(token.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let escaped = i > 0 && chars[i - 1] == '\\';
        if ch != '$' || escaped {
            out.push(ch);
            i += 1;
            continue;
        }

        i += 1;
        match chars.get(i) {
            Some('(') if allow_substitution => {
                let end = matching_paren(&chars, i).ok_or(ParseError::UnclosedSubstitution)?;
                let inner: String = chars[i + 1..end].iter().collect();
                let output = ctx.substitute(&inner)?;
                out.push_str(output.trim_end());
                i = end + 1;
            }
            Some('{') => {
                let rest = &chars[i + 1..];
                // unterminated `${` takes the rest of the token as the name
                let (name, next) = match rest.iter().position(|&c| c == '}') {
                    Some(p) => (&rest[..p], i + 1 + p + 1),
                    None => (rest, chars.len()),
                };
                let name: String = name.iter().collect();
                out.push_str(&ctx.lookup(&name));
                i = next;
            }
            _ => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                out.push_str(&ctx.lookup(&name));
            }
        }
    }

    Ok(out.replace("\\$", "$"))
}
