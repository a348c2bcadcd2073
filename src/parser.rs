use crate::builtin::Builtin;
use crate::command::{Command, CommandKind, Pipeline};
use crate::env::is_identifier;
use crate::expand::{ExpansionContext, expand};
use crate::lexer::{split_pipes, tokenize};
use log::debug;
use thiserror::Error;

/// Errors that can occur while turning a line into commands.
///
/// A failed parse never executes the line; the read loop reports the error
/// and moves on.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The left side of `NAME=value` is not an identifier.
    #[error("Invalid variable name: {0}")]
    InvalidVariableName(String),
    /// A `$(` without its closing parenthesis.
    #[error("unclosed command substitution")]
    UnclosedSubstitution,
    /// Command substitutions nested beyond the configured limit.
    #[error("command substitution nested deeper than {0} levels")]
    SubstitutionTooDeep(usize),
}

/// Decide how a command name is executed.
///
/// Only exact, case-sensitive builtin names are builtins; anything else is
/// looked up as an external program.
pub fn classify(name: &str) -> CommandKind {
    match Builtin::from_name(name) {
        Some(builtin) => CommandKind::Builtin(builtin),
        None => CommandKind::External,
    }
}

/// Parses and expands one input line.
///
/// Returns `Ok(None)` for blank lines and for lines where some pipe segment
/// has no words (`echo a |`). Command substitutions found while expanding are
/// executed through `ctx` before this function returns.
pub fn parse_line(
    line: &str,
    ctx: &mut dyn ExpansionContext,
) -> Result<Option<Pipeline>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if line.contains('=') && !line.starts_with('=') {
        return parse_assignment(line, ctx).map(|c| Some(Pipeline::single(c)));
    }

    let segments = split_pipes(line);
    debug!("pipe segments: {:?}", segments);

    let mut stages = Vec::with_capacity(segments.len());
    for segment in &segments {
        let tokens = tokenize(segment);
        debug!("tokens: {:?}", tokens);
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut words = Vec::with_capacity(tokens.len());
        for token in &tokens {
            words.push(expand(token, ctx, true)?);
        }

        let mut words = words.into_iter();
        let name = words.next().unwrap_or_default();
        let kind = classify(&name);
        stages.push(Command::new(kind, name, words.collect()));
    }

    let pipeline = Pipeline::new(stages);
    debug!("parsed: {:?}", pipeline);
    Ok(pipeline)
}

/// `NAME = value`; the trimmed value is expanded as one piece and kept verbatim otherwise.
fn parse_assignment(line: &str, ctx: &mut dyn ExpansionContext) -> Result<Command, ParseError> {
    let (name, value) = line.split_once('=').unwrap_or((line, ""));
    let name = name.trim();
    if !is_identifier(name) {
        return Err(ParseError::InvalidVariableName(name.to_string()));
    }

    let value = expand(value.trim(), ctx, true)?;
    Ok(Command::assignment(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct VarsOnly {
        vars: HashMap<String, String>,
        substituted: Vec<String>,
    }

    impl ExpansionContext for VarsOnly {
        fn lookup(&self, name: &str) -> String {
            self.vars.get(name).cloned().unwrap_or_default()
        }

        fn substitute(&mut self, line: &str) -> Result<String, ParseError> {
            self.substituted.push(line.to_string());
            Ok("out\n".to_string())
        }
    }

    fn names(p: &Pipeline) -> Vec<&str> {
        p.stages().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_classify_builtins_exactly() {
        assert_eq!(classify("echo"), CommandKind::Builtin(Builtin::Echo));
        assert_eq!(classify("grep"), CommandKind::Builtin(Builtin::Grep));
        assert_eq!(classify("Echo"), CommandKind::External);
        assert_eq!(classify("ls"), CommandKind::External);
    }

    #[test]
    fn test_blank_line_is_no_command() {
        let mut ctx = VarsOnly::default();
        assert!(parse_line("", &mut ctx).unwrap().is_none());
        assert!(parse_line("   \t ", &mut ctx).unwrap().is_none());
    }

    #[test]
    fn test_simple_command() {
        let mut ctx = VarsOnly::default();
        let p = parse_line("echo hello world", &mut ctx).unwrap().unwrap();
        assert_eq!(p.len(), 1);
        let cmd = p.head();
        assert_eq!(cmd.kind, CommandKind::Builtin(Builtin::Echo));
        assert_eq!(cmd.args, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_pipeline_is_linked_in_order() {
        let mut ctx = VarsOnly::default();
        let p = parse_line("echo \"a|b\" | grep a | wc", &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(names(&p), vec!["echo", "grep", "wc"]);
        assert_eq!(p.head().args, vec!["a|b".to_string()]);
        assert_eq!(p.next_of(1).map(|c| c.kind), Some(CommandKind::Builtin(Builtin::Wc)));
    }

    #[test]
    fn test_empty_segment_aborts_line() {
        let mut ctx = VarsOnly::default();
        assert!(parse_line("echo a |", &mut ctx).unwrap().is_none());
        assert!(parse_line("| wc", &mut ctx).unwrap().is_none());
        assert!(parse_line("echo a | | wc", &mut ctx).unwrap().is_none());
    }

    #[test]
    fn test_assignment() {
        let mut ctx = VarsOnly::default();
        ctx.vars.insert("Y".into(), "7".into());
        let p = parse_line("X = $Y", &mut ctx).unwrap().unwrap();
        let cmd = p.head();
        assert_eq!(cmd.kind, CommandKind::Assignment);
        assert_eq!(cmd.name, "X");
        assert_eq!(cmd.args, vec!["7".to_string()]);
    }

    #[test]
    fn test_assignment_value_is_kept_verbatim() {
        let mut ctx = VarsOnly::default();
        let p = parse_line("X=a   b", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().args, vec!["a   b".to_string()]);

        let p = parse_line("MSG=\"q r\"", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().args, vec!["\"q r\"".to_string()]);

        let p = parse_line("OUT = [$(pwd)]  ", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().args, vec!["[out]".to_string()]);
        assert_eq!(ctx.substituted, vec!["pwd".to_string()]);

        let p = parse_line("EMPTY=", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().args, vec![String::new()]);
    }

    #[test]
    fn test_assignment_with_invalid_name() {
        let mut ctx = VarsOnly::default();
        let err = parse_line("1X=5", &mut ctx).unwrap_err();
        assert!(matches!(err, ParseError::InvalidVariableName(ref n) if n == "1X"));

        // any `=` makes the line an assignment
        assert!(matches!(
            parse_line("echo a=b", &mut ctx),
            Err(ParseError::InvalidVariableName(_))
        ));
    }

    #[test]
    fn test_leading_equal_is_a_command() {
        let mut ctx = VarsOnly::default();
        let p = parse_line("=x", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().kind, CommandKind::External);
        assert_eq!(p.head().name, "=x");
    }

    #[test]
    fn test_substitution_runs_while_parsing() {
        let mut ctx = VarsOnly::default();
        let p = parse_line("echo $(echo a | wc) end", &mut ctx).unwrap().unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.head().args, vec!["out".to_string(), "end".to_string()]);
        assert_eq!(ctx.substituted, vec!["echo a | wc".to_string()]);
    }

    #[test]
    fn test_unclosed_substitution_is_an_error() {
        let mut ctx = VarsOnly::default();
        assert!(matches!(
            parse_line("echo $(pwd", &mut ctx),
            Err(ParseError::UnclosedSubstitution)
        ));
    }

    #[test]
    fn test_expanded_name_is_classified() {
        let mut ctx = VarsOnly::default();
        ctx.vars.insert("CMD".into(), "pwd".into());
        let p = parse_line("$CMD", &mut ctx).unwrap().unwrap();
        assert_eq!(p.head().kind, CommandKind::Builtin(Builtin::Pwd));
    }
}
