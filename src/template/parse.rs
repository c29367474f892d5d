//! Lexer and parser for the template language.
//!
//! Sources are split into literal text and `{{ ... }}` actions, then folded
//! into a tree of [`Node`]s. `define` blocks are hoisted out into named
//! definitions; whatever remains at the top level is the source's own body.

use regex::Regex;

/// Functions callable from an action. Checked at parse time.
pub(crate) const FUNCTIONS: &[&str] = &[
    "len", "eq", "ne", "not", "toUpper", "toLower", "title", "join",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    /// `.A.B`, relative to the current context. Empty path is `.` itself.
    Dot(Vec<String>),
    /// `$.A.B`, relative to the value the top-level render started with.
    Root(Vec<String>),
    Str(String),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Value(Arg),
    Call { func: String, args: Vec<Arg> },
}

/// Commands joined by `|`. Each command's result is appended as the last
/// argument of the next one.
pub(crate) type Pipeline = Vec<Command>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(Pipeline),
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Range {
        over: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Template {
        name: String,
        arg: Option<Pipeline>,
    },
}

/// Result of parsing one source.
#[derive(Debug, Default)]
pub(crate) struct Parsed {
    pub root: Vec<Node>,
    pub defines: Vec<(String, Vec<Node>)>,
}

impl Parsed {
    /// True when the top level holds more than whitespace.
    pub fn has_body(&self) -> bool {
        self.root.iter().any(|n| match n {
            Node::Text(t) => !t.trim().is_empty(),
            _ => true,
        })
    }
}

pub(crate) fn parse(src: &str) -> Result<Parsed, String> {
    let segments = lex(src)?;
    let mut parser = Parser {
        segments: segments.into_iter(),
        defines: Vec::new(),
    };
    let (root, end) = parser.parse_list(true)?;
    match end {
        Terminator::Eof => Ok(Parsed {
            root,
            defines: parser.defines,
        }),
        Terminator::End => Err("unexpected {{end}}".to_string()),
        Terminator::Else => Err("unexpected {{else}}".to_string()),
    }
}

// -----------------------------------------------------------------------------
// Lexing
// -----------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Segment {
    Text(String),
    Action(String),
}

fn lex(src: &str) -> Result<Vec<Segment>, String> {
    let delims = Regex::new(r"(?s)\{\{(-\s+)?(.*?)(\s+-)?\}\}").map_err(|e| e.to_string())?;

    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut trim_next = false;

    for caps in delims.captures_iter(src) {
        let Some(whole) = caps.get(0) else { continue };
        let mut text = &src[cursor..whole.start()];
        if trim_next {
            text = text.trim_start();
        }
        if caps.get(1).is_some() {
            text = text.trim_end();
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        if !(body.starts_with("/*") && body.ends_with("*/")) {
            segments.push(Segment::Action(body.to_string()));
        }

        trim_next = caps.get(3).is_some();
        cursor = whole.end();
    }

    let mut rest = &src[cursor..];
    if trim_next {
        rest = rest.trim_start();
    }
    if rest.contains("{{") {
        return Err("unclosed action".to_string());
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Vec<String>),
    Var(Vec<String>),
    Str(String),
    Int(i64),
    Ident(String),
    Pipe,
}

fn tokenize(action: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = action.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '|' {
            chars.next();
            tokens.push(Token::Pipe);
        } else if c == '"' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some(other) => s.push(other),
                        None => break,
                    },
                    other => s.push(other),
                }
            }
            if !closed {
                return Err(format!("unterminated string in {{{{{action}}}}}"));
            }
            tokens.push(Token::Str(s));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '|' || c == '"' {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(word_token(&word)?);
        }
    }
    Ok(tokens)
}

fn word_token(word: &str) -> Result<Token, String> {
    if let Some(path) = word.strip_prefix('$') {
        return Ok(Token::Var(field_path(path, word)?));
    }
    if word.starts_with('.') {
        return Ok(Token::Field(field_path(word, word)?));
    }
    if let Ok(n) = word.parse::<i64>() {
        return Ok(Token::Int(n));
    }
    if word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Ok(Token::Ident(word.to_string()));
    }
    Err(format!("unexpected token '{word}'"))
}

/// Splits `.A.B` into `["A", "B"]`. `.` and the empty string yield an empty path.
fn field_path(path: &str, original: &str) -> Result<Vec<String>, String> {
    if path.is_empty() || path == "." {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('.') else {
        return Err(format!("bad field reference '{original}'"));
    };
    let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(format!("bad field reference '{original}'"));
    }
    Ok(segments)
}

fn parse_pipeline(tokens: Vec<Token>) -> Result<Pipeline, String> {
    let mut pipeline = Vec::new();
    for group in tokens.split(|t| *t == Token::Pipe) {
        pipeline.push(parse_command(group)?);
    }
    Ok(pipeline)
}

fn parse_command(tokens: &[Token]) -> Result<Command, String> {
    match tokens {
        [] => Err("empty command in pipeline".to_string()),
        [Token::Ident(name), args @ ..] if name != "true" && name != "false" => {
            if !FUNCTIONS.contains(&name.as_str()) {
                return Err(format!("function \"{name}\" not defined"));
            }
            let args = args.iter().map(to_arg).collect::<Result<_, _>>()?;
            Ok(Command::Call {
                func: name.clone(),
                args,
            })
        }
        [single] => Ok(Command::Value(to_arg(single)?)),
        _ => Err("a value cannot take arguments".to_string()),
    }
}

fn to_arg(token: &Token) -> Result<Arg, String> {
    match token {
        Token::Field(p) => Ok(Arg::Dot(p.clone())),
        Token::Var(p) => Ok(Arg::Root(p.clone())),
        Token::Str(s) => Ok(Arg::Str(s.clone())),
        Token::Int(n) => Ok(Arg::Int(*n)),
        Token::Ident(b) if b == "true" => Ok(Arg::Bool(true)),
        Token::Ident(b) if b == "false" => Ok(Arg::Bool(false)),
        Token::Ident(name) => Err(format!("function \"{name}\" used as an argument")),
        Token::Pipe => Err("unexpected '|'".to_string()),
    }
}

// -----------------------------------------------------------------------------
// Parsing
// -----------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Terminator {
    End,
    Else,
    Eof,
}

struct Parser {
    segments: std::vec::IntoIter<Segment>,
    defines: Vec<(String, Vec<Node>)>,
}

impl Parser {
    fn parse_list(&mut self, top: bool) -> Result<(Vec<Node>, Terminator), String> {
        let mut nodes = Vec::new();

        while let Some(segment) = self.segments.next() {
            let action = match segment {
                Segment::Text(t) => {
                    nodes.push(Node::Text(t));
                    continue;
                }
                Segment::Action(a) => a,
            };

            let (keyword, rest) = match action.split_once(char::is_whitespace) {
                Some((k, r)) => (k, r.trim()),
                None => (action.as_str(), ""),
            };

            match keyword {
                "end" => {
                    if !rest.is_empty() {
                        return Err("{{end}} takes no arguments".to_string());
                    }
                    return Ok((nodes, Terminator::End));
                }
                "else" => {
                    if !rest.is_empty() {
                        return Err("{{else}} takes no arguments".to_string());
                    }
                    return Ok((nodes, Terminator::Else));
                }
                "if" | "range" => {
                    let pipeline = parse_pipeline(tokenize(rest)?)?;
                    let (body, end) = self.parse_list(false)?;
                    let otherwise = match end {
                        Terminator::End => Vec::new(),
                        Terminator::Else => {
                            let (otherwise, end) = self.parse_list(false)?;
                            if end != Terminator::End {
                                return Err(format!("unclosed {{{{{keyword}}}}}"));
                            }
                            otherwise
                        }
                        Terminator::Eof => return Err(format!("unclosed {{{{{keyword}}}}}")),
                    };
                    nodes.push(if keyword == "if" {
                        Node::If {
                            cond: pipeline,
                            then: body,
                            otherwise,
                        }
                    } else {
                        Node::Range {
                            over: pipeline,
                            body,
                            otherwise,
                        }
                    });
                }
                "template" => {
                    let mut tokens = tokenize(rest)?;
                    if tokens.is_empty() {
                        return Err("{{template}} needs a name".to_string());
                    }
                    let Token::Str(name) = tokens.remove(0) else {
                        return Err("{{template}} name must be a quoted string".to_string());
                    };
                    let arg = if tokens.is_empty() {
                        None
                    } else {
                        Some(parse_pipeline(tokens)?)
                    };
                    nodes.push(Node::Template { name, arg });
                }
                "define" => {
                    if !top {
                        return Err("{{define}} is only allowed at the top level".to_string());
                    }
                    let name = match tokenize(rest)?.as_slice() {
                        [Token::Str(name)] => name.clone(),
                        _ => return Err("{{define}} needs a single quoted name".to_string()),
                    };
                    let (body, end) = self.parse_list(false)?;
                    if end != Terminator::End {
                        return Err(format!("unclosed {{{{define \"{name}\"}}}}"));
                    }
                    self.defines.push((name, body));
                }
                _ => nodes.push(Node::Output(parse_pipeline(tokenize(&action)?)?)),
            }
        }

        Ok((nodes, Terminator::Eof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_trims_whitespace_markers() {
        let segments = lex("a  {{- .X -}}  b").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("a".into()),
                Segment::Action(".X".into()),
                Segment::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_lex_drops_comments() {
        let segments = lex("x{{/* note */}}y").unwrap();
        assert_eq!(
            segments,
            vec![Segment::Text("x".into()), Segment::Text("y".into())]
        );
    }

    #[test]
    fn test_tokenize_pipeline() {
        let tokens = tokenize(r#".Alerts | len"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Field(vec!["Alerts".into()]),
                Token::Pipe,
                Token::Ident("len".into()),
            ]
        );
        let tokens = tokenize(r#"join ", " $.CommonLabels"#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("join".into()),
                Token::Str(", ".into()),
                Token::Var(vec!["CommonLabels".into()]),
            ]
        );
    }

    #[test]
    fn test_parse_define_and_root() {
        let parsed = parse(r#"{{ define "a" }}A{{ end }}body {{ template "a" . }}"#).unwrap();
        assert_eq!(parsed.defines.len(), 1);
        assert_eq!(parsed.defines[0].0, "a");
        assert!(parsed.has_body());
    }

    #[test]
    fn test_parse_if_else() {
        let parsed = parse("{{ if .X }}yes{{ else }}no{{ end }}").unwrap();
        match &parsed.root[0] {
            Node::If { then, otherwise, .. } => {
                assert_eq!(then, &vec![Node::Text("yes".into())]);
                assert_eq!(otherwise, &vec![Node::Text("no".into())]);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("{{ if .X }}open").unwrap_err().contains("unclosed"));
        assert!(parse("{{ end }}").is_err());
        assert!(parse("{{ nope .X }}").unwrap_err().contains("not defined"));
        assert!(parse("{{ .X").unwrap_err().contains("unclosed action"));
        assert!(parse(r#"{{ if .X }}{{ define "a" }}{{ end }}{{ end }}"#).is_err());
        assert!(parse("{{ .A..B }}").is_err());
    }
}
