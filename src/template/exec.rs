//! Evaluation of parsed templates against a JSON context.

use super::parse::{Arg, Command, Node, Pipeline};
use super::TemplateSet;
use serde_json::Value;

/// Maximum nesting of `{{ template }}` invocations.
pub(crate) const MAX_DEPTH: usize = 64;

pub(crate) struct Exec<'a> {
    pub set: &'a TemplateSet,
    pub name: &'a str,
    pub root: &'a Value,
    pub depth: usize,
}

impl Exec<'_> {
    pub fn walk(&self, nodes: &[Node], dot: &Value, out: &mut String) -> Result<(), String> {
        for node in nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Output(p) => {
                    let value = self.eval(p, dot)?;
                    out.push_str(&to_text(&value));
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    if truthy(&self.eval(cond, dot)?) {
                        self.walk(then, dot, out)?;
                    } else {
                        self.walk(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    over,
                    body,
                    otherwise,
                } => {
                    let items: Vec<Value> = match self.eval(over, dot)? {
                        Value::Array(items) => items,
                        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
                        Value::Null => Vec::new(),
                        other => {
                            return Err(self.fail(format!("range can't iterate over {other}")))
                        }
                    };
                    if items.is_empty() {
                        self.walk(otherwise, dot, out)?;
                    }
                    for item in &items {
                        self.walk(body, item, out)?;
                    }
                }
                Node::Template { name, arg } => {
                    let next_dot = match arg {
                        Some(p) => self.eval(p, dot)?,
                        None => dot.clone(),
                    };
                    out.push_str(&self.invoke(name, &next_dot)?);
                }
            }
        }
        Ok(())
    }

    fn invoke(&self, name: &str, dot: &Value) -> Result<String, String> {
        if self.depth >= MAX_DEPTH {
            return Err(self.fail(format!(
                "exceeded maximum template depth ({MAX_DEPTH}) calling \"{name}\""
            )));
        }
        let Some(nodes) = self.set.get(name) else {
            return Err(self.fail(format!("no such template \"{name}\"")));
        };
        let child = Exec {
            set: self.set,
            name,
            root: self.root,
            depth: self.depth + 1,
        };
        let mut out = String::new();
        child.walk(nodes, dot, &mut out)?;
        Ok(out)
    }

    fn eval(&self, pipeline: &Pipeline, dot: &Value) -> Result<Value, String> {
        let mut piped: Option<Value> = None;
        for command in pipeline {
            let value = match command {
                Command::Value(arg) => {
                    if piped.is_some() {
                        return Err(self.fail("can't pipe into a non-function".to_string()));
                    }
                    self.arg(arg, dot)?
                }
                Command::Call { func, args } => {
                    let mut values = args
                        .iter()
                        .map(|a| self.arg(a, dot))
                        .collect::<Result<Vec<_>, _>>()?;
                    if let Some(prev) = piped.take() {
                        values.push(prev);
                    }
                    call(func, values).map_err(|e| self.fail(e))?
                }
            };
            piped = Some(value);
        }
        piped.ok_or_else(|| self.fail("empty pipeline".to_string()))
    }

    fn arg(&self, arg: &Arg, dot: &Value) -> Result<Value, String> {
        match arg {
            Arg::Dot(path) => self.lookup(dot, path, "."),
            Arg::Root(path) => self.lookup(self.root, path, "$."),
            Arg::Str(s) => Ok(Value::String(s.clone())),
            Arg::Int(n) => Ok(Value::from(*n)),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
        }
    }

    fn lookup(&self, start: &Value, path: &[String], prefix: &str) -> Result<Value, String> {
        let mut current = start;
        for (i, key) in path.iter().enumerate() {
            current = current.get(key.as_str()).ok_or_else(|| {
                self.fail(format!(
                    "field {prefix}{} not found",
                    path[..=i].join(".")
                ))
            })?;
        }
        Ok(current.clone())
    }

    fn fail(&self, msg: String) -> String {
        format!("template \"{}\": {msg}", self.name)
    }
}

fn call(func: &str, args: Vec<Value>) -> Result<Value, String> {
    match (func, args.as_slice()) {
        ("len", [v]) => match v {
            Value::Array(a) => Ok(Value::from(a.len())),
            Value::Object(m) => Ok(Value::from(m.len())),
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Null => Ok(Value::from(0)),
            other => Err(format!("len of {other}")),
        },
        ("eq", [a, b]) => Ok(Value::Bool(a == b)),
        ("ne", [a, b]) => Ok(Value::Bool(a != b)),
        ("not", [v]) => Ok(Value::Bool(!truthy(v))),
        ("toUpper", [v]) => Ok(Value::String(to_text(v).to_uppercase())),
        ("toLower", [v]) => Ok(Value::String(to_text(v).to_lowercase())),
        ("title", [v]) => Ok(Value::String(title_case(&to_text(v)))),
        ("join", [sep, Value::Array(items)]) => Ok(Value::String(
            items
                .iter()
                .map(to_text)
                .collect::<Vec<_>>()
                .join(&to_text(sep)),
        )),
        ("join", [sep, Value::Object(map)]) => Ok(Value::String(
            map.values().map(to_text).collect::<Vec<_>>().join(&to_text(sep)),
        )),
        (func, args) => Err(format!(
            "wrong arguments for {func}: got {} value(s)",
            args.len()
        )),
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace() || c == '-' || c == '_';
    }
    out
}

/// Go-like truthiness: zero values are false.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

pub(crate) fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
