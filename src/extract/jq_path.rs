//! The path subset of jq accepted in `jqPathExpressions`
//!
//! An expression is a `|`-separated list of stages. A stage is either a path
//! (`.a.b`, `."a/b"`, `.["key"]`, `[N]` with negative N counting from the end,
//! `[]` over every element) or a filter `select(<path> == <literal>)` /
//! `select(<path> != <literal>)`. Evaluation yields the concrete locations the
//! expression selects, mirroring jq's `path(...)`.

use serde_yaml::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid jq path expression '{expression}': {reason}")]
pub struct JqPathError {
    pub expression: String,
    pub reason: String,
}

/// One step of a resolved location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(i64),
    Each,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Path(Vec<Step>),
    Select { path: Vec<Step>, equal: bool, literal: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JqPath {
    stages: Vec<Stage>,
}

impl JqPath {
    pub fn parse(expression: &str) -> Result<Self, JqPathError> {
        let fail = |reason: &str| JqPathError { expression: expression.to_string(), reason: reason.to_string() };
        if expression.trim().is_empty() {
            return Err(fail("empty expression"));
        }

        let mut stages = Vec::new();
        for stage in split_top_level(expression, '|') {
            let stage = stage.trim();
            if let Some(inner) = stage.strip_prefix("select(").and_then(|s| s.strip_suffix(')')) {
                let (lhs, rhs, equal) = if let Some((l, r)) = inner.split_once("==") {
                    (l, r, true)
                } else if let Some((l, r)) = inner.split_once("!=") {
                    (l, r, false)
                } else {
                    return Err(fail("select needs an == or != comparison"));
                };
                let path = parse_steps(lhs.trim()).map_err(|r| fail(r.as_str()))?;
                let literal: Value = serde_yaml::from_str(rhs.trim()).map_err(|_| fail("unreadable literal"))?;
                stages.push(Stage::Select { path, equal, literal });
            } else {
                stages.push(Stage::Path(parse_steps(stage).map_err(|r| fail(r.as_str()))?));
            }
        }
        Ok(Self { stages })
    }

    /// Every location in `root` the expression selects. Locations whose
    /// parent does not exist are left out.
    pub fn locations(&self, root: &Value) -> Vec<Vec<PathToken>> {
        let mut current = vec![Vec::new()];
        for stage in &self.stages {
            current = match stage {
                Stage::Path(steps) => current
                    .into_iter()
                    .flat_map(|base| {
                        let node = resolve(root, &base);
                        expand(node, base, steps)
                    })
                    .collect(),
                Stage::Select { path, equal, literal } => current
                    .into_iter()
                    .filter(|base| {
                        let Some(node) = resolve(root, base) else {
                            return false;
                        };
                        let found = expand(Some(node), Vec::new(), path)
                            .iter()
                            .any(|rel| resolve(node, rel) == Some(literal));
                        found == *equal
                    })
                    .collect(),
            };
        }
        current.retain(|location| !location.is_empty());
        current
    }
}

fn split_top_level(expression: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '(' | '[' if !in_string => depth += 1,
            ')' | ']' if !in_string => depth -= 1,
            c if c == separator && depth == 0 && !in_string => {
                parts.push(&expression[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<String, String> {
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => return Err("unterminated string".to_string()),
            },
            Some(c) => out.push(c),
            None => return Err("unterminated string".to_string()),
        }
    }
}

fn parse_steps(input: &str) -> Result<Vec<Step>, String> {
    if !input.starts_with('.') {
        return Err(format!("path must start with '.', got '{input}'"));
    }
    let mut steps = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => match chars.peek() {
                Some('"') => {
                    chars.next();
                    steps.push(Step::Key(read_quoted(&mut chars)?));
                }
                Some(c) if c.is_alphanumeric() || *c == '_' => {
                    let mut key = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_alphanumeric() || c == '_' || c == '-' {
                            key.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    steps.push(Step::Key(key));
                }
                Some('[') | None => {}
                Some(other) => return Err(format!("unexpected '{other}' after '.'")),
            },
            '[' => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    steps.push(Step::Key(read_quoted(&mut chars)?));
                } else {
                    let mut index = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == ']' {
                            break;
                        }
                        index.push(c);
                        chars.next();
                    }
                    let index = index.trim();
                    if index.is_empty() {
                        steps.push(Step::Each);
                    } else {
                        let n = index.parse::<i64>().map_err(|_| format!("unsupported index '{index}'"))?;
                        steps.push(Step::Index(n));
                    }
                }
                if chars.next() != Some(']') {
                    return Err("missing ']'".to_string());
                }
            }
            c if c.is_whitespace() => {}
            other => return Err(format!("unsupported character '{other}'")),
        }
    }
    Ok(steps)
}

fn resolve<'a>(root: &'a Value, location: &[PathToken]) -> Option<&'a Value> {
    location.iter().try_fold(root, |node, token| match (node, token) {
        (Value::Mapping(m), PathToken::Key(k)) => m.get(k.as_str()),
        (Value::Sequence(s), PathToken::Index(i)) => s.get(*i),
        _ => None,
    })
}

fn expand(node: Option<&Value>, base: Vec<PathToken>, steps: &[Step]) -> Vec<Vec<PathToken>> {
    let Some((step, rest)) = steps.split_first() else {
        return vec![base];
    };
    let Some(node) = node else {
        return Vec::new();
    };

    let mut children: Vec<(PathToken, &Value)> = Vec::new();
    match (step, node) {
        (Step::Key(key), Value::Mapping(m)) => {
            if let Some(child) = m.get(key.as_str()) {
                children.push((PathToken::Key(key.clone()), child));
            }
        }
        (Step::Index(i), Value::Sequence(s)) => {
            let index = if *i < 0 { s.len() as i64 + i } else { *i };
            if let Some(child) = usize::try_from(index).ok().and_then(|idx| s.get(idx).map(|c| (idx, c))) {
                children.push((PathToken::Index(child.0), child.1));
            }
        }
        (Step::Each, Value::Sequence(s)) => {
            children.extend(s.iter().enumerate().map(|(i, c)| (PathToken::Index(i), c)));
        }
        (Step::Each, Value::Mapping(m)) => {
            children.extend(m.iter().filter_map(|(k, c)| k.as_str().map(|k| (PathToken::Key(k.to_string()), c))));
        }
        _ => {}
    }

    children
        .into_iter()
        .flat_map(|(token, child)| {
            let mut location = base.clone();
            location.push(token);
            expand(Some(child), location, rest)
        })
        .collect()
}
