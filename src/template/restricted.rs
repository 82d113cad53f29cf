// ABOUTME: Restricted template dialect for untrusted authors: lookups and partial calls only
// ABOUTME: Compiles ${a.b[0]} paths and ${partial('name', {...})} calls into substitution segments

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::error::{Result, TemplateError};
use super::expr::{tokenize, Token};
use super::renderer::{validate_bindings, CompileOptions, CompiledRenderer, PartialInvoker, TemplateDialect};
use super::scanner::{scan, Segment};
use super::value::{Builtin, Locals, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct RestrictedDialect;

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    root: String,
    steps: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq)]
enum Argument {
    Literal(Value),
    Lookup(Path),
}

#[derive(Debug, Clone, PartialEq)]
enum LocalsArg {
    Fields(Vec<(String, Argument)>),
    // `partial('x', SELF)` passes an existing object through
    Lookup(Path),
}

#[derive(Debug, Clone, PartialEq)]
enum SafeSegment {
    Literal(String),
    Lookup(Path),
    Partial {
        exec_fn: String,
        name: String,
        locals: LocalsArg,
    },
}

#[derive(Debug)]
pub struct RestrictedTemplate {
    segments: Vec<SafeSegment>,
}

impl TemplateDialect for RestrictedDialect {
    fn name(&self) -> &'static str {
        "restricted"
    }

    fn compile(
        &self,
        template: &str,
        local_names: &[String],
        options: &CompileOptions<'_>,
    ) -> Result<Arc<dyn CompiledRenderer>> {
        validate_bindings(local_names, options.context_name)?;

        let segments = scan(template)?
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(text) => Ok(SafeSegment::Literal(text)),
                Segment::Expression { source, .. } => {
                    SafeParser::new(&source, local_names, options)?.parse()
                }
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Compiled restricted template ({} segments, {} locals)",
            segments.len(),
            local_names.len()
        );
        Ok(Arc::new(RestrictedTemplate { segments }))
    }
}

struct SafeParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    local_names: &'a [String],
    options: &'a CompileOptions<'a>,
}

impl<'a> SafeParser<'a> {
    fn new(
        source: &'a str,
        local_names: &'a [String],
        options: &'a CompileOptions<'a>,
    ) -> Result<Self> {
        let tokens = tokenize(source).map_err(|message| TemplateError::SyntaxError {
            expression: source.to_string(),
            message,
        })?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            local_names,
            options,
        })
    }

    fn disallowed(&self, reason: impl Into<String>) -> TemplateError {
        TemplateError::Disallowed {
            expression: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.disallowed(format!("expected '{}' but found {}", punct, self.peek())))
        }
    }

    fn check_bound(&self, name: &str) -> Result<()> {
        if name == self.options.context_name || self.local_names.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(TemplateError::UnknownIdentifier {
                name: name.to_string(),
            })
        }
    }

    fn parse(mut self) -> Result<SafeSegment> {
        let root = match self.advance() {
            Token::Ident(name) => name,
            other => {
                return Err(self.disallowed(format!(
                    "only identifier paths and {}() calls are allowed, found {}",
                    self.options.exec_fn_name, other
                )))
            }
        };

        let segment = if self.eat("(") {
            if root != self.options.exec_fn_name {
                return Err(self.disallowed(format!(
                    "only {}() may be called",
                    self.options.exec_fn_name
                )));
            }
            self.check_bound(&root)?;
            self.parse_partial_call(root)?
        } else {
            self.check_bound(&root)?;
            SafeSegment::Lookup(self.parse_path_steps(root)?)
        };

        match self.peek() {
            Token::Eof => Ok(segment),
            other => Err(self.disallowed(format!("unexpected {}", other))),
        }
    }

    fn parse_path_steps(&mut self, root: String) -> Result<Path> {
        let mut steps = Vec::new();
        loop {
            if self.eat(".") {
                match self.advance() {
                    Token::Ident(key) => steps.push(PathStep::Key(key)),
                    other => return Err(self.disallowed(format!("expected property name, found {}", other))),
                }
            } else if self.eat("[") {
                match self.advance() {
                    Token::Str(key) => steps.push(PathStep::Key(key)),
                    Token::Number(n) if n >= 0.0 && n.fract() == 0.0 => {
                        steps.push(PathStep::Index(n as usize))
                    }
                    other => {
                        return Err(self.disallowed(format!(
                            "index must be a string or non-negative integer literal, found {}",
                            other
                        )))
                    }
                }
                self.expect("]")?;
            } else {
                return Ok(Path { root, steps });
            }
        }
    }

    fn parse_partial_call(&mut self, exec_fn: String) -> Result<SafeSegment> {
        let name = match self.advance() {
            Token::Str(name) => name,
            other => return Err(self.disallowed(format!("partial name must be a string literal, found {}", other))),
        };

        let mut fields = Vec::new();
        if self.eat(",") && !matches!(self.peek(), Token::Punct(")")) {
            if let Token::Ident(root) = self.peek().clone() {
                self.pos += 1;
                let locals = if root == "null" || root == "undefined" {
                    LocalsArg::Fields(Vec::new())
                } else {
                    self.check_bound(&root)?;
                    LocalsArg::Lookup(self.parse_path_steps(root)?)
                };
                self.eat(",");
                self.expect(")")?;
                return Ok(SafeSegment::Partial {
                    exec_fn,
                    name,
                    locals,
                });
            }
            self.expect("{")?;
            while !self.eat("}") {
                let key = match self.advance() {
                    Token::Ident(key) | Token::Str(key) => key,
                    other => return Err(self.disallowed(format!("expected locals key, found {}", other))),
                };
                self.expect(":")?;
                let value = self.parse_argument()?;
                fields.push((key, value));
                if !self.eat(",") {
                    self.expect("}")?;
                    break;
                }
            }
            self.eat(",");
        }
        self.expect(")")?;

        Ok(SafeSegment::Partial {
            exec_fn,
            name,
            locals: LocalsArg::Fields(fields),
        })
    }

    fn parse_argument(&mut self) -> Result<Argument> {
        match self.advance() {
            Token::Str(s) => Ok(Argument::Literal(Value::String(s))),
            Token::Number(n) => Ok(Argument::Literal(Value::Number(n))),
            Token::Punct("-") => match self.advance() {
                Token::Number(n) => Ok(Argument::Literal(Value::Number(-n))),
                other => Err(self.disallowed(format!("expected number after '-', found {}", other))),
            },
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Argument::Literal(Value::Bool(true))),
                "false" => Ok(Argument::Literal(Value::Bool(false))),
                "null" => Ok(Argument::Literal(Value::Null)),
                _ => {
                    self.check_bound(&name)?;
                    Ok(Argument::Lookup(self.parse_path_steps(name)?))
                }
            },
            other => Err(self.disallowed(format!(
                "locals values must be literals or identifier paths, found {}",
                other
            ))),
        }
    }
}

fn resolve(path: &Path, scope: &Locals) -> Value {
    let mut current = scope.get(&path.root).cloned().unwrap_or_default();
    for step in &path.steps {
        current = match step {
            PathStep::Key(key) => current.get_member(key),
            PathStep::Index(i) => current.get_index(&Value::Number(*i as f64)),
        }
        .unwrap_or_default();
    }
    current
}

#[async_trait]
impl CompiledRenderer for RestrictedTemplate {
    async fn render(&self, scope: &Locals, invoker: &dyn PartialInvoker) -> Result<String> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                SafeSegment::Literal(text) => out.push_str(text),
                SafeSegment::Lookup(path) => out.push_str(&resolve(path, scope).to_text()),
                SafeSegment::Partial {
                    exec_fn,
                    name,
                    locals,
                } => {
                    if scope.get(exec_fn) != Some(&Value::Builtin(Builtin::Partial)) {
                        return Err(TemplateError::render(format!(
                            "{} is not bound to the partial function",
                            exec_fn
                        )));
                    }
                    let locals = match locals {
                        LocalsArg::Fields(fields) => fields
                            .iter()
                            .map(|(key, arg)| {
                                let value = match arg {
                                    Argument::Literal(value) => value.clone(),
                                    Argument::Lookup(path) => resolve(path, scope),
                                };
                                (key.clone(), value)
                            })
                            .collect(),
                        LocalsArg::Lookup(path) => match resolve(path, scope) {
                            Value::Object(map) => map,
                            Value::Undefined | Value::Null => Locals::new(),
                            other => {
                                return Err(TemplateError::render(format!(
                                    "{}('{}') locals must be an object, found {}",
                                    exec_fn,
                                    name,
                                    other.type_name()
                                )))
                            }
                        },
                    };
                    out.push_str(&invoker.invoke(name, locals).await?);
                }
            }
        }

        Ok(out)
    }

    fn has_expressions(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, SafeSegment::Literal(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::renderer::NoPartials;
    use serde_json::json;

    const OPTIONS: CompileOptions<'static> = CompileOptions {
        context_name: "ctx",
        exec_fn_name: "partial",
    };

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct EchoPartials;

    #[async_trait]
    impl PartialInvoker for EchoPartials {
        async fn invoke(&self, name: &str, locals: Locals) -> Result<String> {
            Ok(format!("<{}:{}>", name, Value::locals_to_json(&locals)))
        }
    }

    #[tokio::test]
    async fn test_lookup_paths() {
        let renderer = RestrictedDialect
            .compile("${ctx.app} ${user.tags[1]} ${user['name']}", &names(&["user"]), &OPTIONS)
            .unwrap();

        let mut scope = Locals::new();
        scope.insert("ctx".to_string(), Value::from_json(json!({"app": "Spry"})));
        scope.insert(
            "user".to_string(),
            Value::from_json(json!({"name": "Zoya", "tags": ["a", "b"]})),
        );

        let out = renderer.render(&scope, &NoPartials).await.unwrap();
        assert_eq!(out, "Spry b Zoya");
    }

    #[tokio::test]
    async fn test_partial_call_with_locals() {
        let renderer = RestrictedDialect
            .compile(
                "${partial('footer', {text: 'hi', n: -2, who: user.name,})}",
                &names(&["partial", "user"]),
                &OPTIONS,
            )
            .unwrap();

        let mut scope = Locals::new();
        scope.insert("partial".to_string(), Value::Builtin(Builtin::Partial));
        scope.insert("user".to_string(), Value::from_json(json!({"name": "Zoya"})));

        let out = renderer.render(&scope, &EchoPartials).await.unwrap();
        assert_eq!(out, r#"<footer:{"text":"hi","n":-2,"who":"Zoya"}>"#);
    }

    #[tokio::test]
    async fn test_partial_call_with_locals_path() {
        let renderer = RestrictedDialect
            .compile(
                "${partial('footer', SELF)}|${partial('footer', SELF.inner)}",
                &names(&["partial", "SELF"]),
                &OPTIONS,
            )
            .unwrap();

        let mut scope = Locals::new();
        scope.insert("partial".to_string(), Value::Builtin(Builtin::Partial));
        scope.insert(
            "SELF".to_string(),
            Value::from_json(json!({"text": "hi", "inner": {"n": 1}})),
        );

        let out = renderer.render(&scope, &EchoPartials).await.unwrap();
        assert_eq!(out, r#"<footer:{"text":"hi","inner":{"n":1}}>|<footer:{"n":1}>"#);

        scope.insert("SELF".to_string(), Value::from("flat"));
        let err = renderer.render(&scope, &EchoPartials).await.unwrap_err();
        assert!(err.to_string().contains("locals must be an object"));
    }

    #[test]
    fn test_locals_path_must_be_bound() {
        let err = RestrictedDialect
            .compile("${partial('x', other)}", &names(&["partial"]), &OPTIONS)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_rejects_everything_else() {
        let locals = names(&["a", "partial"]);
        for template in ["${a + 1}", "${a.b()}", "${`x`}", "${a[b]}", "${partial(a)}", "${!a}"] {
            let err = RestrictedDialect.compile(template, &locals, &OPTIONS).unwrap_err();
            assert!(
                matches!(err, TemplateError::Disallowed { .. }),
                "expected {} to be disallowed, got {:?}",
                template,
                err
            );
        }
    }

    #[test]
    fn test_rejects_unbound_roots() {
        let err = RestrictedDialect
            .compile("${secret.value}", &names(&["a"]), &OPTIONS)
            .unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownIdentifier {
                name: "secret".to_string()
            }
        );
    }
}
