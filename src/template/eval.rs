// ABOUTME: Async evaluator for trusted template expressions over structured data
// ABOUTME: Calls are limited to engine builtins and a whitelist of string, array and capture methods

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use super::error::{Result, TemplateError};
use super::expr::{BinaryOp, Expr, TemplatePart, UnaryOp};
use super::renderer::PartialInvoker;
use super::value::{Builtin, Locals, Value};

// Upper bound for `repeat` counts and `padStart`/`padEnd` target lengths.
const MAX_GENERATED: f64 = 10_000.0;

pub(crate) struct Evaluator<'a> {
    scope: &'a Locals,
    invoker: &'a dyn PartialInvoker,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(scope: &'a Locals, invoker: &'a dyn PartialInvoker) -> Self {
        Self { scope, invoker }
    }

    pub(crate) fn eval<'s>(&'s self, expr: &'s Expr) -> BoxFuture<'s, Result<Value>> {
        async move {
            match expr {
                Expr::Literal(value) => Ok(value.clone()),
                Expr::Template(parts) => {
                    let mut out = String::new();
                    for part in parts {
                        match part {
                            TemplatePart::Text(text) => out.push_str(text),
                            TemplatePart::Expr(inner) => out.push_str(&self.eval(inner).await?.to_text()),
                        }
                    }
                    Ok(Value::String(out))
                }
                Expr::Ident(name) => self
                    .scope
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TemplateError::render(format!("{} is not defined", name))),
                Expr::Array(items) => Ok(Value::Array(self.eval_all(items).await?)),
                Expr::Object(entries) => {
                    let mut map = Locals::new();
                    for (key, value) in entries {
                        map.insert(key.clone(), self.eval(value).await?);
                    }
                    Ok(Value::Object(map))
                }
                Expr::Member {
                    object,
                    property,
                    optional,
                } => {
                    let receiver = self.eval(object).await?;
                    if *optional && receiver.is_nullish() {
                        return Ok(Value::Undefined);
                    }
                    receiver
                        .get_member(property)
                        .ok_or_else(|| cannot_read(&receiver, property))
                }
                Expr::Index {
                    object,
                    index,
                    optional,
                } => {
                    let receiver = self.eval(object).await?;
                    if *optional && receiver.is_nullish() {
                        return Ok(Value::Undefined);
                    }
                    let key = self.eval(index).await?;
                    receiver
                        .get_index(&key)
                        .ok_or_else(|| cannot_read(&receiver, &key.to_text()))
                }
                Expr::Call { callee, args } => self.call(callee, args).await,
                Expr::Unary { op, operand } => {
                    let value = self.eval(operand).await?;
                    Ok(match op {
                        UnaryOp::Not => Value::Bool(!value.is_truthy()),
                        UnaryOp::Neg => Value::Number(-value.to_number()),
                        UnaryOp::Plus => Value::Number(value.to_number()),
                    })
                }
                Expr::Binary { op, left, right } => {
                    let left = self.eval(left).await?;
                    let short_circuits = match op {
                        BinaryOp::And => !left.is_truthy(),
                        BinaryOp::Or => left.is_truthy(),
                        BinaryOp::Nullish => !left.is_nullish(),
                        _ => false,
                    };
                    if short_circuits {
                        return Ok(left);
                    }
                    let right = self.eval(right).await?;
                    Ok(apply_binary(*op, left, right))
                }
                Expr::Conditional {
                    test,
                    consequent,
                    alternate,
                } => {
                    if self.eval(test).await?.is_truthy() {
                        self.eval(consequent).await
                    } else {
                        self.eval(alternate).await
                    }
                }
            }
        }
        .boxed()
    }

    async fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval(expr).await?);
        }
        Ok(values)
    }

    async fn call(&self, callee: &Expr, args: &[Expr]) -> Result<Value> {
        if let Expr::Member {
            object,
            property,
            optional,
        } = callee
        {
            let receiver = self.eval(object).await?;
            if *optional && receiver.is_nullish() {
                return Ok(Value::Undefined);
            }
            if let Value::Object(map) = &receiver {
                match map.get(property) {
                    Some(Value::Builtin(builtin)) => {
                        let builtin = *builtin;
                        let args = self.eval_all(args).await?;
                        return self.call_builtin(builtin, args).await;
                    }
                    Some(other) => {
                        return Err(TemplateError::render(format!(
                            "{} is not a function (found {})",
                            describe(callee),
                            other.type_name()
                        )))
                    }
                    None => {}
                }
            }
            let args = self.eval_all(args).await?;
            return call_method(&receiver, property, &args);
        }

        match self.eval(callee).await? {
            Value::Builtin(builtin) => {
                let args = self.eval_all(args).await?;
                self.call_builtin(builtin, args).await
            }
            other => Err(TemplateError::render(format!(
                "{} is not a function (found {})",
                describe(callee),
                other.type_name()
            ))),
        }
    }

    async fn call_builtin(&self, builtin: Builtin, args: Vec<Value>) -> Result<Value> {
        match builtin {
            Builtin::Partial => {
                let mut args = args.into_iter();
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(TemplateError::render(
                            "partial() requires a partial name as its first argument",
                        ))
                    }
                };
                let locals = match args.next() {
                    None | Some(Value::Undefined) | Some(Value::Null) => Locals::new(),
                    Some(Value::Object(map)) => map,
                    Some(other) => {
                        return Err(TemplateError::render(format!(
                            "partial('{}') locals must be an object, found {}",
                            name,
                            other.type_name()
                        )))
                    }
                };
                let text = self.invoker.invoke(&name, locals).await?;
                Ok(Value::String(text))
            }
            Builtin::Json => {
                let value = args.first().cloned().unwrap_or_default();
                let indent = args.get(1).map(Value::to_number).unwrap_or(0.0);
                stringify(&value, indent).map(Value::String)
            }
        }
    }
}

fn stringify(value: &Value, indent: f64) -> Result<String> {
    if *value == Value::Undefined {
        return Ok("undefined".to_string());
    }
    let json = value.to_json();
    if !(indent >= 1.0) {
        return serde_json::to_string(&json).map_err(|e| TemplateError::render(e.to_string()));
    }

    let spaces = " ".repeat(indent.min(10.0) as usize);
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(spaces.as_bytes()));
    json.serialize(&mut serializer)
        .map_err(|e| TemplateError::render(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TemplateError::render(e.to_string()))
}

fn cannot_read(receiver: &Value, property: &str) -> TemplateError {
    TemplateError::render(format!(
        "Cannot read properties of {} (reading '{}')",
        receiver.type_name(),
        property
    ))
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { property, .. } => property.clone(),
        _ => "expression".to_string(),
    }
}

fn arg_text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_text).unwrap_or_default()
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let value = match (receiver, method) {
        (Value::Captured(captured), "text") => Value::String(captured.text().to_string()),
        (Value::Captured(captured), "json") => captured
            .json()
            .map(Value::from_json)
            .map_err(|e| TemplateError::render(e.to_string()))?,
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        (Value::String(s), "trimStart") => Value::String(s.trim_start().to_string()),
        (Value::String(s), "trimEnd") => Value::String(s.trim_end().to_string()),
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "includes") => Value::Bool(s.contains(&arg_text(args, 0))),
        (Value::String(s), "startsWith") => Value::Bool(s.starts_with(&arg_text(args, 0))),
        (Value::String(s), "endsWith") => Value::Bool(s.ends_with(&arg_text(args, 0))),
        (Value::String(s), "replace") => {
            Value::String(s.replacen(&arg_text(args, 0), &arg_text(args, 1), 1))
        }
        (Value::String(s), "replaceAll") => {
            Value::String(s.replace(&arg_text(args, 0), &arg_text(args, 1)))
        }
        (Value::String(s), "split") => match args.first() {
            None | Some(Value::Undefined) => Value::Array(vec![Value::String(s.clone())]),
            Some(sep) => {
                let sep = sep.to_text();
                let parts: Vec<Value> = if sep.is_empty() {
                    s.chars().map(|c| Value::String(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(Value::from).collect()
                };
                Value::Array(parts)
            }
        },
        (Value::String(s), "padStart") => Value::String(pad(s, args, true)?),
        (Value::String(s), "padEnd") => Value::String(pad(s, args, false)?),
        (Value::String(s), "repeat") => {
            let count = args.first().map(Value::to_number).unwrap_or(0.0);
            if !(0.0..=MAX_GENERATED).contains(&count) {
                return Err(TemplateError::render(format!("Invalid repeat count {}", count)));
            }
            Value::String(s.repeat(count as usize))
        }
        (Value::Array(items), "join") => {
            let sep = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(sep) => sep.to_text(),
            };
            Value::String(items.iter().map(Value::to_text).collect::<Vec<_>>().join(&sep))
        }
        (Value::Array(items), "includes") => {
            let needle = args.first().cloned().unwrap_or_default();
            Value::Bool(items.iter().any(|item| item.strict_eq(&needle)))
        }
        (receiver, _) if receiver.is_nullish() => return Err(cannot_read(receiver, method)),
        (receiver, "toString") => Value::String(receiver.to_text()),
        (receiver, _) => {
            return Err(TemplateError::render(format!(
                "{}.{}() is not an allowed call",
                receiver.type_name(),
                method
            )))
        }
    };
    Ok(value)
}

fn pad(s: &str, args: &[Value], at_start: bool) -> Result<String> {
    let target = args.first().map(Value::to_number).unwrap_or(0.0);
    if target > MAX_GENERATED {
        return Err(TemplateError::render(format!("Invalid pad length {}", target)));
    }
    let fill = match args.get(1) {
        None | Some(Value::Undefined) => " ".to_string(),
        Some(fill) => fill.to_text(),
    };
    let current = s.chars().count();
    if fill.is_empty() || !(target > current as f64) {
        return Ok(s.to_string());
    }

    let padding: String = fill.chars().cycle().take(target as usize - current).collect();
    if at_start {
        Ok(format!("{}{}", padding, s))
    } else {
        Ok(format!("{}{}", s, padding))
    }
}

fn is_textual(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Captured(_)
    )
}

fn apply_binary(op: BinaryOp, left: Value, right: Value) -> Value {
    match op {
        BinaryOp::Add if is_textual(&left) || is_textual(&right) => {
            Value::String(format!("{}{}", left.to_text(), right.to_text()))
        }
        BinaryOp::Add => Value::Number(left.to_number() + right.to_number()),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o.is_lt(),
                (BinaryOp::Le, Some(o)) => o.is_le(),
                (BinaryOp::Gt, Some(o)) => o.is_gt(),
                (_, Some(o)) => o.is_ge(),
            })
        }
        BinaryOp::Eq => Value::Bool(left.loose_eq(&right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(&right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(&right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_eq(&right)),
        // Short-circuiting already happened in the evaluator
        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Captured;
    use crate::template::expr::parse_expression;
    use crate::template::renderer::NoPartials;
    use serde_json::json;

    async fn eval_with(source: &str, scope: &Locals) -> Result<Value> {
        let expr = parse_expression(source).unwrap();
        let invoker = NoPartials;
        let evaluator = Evaluator::new(scope, &invoker);
        evaluator.eval(&expr).await
    }

    fn scope() -> Locals {
        let mut scope = Locals::new();
        scope.insert(
            "ctx".to_string(),
            Value::from_json(json!({"app": "Spry", "n": 4, "tags": ["a", "b"]})),
        );
        scope.insert("name".to_string(), Value::from("zoya"));
        scope.insert("json".to_string(), Value::Builtin(Builtin::Json));
        scope
    }

    #[tokio::test]
    async fn test_arithmetic_and_concatenation() {
        let scope = scope();
        assert_eq!(eval_with("ctx.n * 2 + 1", &scope).await.unwrap(), Value::Number(9.0));
        assert_eq!(
            eval_with("ctx.app + '@' + ctx.n", &scope).await.unwrap(),
            Value::from("Spry@4")
        );
        assert_eq!(eval_with("7 % 4", &scope).await.unwrap(), Value::Number(3.0));
    }

    #[tokio::test]
    async fn test_logical_and_conditional() {
        let scope = scope();
        assert_eq!(
            eval_with("ctx.missing ?? 'fallback'", &scope).await.unwrap(),
            Value::from("fallback")
        );
        assert_eq!(
            eval_with("ctx.n > 3 ? 'big' : 'small'", &scope).await.unwrap(),
            Value::from("big")
        );
        assert_eq!(eval_with("'' || name", &scope).await.unwrap(), Value::from("zoya"));
        // the right side is never evaluated
        assert_eq!(eval_with("false && nope", &scope).await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_whitelisted_methods() {
        let scope = scope();
        assert_eq!(eval_with("name.toUpperCase()", &scope).await.unwrap(), Value::from("ZOYA"));
        assert_eq!(eval_with("ctx.tags.join('-')", &scope).await.unwrap(), Value::from("a-b"));
        assert_eq!(eval_with("name.padStart(6, '*')", &scope).await.unwrap(), Value::from("**zoya"));
        assert_eq!(eval_with("ctx.tags.length", &scope).await.unwrap(), Value::Number(2.0));
    }

    #[tokio::test]
    async fn test_disallowed_calls_fail() {
        let scope = scope();
        let err = eval_with("name.constructor()", &scope).await.unwrap_err();
        assert!(err.to_string().contains("not an allowed call"));

        let err = eval_with("ctx.app()", &scope).await.unwrap_err();
        assert!(err.to_string().contains("app is not a function (found string)"));

        let err = eval_with("name()", &scope).await.unwrap_err();
        assert!(err.to_string().contains("name is not a function"));

        let err = eval_with("ctx.nothing()", &scope).await.unwrap_err();
        assert!(err.to_string().contains("not an allowed call"));
    }

    #[tokio::test]
    async fn test_generated_length_is_bounded() {
        let scope = scope();
        assert_eq!(
            eval_with("name.padEnd(6, '.')", &scope).await.unwrap(),
            Value::from("zoya..")
        );
        assert_eq!(eval_with("name.padStart(2)", &scope).await.unwrap(), Value::from("zoya"));

        for expr in ["'x'.padStart(50000000)", "'x'.padEnd(1e15)", "'x'.padStart(1 / 0)", "'x'.repeat(20000)"] {
            let err = eval_with(expr, &scope).await.unwrap_err();
            assert!(matches!(err, TemplateError::RenderError(_)), "{}: {:?}", expr, err);
        }
    }

    #[tokio::test]
    async fn test_unbound_identifier_and_null_access() {
        let scope = scope();
        let err = eval_with("nope", &scope).await.unwrap_err();
        assert_eq!(err, TemplateError::render("nope is not defined"));

        let err = eval_with("ctx.missing.deeper", &scope).await.unwrap_err();
        assert!(err.to_string().contains("Cannot read properties of undefined"));
        assert_eq!(eval_with("ctx.missing?.deeper", &scope).await.unwrap(), Value::Undefined);
    }

    #[tokio::test]
    async fn test_json_builtin() {
        let scope = scope();
        assert_eq!(
            eval_with("json(ctx.tags)", &scope).await.unwrap(),
            Value::from(r#"["a","b"]"#)
        );
        assert_eq!(
            eval_with("json({a: 1}, 2)", &scope).await.unwrap(),
            Value::from("{\n  \"a\": 1\n}")
        );
    }

    #[tokio::test]
    async fn test_captured_methods() {
        let mut scope = scope();
        let mut captured = Locals::new();
        captured.insert(
            "step1".to_string(),
            Value::Captured(Captured::new("{\"rows\": 3}\n")),
        );
        scope.insert("captured".to_string(), Value::Object(captured));

        assert_eq!(
            eval_with("captured['step1'].json().rows", &scope).await.unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(
            eval_with("captured.step1.text().trim()", &scope).await.unwrap(),
            Value::from("{\"rows\": 3}")
        );
    }

    #[tokio::test]
    async fn test_nested_template_literal() {
        let scope = scope();
        assert_eq!(
            eval_with("`${name}-${ctx.tags.map ? 'x' : `${ {k: 'v'}.k }`}`", &scope)
                .await
                .unwrap(),
            Value::from("zoya-v")
        );
    }
}
