//! Tree-sitter parser integration for target programs
//!
//! Parses Python source with tree-sitter-python and lowers the supported
//! subset into the owned [`ast`](super::ast). Anything outside that subset is
//! rejected at load time with the offending line, so a target never starts
//! running with a construct the interpreter cannot execute.

use super::ast::{
    AssignTarget, BinOp, BoolOp, Branch, CmpOp, Expr, FunctionDef, Literal, Param, Program, Stmt,
    StmtKind, UnaryOp,
};
use crate::core::{Error, ModuleId, Result};
use std::rc::Rc;
use tree_sitter::{Node, Parser};

/// Parse and lower a whole module.
pub fn parse_program(module: &ModuleId, source: &str) -> Result<Program> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| Error::load(module.as_str(), None, format!("tree-sitter: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::load(module.as_str(), None, "parser produced no tree"))?;
    let root = tree.root_node();

    if root.has_error() {
        let line = first_error(root).map(|node| node_line(&node));
        return Err(Error::load(module.as_str(), line, "invalid syntax"));
    }

    let lowering = Lowering { module, source };
    let body = lowering.block(root)?;
    Ok(Program { body })
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error() || child.is_missing())
        .find_map(first_error)
}

/// Get the line number for a tree-sitter node (1-indexed)
pub fn node_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Get text for a tree-sitter node
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Named children without comments and line continuations
fn syntax_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

struct Lowering<'a> {
    module: &'a ModuleId,
    source: &'a str,
}

impl<'a> Lowering<'a> {
    fn text(&self, node: &Node) -> &'a str {
        node_text(node, self.source)
    }

    fn unsupported(&self, node: &Node, what: &str) -> Error {
        Error::load(
            self.module.as_str(),
            Some(node_line(node)),
            format!("unsupported syntax '{what}'"),
        )
    }

    fn field<'t>(&self, node: &Node<'t>, name: &str) -> Result<Node<'t>> {
        node.child_by_field_name(name).ok_or_else(|| {
            Error::load(
                self.module.as_str(),
                Some(node_line(node)),
                format!("'{}' is missing its {name}", node.kind()),
            )
        })
    }

    fn block(&self, node: Node) -> Result<Vec<Stmt>> {
        syntax_children(node)
            .into_iter()
            .map(|child| self.statement(child))
            .collect()
    }

    fn statement(&self, node: Node) -> Result<Stmt> {
        let line = node_line(&node);
        let kind = match node.kind() {
            "function_definition" => StmtKind::FunctionDef(Rc::new(self.function(node)?)),
            "expression_statement" => self.expression_statement(node)?,
            "return_statement" => match syntax_children(node).first() {
                Some(value) => StmtKind::Return(Some(self.expr(*value)?)),
                None => StmtKind::Return(None),
            },
            "if_statement" => self.if_statement(node)?,
            "while_statement" => {
                if node.child_by_field_name("alternative").is_some() {
                    return Err(self.unsupported(&node, "while/else"));
                }
                StmtKind::While {
                    condition: self.expr(self.field(&node, "condition")?)?,
                    body: self.block(self.field(&node, "body")?)?,
                }
            }
            "for_statement" => {
                if node.child_by_field_name("alternative").is_some() {
                    return Err(self.unsupported(&node, "for/else"));
                }
                let left = self.field(&node, "left")?;
                if !is_identifier(&left) {
                    return Err(self.unsupported(&left, "for-loop unpacking"));
                }
                StmtKind::For {
                    target: self.text(&left).to_string(),
                    iter: self.expr(self.field(&node, "right")?)?,
                    body: self.block(self.field(&node, "body")?)?,
                }
            }
            "pass_statement" => StmtKind::Pass,
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,
            "assert_statement" => {
                let parts = syntax_children(node);
                let test = parts
                    .first()
                    .ok_or_else(|| self.unsupported(&node, "empty assert"))?;
                StmtKind::Assert {
                    test: self.expr(*test)?,
                    message: parts.get(1).map(|m| self.expr(*m)).transpose()?,
                }
            }
            "raise_statement" => self.raise_statement(node)?,
            other => return Err(self.unsupported(&node, other)),
        };
        Ok(Stmt { line, kind })
    }

    fn function(&self, node: Node) -> Result<FunctionDef> {
        let name = self.text(&self.field(&node, "name")?).to_string();
        let params = self.parameters(self.field(&node, "parameters")?)?;
        let body = self.block(self.field(&node, "body")?)?;
        Ok(FunctionDef { name, params, body })
    }

    fn parameters(&self, node: Node) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        for child in syntax_children(node) {
            let param = match child.kind() {
                "identifier" => Param {
                    name: self.text(&child).to_string(),
                    default: None,
                },
                "typed_parameter" => {
                    let name = syntax_children(child)
                        .into_iter()
                        .find(is_identifier)
                        .ok_or_else(|| self.unsupported(&child, "typed splat parameter"))?;
                    Param {
                        name: self.text(&name).to_string(),
                        default: None,
                    }
                }
                "default_parameter" | "typed_default_parameter" => Param {
                    name: self.text(&self.field(&child, "name")?).to_string(),
                    default: Some(self.expr(self.field(&child, "value")?)?),
                },
                other => return Err(self.unsupported(&child, other)),
            };
            if param.default.is_none() && params.iter().any(|p: &Param| p.default.is_some()) {
                return Err(Error::load(
                    self.module.as_str(),
                    Some(node_line(&child)),
                    "non-default argument follows default argument",
                ));
            }
            params.push(param);
        }
        Ok(params)
    }

    fn expression_statement(&self, node: Node) -> Result<StmtKind> {
        let parts = syntax_children(node);
        let [inner] = parts.as_slice() else {
            return Err(self.unsupported(&node, "tuple expression"));
        };
        match inner.kind() {
            "assignment" => {
                let Some(right) = inner.child_by_field_name("right") else {
                    return Err(self.unsupported(inner, "bare annotation"));
                };
                if right.kind() == "assignment" {
                    return Err(self.unsupported(&right, "chained assignment"));
                }
                Ok(StmtKind::Assign {
                    target: self.assign_target(self.field(inner, "left")?)?,
                    value: self.expr(right)?,
                })
            }
            "augmented_assignment" => {
                let operator = self.field(inner, "operator")?;
                let symbol = self.text(&operator);
                let op = symbol
                    .strip_suffix('=')
                    .and_then(BinOp::from_symbol)
                    .ok_or_else(|| self.unsupported(&operator, symbol))?;
                Ok(StmtKind::AugAssign {
                    target: self.assign_target(self.field(inner, "left")?)?,
                    op,
                    value: self.expr(self.field(inner, "right")?)?,
                })
            }
            _ => Ok(StmtKind::Expr(self.expr(*inner)?)),
        }
    }

    fn assign_target(&self, node: Node) -> Result<AssignTarget> {
        if is_identifier(&node) {
            return Ok(AssignTarget::Name(self.text(&node).to_string()));
        }
        if node.kind() == "subscript" {
            let (value, index) = self.subscript_parts(node)?;
            return Ok(AssignTarget::Subscript { value, index });
        }
        Err(self.unsupported(&node, node.kind()))
    }

    fn if_statement(&self, node: Node) -> Result<StmtKind> {
        let mut branches = vec![Branch {
            line: node_line(&node),
            condition: self.expr(self.field(&node, "condition")?)?,
            body: self.block(self.field(&node, "consequence")?)?,
        }];
        let mut orelse = Vec::new();

        for clause in syntax_children(node) {
            match clause.kind() {
                "elif_clause" => branches.push(Branch {
                    line: node_line(&clause),
                    condition: self.expr(self.field(&clause, "condition")?)?,
                    body: self.block(self.field(&clause, "consequence")?)?,
                }),
                "else_clause" => orelse = self.block(self.field(&clause, "body")?)?,
                _ => {}
            }
        }

        Ok(StmtKind::If { branches, orelse })
    }

    fn raise_statement(&self, node: Node) -> Result<StmtKind> {
        if node.child_by_field_name("cause").is_some() {
            return Err(self.unsupported(&node, "raise ... from"));
        }
        let Some(raised) = syntax_children(node).into_iter().next() else {
            return Ok(StmtKind::Raise {
                exception: "RuntimeError".to_string(),
                message: Some(Expr::Literal(Literal::Str(
                    "No active exception to reraise".into(),
                ))),
            });
        };

        if is_identifier(&raised) {
            return Ok(StmtKind::Raise {
                exception: self.text(&raised).to_string(),
                message: None,
            });
        }

        if raised.kind() == "call" {
            let callee = self.field(&raised, "function")?;
            if is_identifier(&callee) {
                let mut args = self.arguments(self.field(&raised, "arguments")?)?;
                if args.len() > 1 {
                    return Err(self.unsupported(&raised, "multi-argument exception"));
                }
                return Ok(StmtKind::Raise {
                    exception: self.text(&callee).to_string(),
                    message: args.pop(),
                });
            }
        }

        Err(self.unsupported(&raised, "raise of a computed exception"))
    }

    fn arguments(&self, node: Node) -> Result<Vec<Expr>> {
        if node.kind() != "argument_list" {
            return Err(self.unsupported(&node, node.kind()));
        }
        syntax_children(node)
            .into_iter()
            .map(|arg| match arg.kind() {
                "keyword_argument" | "list_splat" | "dictionary_splat" => {
                    Err(self.unsupported(&arg, arg.kind()))
                }
                _ => self.expr(arg),
            })
            .collect()
    }

    fn subscript_parts(&self, node: Node) -> Result<(Expr, Expr)> {
        let value = self.expr(self.field(&node, "value")?)?;
        let mut cursor = node.walk();
        let indices: Vec<Node> = node.children_by_field_name("subscript", &mut cursor).collect();
        match indices.as_slice() {
            [index] if index.kind() != "slice" => Ok((value, self.expr(*index)?)),
            [index] => Err(self.unsupported(index, "slice")),
            _ => Err(self.unsupported(&node, "multi-dimensional subscript")),
        }
    }

    fn expr(&self, node: Node) -> Result<Expr> {
        Ok(match node.kind() {
            "identifier" | "keyword_identifier" => Expr::Name(self.text(&node).to_string()),
            "integer" => Expr::Literal(Literal::Int(self.integer(node)?)),
            "float" => {
                let text = self.text(&node).replace('_', "");
                let value = text
                    .parse::<f64>()
                    .map_err(|_| self.unsupported(&node, "complex or malformed float"))?;
                Expr::Literal(Literal::Float(value))
            }
            "string" => Expr::Literal(Literal::Str(self.string(node)?.into())),
            "concatenated_string" => {
                let mut joined = String::new();
                for part in syntax_children(node) {
                    joined.push_str(&self.string(part)?);
                }
                Expr::Literal(Literal::Str(joined.into()))
            }
            "true" => Expr::Literal(Literal::Bool(true)),
            "false" => Expr::Literal(Literal::Bool(false)),
            "none" => Expr::Literal(Literal::None),
            "list" => Expr::List(
                syntax_children(node)
                    .into_iter()
                    .map(|item| match item.kind() {
                        "list_splat" => Err(self.unsupported(&item, "list_splat")),
                        _ => self.expr(item),
                    })
                    .collect::<Result<_>>()?,
            ),
            "parenthesized_expression" => match syntax_children(node).as_slice() {
                [inner] => self.expr(*inner)?,
                _ => return Err(self.unsupported(&node, "parenthesized_expression")),
            },
            "subscript" => {
                let (value, index) = self.subscript_parts(node)?;
                Expr::Subscript {
                    value: Box::new(value),
                    index: Box::new(index),
                }
            }
            "call" => self.call(node)?,
            "binary_operator" => {
                let operator = self.field(&node, "operator")?;
                let symbol = self.text(&operator);
                Expr::Binary {
                    op: BinOp::from_symbol(symbol).ok_or_else(|| self.unsupported(&operator, symbol))?,
                    left: Box::new(self.expr(self.field(&node, "left")?)?),
                    right: Box::new(self.expr(self.field(&node, "right")?)?),
                }
            }
            "unary_operator" => {
                let operator = self.field(&node, "operator")?;
                let op = match self.text(&operator) {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Pos,
                    other => return Err(self.unsupported(&operator, other)),
                };
                Expr::Unary {
                    op,
                    operand: Box::new(self.expr(self.field(&node, "argument")?)?),
                }
            }
            "not_operator" => Expr::Not(Box::new(self.expr(self.field(&node, "argument")?)?)),
            "boolean_operator" => {
                let operator = self.field(&node, "operator")?;
                let op = match self.text(&operator) {
                    "and" => BoolOp::And,
                    "or" => BoolOp::Or,
                    other => return Err(self.unsupported(&operator, other)),
                };
                Expr::BoolOp {
                    op,
                    left: Box::new(self.expr(self.field(&node, "left")?)?),
                    right: Box::new(self.expr(self.field(&node, "right")?)?),
                }
            }
            "comparison_operator" => self.comparison(node)?,
            "conditional_expression" => match syntax_children(node).as_slice() {
                [body, test, orelse] => Expr::IfExp {
                    test: Box::new(self.expr(*test)?),
                    body: Box::new(self.expr(*body)?),
                    orelse: Box::new(self.expr(*orelse)?),
                },
                _ => return Err(self.unsupported(&node, "conditional_expression")),
            },
            other => return Err(self.unsupported(&node, other)),
        })
    }

    fn call(&self, node: Node) -> Result<Expr> {
        let function = self.field(&node, "function")?;
        let args = self.arguments(self.field(&node, "arguments")?)?;
        if function.kind() == "attribute" {
            return Ok(Expr::Method {
                object: Box::new(self.expr(self.field(&function, "object")?)?),
                name: self.text(&self.field(&function, "attribute")?).to_string(),
                args,
            });
        }
        Ok(Expr::Call {
            func: Box::new(self.expr(function)?),
            args,
        })
    }

    /// Operands are the named children; the unnamed tokens between two
    /// operands spell the operator (`not` `in` arrive as one or two tokens).
    fn comparison(&self, node: Node) -> Result<Expr> {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if child.is_extra() {
                continue;
            }
            if child.is_named() {
                if !pending.is_empty() {
                    let symbol = pending.join(" ");
                    let symbol = symbol.split_whitespace().collect::<Vec<_>>().join(" ");
                    let op = CmpOp::from_symbol(&symbol)
                        .ok_or_else(|| self.unsupported(&child, &symbol))?;
                    operators.push(op);
                    pending.clear();
                }
                operands.push(self.expr(child)?);
            } else {
                pending.push(self.text(&child));
            }
        }

        if operands.len() != operators.len() + 1 || operators.is_empty() {
            return Err(self.unsupported(&node, "comparison_operator"));
        }

        let mut operands = operands.into_iter();
        let first = operands.next().ok_or_else(|| self.unsupported(&node, "comparison"))?;
        Ok(Expr::Compare {
            first: Box::new(first),
            rest: operators.into_iter().zip(operands).collect(),
        })
    }

    fn integer(&self, node: Node) -> Result<i64> {
        let text = self.text(&node).replace('_', "");
        let lower = text.to_ascii_lowercase();
        let parsed = if let Some(hex) = lower.strip_prefix("0x") {
            i64::from_str_radix(hex, 16)
        } else if let Some(oct) = lower.strip_prefix("0o") {
            i64::from_str_radix(oct, 8)
        } else if let Some(bin) = lower.strip_prefix("0b") {
            i64::from_str_radix(bin, 2)
        } else {
            lower.parse::<i64>()
        };
        parsed.map_err(|_| self.unsupported(&node, "integer literal outside 64-bit range"))
    }

    fn string(&self, node: Node) -> Result<String> {
        if node.kind() != "string" {
            return Err(self.unsupported(&node, node.kind()));
        }
        let text = self.text(&node);
        let prefix_len = text
            .find(|c: char| c == '\'' || c == '"')
            .ok_or_else(|| self.unsupported(&node, "string"))?;
        let prefix = text[..prefix_len].to_ascii_lowercase();
        let quoted = &text[prefix_len..];

        if prefix.contains('b') {
            return Err(self.unsupported(&node, "bytes literal"));
        }

        let quote = if quoted.starts_with("\"\"\"") || quoted.starts_with("'''") {
            &quoted[..3]
        } else {
            &quoted[..1]
        };
        let body = quoted
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
            .ok_or_else(|| self.unsupported(&node, "unterminated string"))?;

        if prefix.contains('f') && body.contains('{') {
            return Err(self.unsupported(&node, "f-string interpolation"));
        }
        if prefix.contains('r') {
            return Ok(body.to_string());
        }
        Ok(unescape(body))
    }
}

fn is_identifier(node: &Node) -> bool {
    matches!(node.kind(), "identifier" | "keyword_identifier")
}

/// Decode Python escape sequences. Unknown escapes keep their backslash.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0c}'),
            Some('v') => out.push('\u{0b}'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some(kind @ ('x' | 'u')) => {
                let width = if kind == 'x' { 2 } else { 4 };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&digits);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse(source: &str) -> Result<Program> {
        parse_program(&ModuleId::from("subject"), source)
    }

    fn load_error_line(source: &str) -> Option<usize> {
        match parse(source) {
            Err(Error::Load { line, .. }) => line,
            other => panic!("expected load error, got {other:?}"),
        }
    }

    #[test]
    fn test_function_lines_are_one_based() {
        let program = parse(indoc! {"
            def add(a, b=1):
                total = a + b
                return total
        "})
        .unwrap();

        assert_eq!(program.body.len(), 1);
        let StmtKind::FunctionDef(def) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert_eq!(program.body[0].line, 1);
        assert_eq!(def.name, "add");
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
        let lines: Vec<usize> = def.body.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_elif_branches_keep_their_lines() {
        let program = parse(indoc! {"
            if x > 1:
                y = 1
            elif x < 0:
                y = 2
            else:
                y = 3
        "})
        .unwrap();

        let StmtKind::If { branches, orelse } = &program.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(branches.iter().map(|b| b.line).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(orelse[0].line, 6);
    }

    #[test]
    fn test_chained_comparison_and_membership() {
        let program = parse("ok = 0 <= x < 10 and y not in items\n").unwrap();
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        let Expr::BoolOp { left, right, .. } = value else {
            panic!("expected boolean operator");
        };
        let Expr::Compare { rest, .. } = left.as_ref() else {
            panic!("expected comparison");
        };
        assert_eq!(rest.iter().map(|(op, _)| *op).collect::<Vec<_>>(), vec![CmpOp::LtE, CmpOp::Lt]);
        let Expr::Compare { rest, .. } = right.as_ref() else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CmpOp::NotIn);
    }

    #[test]
    fn test_method_call_lowers_to_method() {
        let program = parse("items.append(3)\n").unwrap();
        assert!(matches!(
            &program.body[0].kind,
            StmtKind::Expr(Expr::Method { name, .. }) if name == "append"
        ));
    }

    #[test]
    fn test_raise_with_message() {
        let program = parse("raise ValueError('bad input')\n").unwrap();
        let StmtKind::Raise { exception, message } = &program.body[0].kind else {
            panic!("expected raise");
        };
        assert_eq!(exception, "ValueError");
        assert_eq!(message, &Some(Expr::Literal(Literal::Str("bad input".into()))));
    }

    #[test]
    fn test_comments_are_skipped() {
        let program = parse(indoc! {"
            # leading comment
            x = 1  # trailing
            # between
            y = 2
        "})
        .unwrap();
        assert_eq!(program.body.iter().map(|s| s.line).collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(unescape(r"a\nb\t\\\x41é\q"), "a\nb\t\\Aé\\q");
        let program = parse("s = r'\\n' + \"\"\"doc\"\"\"\n").unwrap();
        let StmtKind::Assign { value: Expr::Binary { left, right, .. }, .. } = &program.body[0].kind
        else {
            panic!("expected binary");
        };
        assert_eq!(**left, Expr::Literal(Literal::Str("\\n".into())));
        assert_eq!(**right, Expr::Literal(Literal::Str("doc".into())));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let line = load_error_line(indoc! {"
            def ok():
                return 1

            def broken(:
                return 2
        "});
        assert!(matches!(line, Some(l) if l >= 4), "got {line:?}");
    }

    #[test]
    fn test_unsupported_construct_is_load_error() {
        let line = load_error_line(indoc! {"
            x = 1
            class Thing:
                pass
        "});
        assert_eq!(line, Some(2));
    }

    #[test]
    fn test_default_before_positional_rejected() {
        assert_eq!(load_error_line("def f(a=1, b):\n    return a\n"), Some(1));
    }

    #[test]
    fn test_integer_literals() {
        let program = parse("a = 0x1F\nb = 1_000\nc = 0b101\n").unwrap();
        let values: Vec<&Expr> = program
            .body
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Assign { value, .. } => value,
                _ => panic!("expected assignment"),
            })
            .collect();
        assert_eq!(values[0], &Expr::Literal(Literal::Int(31)));
        assert_eq!(values[1], &Expr::Literal(Literal::Int(1000)));
        assert_eq!(values[2], &Expr::Literal(Literal::Int(5)));
    }
}
