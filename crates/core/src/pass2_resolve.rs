//! Pass 2: Reference resolution -- every score, constant, placeholder and
//! call target is checked against the symbol table, and the call graph is
//! built to find which functions wait (directly or through callees).

use crate::ast::*;
use crate::config::is_function_name;
use crate::error::CompileError;
use crate::interpolate;
use crate::pass1_symbols::SymbolTable;
use std::collections::{BTreeMap, BTreeSet};

/// A call from one defined function to another.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub callee: String,
    pub pos: Position,
}

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    /// Caller -> calls to defined functions, in source order.
    pub calls: BTreeMap<String, Vec<CallSite>>,
    /// Functions that contain a wait-bearing construct, or call one that does.
    pub async_fns: BTreeSet<String>,
}

impl CallGraph {
    pub fn is_async(&self, name: &str) -> bool {
        self.async_fns.contains(name)
    }
}

pub fn resolve(file: &SourceFile, symbols: &SymbolTable) -> Result<CallGraph, CompileError> {
    for stmt in &file.constants {
        check_stmt(stmt, symbols)?;
    }

    let mut graph = CallGraph::default();
    let mut waits_directly = BTreeSet::new();
    for func in &file.functions {
        let mut sites = Vec::new();
        let mut failure: Option<CompileError> = None;
        walk_stmts(&func.body, &mut |stmt| {
            if failure.is_some() {
                return;
            }
            if let Err(e) = check_stmt(stmt, symbols) {
                failure = Some(e);
                return;
            }
            if stmt.kind.slot().is_some() {
                waits_directly.insert(func.name.clone());
            }
            if let StmtKind::Call { target, .. } = &stmt.kind {
                if symbols.functions.contains_key(target) {
                    sites.push(CallSite {
                        callee: target.clone(),
                        pos: stmt.pos,
                    });
                }
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        graph.calls.insert(func.name.clone(), sites);
    }

    // Async closure: a caller of an async function is async.
    graph.async_fns = waits_directly;
    loop {
        let before = graph.async_fns.len();
        for (caller, sites) in &graph.calls {
            if sites.iter().any(|s| graph.async_fns.contains(&s.callee)) {
                graph.async_fns.insert(caller.clone());
            }
        }
        if graph.async_fns.len() == before {
            break;
        }
    }

    check_async_recursion(&graph)?;

    tracing::debug!(
        functions = graph.calls.len(),
        async_functions = graph.async_fns.len(),
        "resolved references"
    );
    Ok(graph)
}

fn check_stmt(stmt: &Stmt, symbols: &SymbolTable) -> Result<(), CompileError> {
    match &stmt.kind {
        StmtKind::Objectives(_) | StmtKind::Vars(_) | StmtKind::Const { .. } | StmtKind::Raw(_) => {
            Ok(())
        }
        StmtKind::Assign { target, value, .. } => {
            check_score(target, symbols)?;
            match value {
                Expr::Operand(o) => check_operand(o, symbols),
                Expr::Binary { left, right, .. } => {
                    check_operand(left, symbols)?;
                    check_operand(right, symbols)
                }
            }
        }
        StmtKind::If { cond, .. } | StmtKind::While { cond, .. } => {
            check_score(&cond.lhs, symbols)?;
            match &cond.test {
                Some((_, rhs)) => check_operand(rhs, symbols),
                None => Ok(()),
            }
        }
        StmtKind::Call { target, slot } => {
            if !is_function_name(target) {
                return Err(CompileError::plan(
                    stmt.pos,
                    format!("invalid function name '{}' in call", target),
                ));
            }
            if symbols.functions.contains_key(target) {
                return Ok(());
            }
            if let Some(slot) = slot {
                return Err(CompileError::plan(
                    slot.pos,
                    format!(
                        "cannot wait on '{}': function is not defined in this file",
                        target
                    ),
                ));
            }
            tracing::warn!(
                function = %target,
                line = stmt.pos.line,
                "call to a function not defined in this file; emitted as an external call"
            );
            Ok(())
        }
        StmtKind::Run(text) | StmtKind::Show(text) => check_text(text, symbols),
        StmtKind::Title { text, .. } => {
            if text.interpolated {
                return Err(CompileError::plan(
                    text.pos,
                    "interpolated strings are not supported in title text",
                ));
            }
            check_text(text, symbols)
        }
        StmtKind::Rand { target, range } => {
            check_score(target, symbols)?;
            if let Some((lo, hi)) = range {
                let lo_value = rand_bound(lo, symbols)?;
                let hi_value = rand_bound(hi, symbols)?;
                if lo_value > hi_value {
                    return Err(CompileError::plan(
                        lo.pos(),
                        format!(
                            "rand range is empty: lower bound {} exceeds upper bound {}",
                            lo_value, hi_value
                        ),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn check_score(r: &ScoreRef, symbols: &SymbolTable) -> Result<(), CompileError> {
    if !symbols.objectives.contains_key(&r.objective) {
        return Err(CompileError::plan(
            r.pos,
            format!("undeclared objective '{}' in {}", r.objective, r),
        ));
    }
    if !symbols.has_variable(r) {
        return Err(CompileError::plan(
            r.pos,
            format!("undeclared variable {} (declare it with 'var {}')", r, r),
        ));
    }
    Ok(())
}

/// Integer value of a constant used where a score value is expected.
pub fn int_constant(name: &str, pos: Position, symbols: &SymbolTable) -> Result<i32, CompileError> {
    match symbols.constant(name) {
        Some(ConstValue::Int(n)) => Ok(*n),
        Some(ConstValue::Str(_)) => Err(CompileError::plan(
            pos,
            format!(
                "type mismatch: constant '{}' holds a string, expected an integer",
                name
            ),
        )),
        None => Err(CompileError::plan(
            pos,
            format!("undeclared constant '{}'", name),
        )),
    }
}

fn check_operand(o: &Operand, symbols: &SymbolTable) -> Result<(), CompileError> {
    match o {
        Operand::Score(r) => check_score(r, symbols),
        Operand::Literal { .. } => Ok(()),
        Operand::Const { name, pos } => int_constant(name, *pos, symbols).map(|_| ()),
    }
}

fn rand_bound(o: &Operand, symbols: &SymbolTable) -> Result<i32, CompileError> {
    match o {
        Operand::Literal { value, .. } => Ok(*value),
        Operand::Const { name, pos } => int_constant(name, *pos, symbols),
        Operand::Score(r) => Err(CompileError::plan(
            r.pos,
            format!(
                "rand bounds must be integer literals or constants, got score {}",
                r
            ),
        )),
    }
}

fn check_text(text: &Text, symbols: &SymbolTable) -> Result<(), CompileError> {
    let value = interpolate::substitute_constants(&text.value, text.pos, symbols)?;
    if value.contains('\n') {
        return Err(CompileError::plan(
            text.pos,
            "command text must not contain a line break",
        ));
    }
    if text.interpolated {
        let substituted = Text {
            value,
            interpolated: true,
            pos: text.pos,
        };
        interpolate::check_placeholders(&substituted, symbols)?;
    }
    Ok(())
}

/// Each call site of an async function gets its own instance, so a cycle
/// through async functions would need unboundedly many instances.
fn check_async_recursion(graph: &CallGraph) -> Result<(), CompileError> {
    fn visit(
        name: &str,
        graph: &CallGraph,
        stack: &mut Vec<String>,
        done: &mut BTreeSet<String>,
    ) -> Result<(), CompileError> {
        if done.contains(name) {
            return Ok(());
        }
        stack.push(name.to_owned());
        for site in graph.calls.get(name).into_iter().flatten() {
            if !graph.is_async(&site.callee) {
                continue;
            }
            if let Some(i) = stack.iter().position(|s| s == &site.callee) {
                let mut path: Vec<&str> = stack[i..].iter().map(String::as_str).collect();
                path.push(&site.callee);
                return Err(CompileError::plan(
                    site.pos,
                    format!(
                        "recursive call to '{}' passes through wait-bearing code ({})",
                        site.callee,
                        path.join(" -> ")
                    ),
                ));
            }
            visit(&site.callee, graph, stack, done)?;
        }
        stack.pop();
        done.insert(name.to_owned());
        Ok(())
    }

    let mut done = BTreeSet::new();
    for name in &graph.async_fns {
        visit(name, graph, &mut Vec::new(), &mut done)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::pass1_symbols::build_symbols;
    use crate::{lexer, parser};

    fn resolve_src(src: &str) -> Result<CallGraph, CompileError> {
        let tokens = lexer::lex(src)?;
        let file = parser::parse(&tokens, "main")?;
        let symbols = build_symbols(&file)?;
        resolve(&file, &symbols)
    }

    const DECLS: &str = "obj a\nvar a:x, a:y\n";

    #[test]
    fn undeclared_variable() {
        let err = resolve_src(&format!("{}a:z = 1", DECLS)).unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.position, Some(Position::new(3, 1)));
        assert!(err.message.contains("undeclared variable a:z"));
    }

    #[test]
    fn undeclared_objective_in_condition() {
        let err = resolve_src(&format!("{}if(b:x == 1) {{ }}", DECLS)).unwrap_err();
        assert!(err.message.contains("undeclared objective 'b'"));
        assert_eq!(err.position, Some(Position::new(3, 4)));
    }

    #[test]
    fn string_constant_in_score_position() {
        let err = resolve_src(&format!("{}const NAME = \"x\"\na:x = a:y + NAME", DECLS))
            .unwrap_err();
        assert!(err.message.starts_with("type mismatch"), "{}", err.message);
        assert_eq!(err.position, Some(Position::new(4, 13)));
    }

    #[test]
    fn undeclared_constant_operand() {
        let err = resolve_src(&format!("{}a:x += STEP", DECLS)).unwrap_err();
        assert!(err.message.contains("undeclared constant 'STEP'"));
    }

    #[test]
    fn wait_on_undefined_function() {
        let err = resolve_src("call ghost()[Q]").unwrap_err();
        assert_eq!(err.position, Some(Position::new(1, 14)));
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn external_call_without_wait_is_allowed() {
        let graph = resolve_src("call ghost()").unwrap();
        assert!(graph.calls["main"].is_empty());
    }

    #[test]
    fn interpolated_title_is_rejected() {
        let err = resolve_src(&format!("{}title(title, v\"[a:x]\")", DECLS)).unwrap_err();
        assert!(err.message.contains("title"));
    }

    #[test]
    fn interpolation_placeholder_must_be_declared() {
        let err = resolve_src(&format!("{}show(v\"hp [a:hp]\")", DECLS)).unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert!(err.message.contains("a:hp"));
    }

    #[test]
    fn rand_bounds() {
        let err = resolve_src(&format!("{}rand(a:x, 10, 1)", DECLS)).unwrap_err();
        assert!(err.message.contains("rand range is empty"));
        let err = resolve_src(&format!("{}rand(a:x, a:y, 1)", DECLS)).unwrap_err();
        assert!(err.message.contains("integer literals or constants"));
        assert!(resolve_src(&format!("{}const LO = -5\nrand(a:x, LO, 5)", DECLS)).is_ok());
    }

    #[test]
    fn async_is_transitive_through_callers() {
        let graph = resolve_src(
            "func leaf() { if(a:x)[Q] { } }\nfunc mid() { call leaf() }\nfunc top() { call mid() }\nfunc plain() { }\nobj a\nvar a:x",
        )
        .unwrap();
        let fns: Vec<&str> = graph.async_fns.iter().map(String::as_str).collect();
        assert_eq!(fns, vec!["leaf", "mid", "top"]);
        assert!(!graph.is_async("plain"));
        assert!(!graph.is_async("main"));
    }

    #[test]
    fn recursion_through_async_code_is_rejected() {
        let err = resolve_src(
            "func a() {\n  call b()[Q]\n}\nfunc b() {\n  call a()\n}",
        )
        .unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert!(err.message.contains("a -> b -> a"), "{}", err.message);
        assert_eq!(err.position, Some(Position::new(5, 3)));
    }

    #[test]
    fn sync_recursion_is_allowed() {
        assert!(resolve_src(&format!(
            "{}func count() {{\n  a:x -= 1\n  if(a:x > 0) {{ call count() }}\n}}",
            DECLS
        ))
        .is_ok());
    }
}
