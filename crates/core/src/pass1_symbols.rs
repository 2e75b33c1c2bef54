//! Pass 1: Symbol collection -- objectives, variables, constants and
//! functions, with duplicate and reserved-name detection.
//!
//! Objectives and constants are program-wide no matter where they are
//! declared; declaration order does not matter.

use crate::ast::*;
use crate::config::is_declared_name;
use crate::error::CompileError;
use crate::{RUNTIME_DIR, RUNTIME_OBJECTIVE};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveInfo {
    pub criteria: String,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstInfo {
    pub value: ConstValue,
    pub pos: Position,
}

/// Lookup tables built in Pass 1.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub objectives: BTreeMap<String, ObjectiveInfo>,
    /// (objective, name) -> first declaration
    pub variables: BTreeMap<(String, String), Position>,
    pub constants: BTreeMap<String, ConstInfo>,
    /// Function name -> definition position
    pub functions: BTreeMap<String, Position>,
}

impl SymbolTable {
    pub fn has_variable(&self, r: &ScoreRef) -> bool {
        self.variables
            .contains_key(&(r.objective.clone(), r.name.clone()))
    }

    pub fn constant(&self, name: &str) -> Option<&ConstValue> {
        self.constants.get(name).map(|c| &c.value)
    }
}

pub fn build_symbols(file: &SourceFile) -> Result<SymbolTable, CompileError> {
    let mut table = SymbolTable::default();

    let mut implicit_entry: Option<&FunctionDecl> = None;
    for func in &file.functions {
        if func.implicit {
            implicit_entry = Some(func);
        }
        if !is_declared_name(&func.name) {
            return Err(CompileError::plan(
                func.pos,
                format!(
                    "invalid function name '{}': expected lowercase letters, digits, '_' or '.'",
                    func.name
                ),
            ));
        }
        if func.name == RUNTIME_DIR {
            return Err(CompileError::plan(
                func.pos,
                format!("function name '{}' is reserved for runtime artifacts", func.name),
            ));
        }
        if let Some(first) = table.functions.get(&func.name) {
            let message = match implicit_entry {
                Some(entry) if entry.name == func.name => format!(
                    "function '{}' conflicts with the entry function built from top-level statements at {}",
                    func.name, entry.pos
                ),
                _ => format!(
                    "duplicate function '{}': first defined at {}",
                    func.name, first
                ),
            };
            return Err(CompileError::plan(func.pos, message));
        }
        table.functions.insert(func.name.clone(), func.pos);
    }

    // Objectives and constants first, so variable declarations may
    // precede the objective they live in.
    let mut var_decls: Vec<&ScoreRef> = Vec::new();
    let mut all: Vec<&Stmt> = file.constants.iter().collect();
    for func in &file.functions {
        walk_stmts(&func.body, &mut |s| all.push(s));
    }
    for stmt in &all {
        collect_decl(stmt, &mut table)?;
        if let StmtKind::Vars(refs) = &stmt.kind {
            var_decls.extend(refs.iter());
        }
    }

    for r in var_decls {
        if !table.objectives.contains_key(&r.objective) {
            return Err(CompileError::plan(
                r.pos,
                format!(
                    "undeclared objective '{}' in variable declaration {}",
                    r.objective, r
                ),
            ));
        }
        table
            .variables
            .entry((r.objective.clone(), r.name.clone()))
            .or_insert(r.pos);
    }

    tracing::debug!(
        objectives = table.objectives.len(),
        variables = table.variables.len(),
        constants = table.constants.len(),
        functions = table.functions.len(),
        "collected symbols"
    );
    Ok(table)
}

fn collect_decl(stmt: &Stmt, table: &mut SymbolTable) -> Result<(), CompileError> {
    match &stmt.kind {
        StmtKind::Objectives(decls) => {
            for d in decls {
                if d.name == RUNTIME_OBJECTIVE {
                    return Err(CompileError::plan(
                        d.pos,
                        format!(
                            "objective name '{}' is reserved for the runtime counter store",
                            d.name
                        ),
                    ));
                }
                if let Some(first) = table.objectives.get(&d.name) {
                    return Err(CompileError::plan(
                        d.pos,
                        format!(
                            "duplicate objective '{}': first declared at {}",
                            d.name, first.pos
                        ),
                    ));
                }
                table.objectives.insert(
                    d.name.clone(),
                    ObjectiveInfo {
                        criteria: d.criteria.clone(),
                        pos: d.pos,
                    },
                );
            }
        }
        StmtKind::Const { name, value } => {
            if let Some(first) = table.constants.get(name) {
                return Err(CompileError::plan(
                    stmt.pos,
                    format!(
                        "duplicate constant '{}': first declared at {}",
                        name, first.pos
                    ),
                ));
            }
            table.constants.insert(
                name.clone(),
                ConstInfo {
                    value: value.clone(),
                    pos: stmt.pos,
                },
            );
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;
    use crate::{lexer, parser};

    fn symbols(src: &str) -> Result<SymbolTable, CompileError> {
        let tokens = lexer::lex(src)?;
        let file = parser::parse(&tokens, "main")?;
        build_symbols(&file)
    }

    #[test]
    fn collects_across_functions() {
        let table = symbols(
            "var a:x\nfunc f() { obj a(deathCount)\n const N = 3 }\nconst S = \"s\"",
        )
        .unwrap();
        assert_eq!(table.objectives["a"].criteria, "deathCount");
        assert!(table.variables.contains_key(&("a".to_owned(), "x".to_owned())));
        assert_eq!(table.constant("N"), Some(&ConstValue::Int(3)));
        assert_eq!(table.constant("S"), Some(&ConstValue::Str("s".into())));
        assert_eq!(table.functions.keys().collect::<Vec<_>>(), vec!["f", "main"]);
    }

    #[test]
    fn duplicate_objective() {
        let err = symbols("obj a\nfunc f() {\n  obj a\n}").unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.position, Some(Position::new(3, 7)));
        assert!(err.message.contains("first declared at 1:5"), "{}", err.message);
    }

    #[test]
    fn reserved_objective() {
        let err = symbols("obj mcfq").unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert!(err.message.contains("reserved"));
    }

    #[test]
    fn variable_needs_declared_objective() {
        let err = symbols("obj a\nvar b:y").unwrap_err();
        assert_eq!(err.position, Some(Position::new(2, 5)));
        assert!(err.message.contains("undeclared objective 'b'"));
    }

    #[test]
    fn redeclaring_a_variable_is_allowed() {
        let table = symbols("obj a\nvar a:x\nvar a:x").unwrap();
        assert_eq!(table.variables.len(), 1);
    }

    #[test]
    fn entry_name_conflict() {
        let err = symbols("obj a\nfunc main() { }").unwrap_err();
        assert!(err.message.contains("top-level statements"), "{}", err.message);
    }

    #[test]
    fn duplicate_function() {
        let err = symbols("func f() { }\nfunc f() { }").unwrap_err();
        assert_eq!(err.position, Some(Position::new(2, 1)));
        assert!(err.message.contains("duplicate function 'f'"));
    }

    #[test]
    fn uppercase_function_name() {
        let err = symbols("func Tick() { }").unwrap_err();
        assert!(err.message.contains("invalid function name"));
    }

    #[test]
    fn entry_named_like_a_planned_copy_is_rejected() {
        let tokens = lexer::lex("obj a\nvar a:x\nfunc worker() { if(a:x)[W] { } }\ncall worker()[A]")
            .unwrap();
        let file = parser::parse(&tokens, "worker-1").unwrap();
        let err = build_symbols(&file).unwrap_err();
        assert_eq!(err.stage, Stage::Plan);
        assert_eq!(err.position, Some(Position::new(1, 1)));
        assert!(err.message.contains("'worker-1'"), "{}", err.message);
    }

    #[test]
    fn duplicate_constant() {
        let err = symbols("const N = 1\nconst N = 2").unwrap_err();
        assert_eq!(err.position, Some(Position::new(2, 1)));
    }
}
