//! Five-pass transpiler: MCFN-DSL -> `.mcfunction` artifacts.
//!
//! This is a thin orchestrator that calls each pass module in order.

use crate::config::TranspileConfig;
use crate::error::CompileError;
use crate::lexer;
use crate::parser;
use crate::pass1_symbols;
use crate::pass2_resolve;
use crate::pass3_plan::{self, ProgramPlan};
use crate::pass4_dispatch::{self, DispatchPlan};
use crate::pass5_emit::{self, ArtifactMap};

/// Everything the passes decide before any text is rendered.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub plan: ProgramPlan,
    pub dispatch: DispatchPlan,
}

/// Run passes 0 through 4 on `src`.
pub fn compile(src: &str, config: &TranspileConfig) -> Result<CompiledProgram, CompileError> {
    config.validate()?;

    // Pass 0: lexing
    let tokens = lexer::lex(src)?;

    // Pass 0 (continued): parsing, top-level statements go to the entry
    let file = parser::parse(&tokens, &config.entry)?;

    // Pass 1: symbol table
    let symbols = pass1_symbols::build_symbols(&file)?;

    // Pass 2: reference resolution and the call graph
    let graph = pass2_resolve::resolve(&file, &symbols)?;

    // Pass 3: segment plan
    let plan = pass3_plan::plan(&file, &symbols, &graph)?;

    // Pass 4: dispatcher
    let dispatch = pass4_dispatch::synthesize(&plan);

    Ok(CompiledProgram { plan, dispatch })
}

/// Transpile `src` into its artifact map, or the first error encountered.
/// Nothing is returned on error, so callers never see partial output.
pub fn transpile(src: &str, config: &TranspileConfig) -> Result<ArtifactMap, CompileError> {
    let program = compile(src, config)?;

    // Pass 5: code generation
    let artifacts = pass5_emit::emit(&program.plan, &program.dispatch, config)?;
    tracing::info!(
        namespace = %config.namespace,
        artifacts = artifacts.len(),
        "transpiled"
    );
    Ok(artifacts)
}
