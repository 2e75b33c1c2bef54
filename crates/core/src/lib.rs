#![allow(clippy::result_large_err)]
//! mcfn-core: MCFN-DSL transpiler core library.
//!
//! Provides the five-pass pipeline from `.mcfn` source text to a map of
//! Minecraft `.mcfunction` artifacts, including the tick-deferred wait
//! runtime (queue slots, watchers and the resume dispatcher).
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`transpile()`] -- run the full pipeline
//! - [`compile()`] -- stop after planning, for inspection
//! - [`TranspileConfig`] -- namespace, output root, entry and audience
//! - [`CompileError`] -- staged error with an optional source position
//! - [`ProgramPlan`] / [`DispatchPlan`] -- Pass 3 and Pass 4 output
//! - [`SlotKey`], [`CounterStore`], [`Watcher`] -- runtime wait model
//!
//! Individual pass entry functions are also re-exported for selective
//! pipeline execution.

/// Scoreboard objective reserved for the generated runtime.
pub const RUNTIME_OBJECTIVE: &str = "mcfq";
/// Resource directory reserved for generated runtime artifacts.
pub const RUNTIME_DIR: &str = "__mcfn";
/// Function registered in the `minecraft:load` tag after the runtime bootstrap.
pub const LOAD_HOOK: &str = "_ready";
/// Function registered in the `minecraft:tick` tag.
pub const TICK_HOOK: &str = "_tick";

pub mod ast;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod lexer;
pub mod parser;
pub mod pass1_symbols;
pub mod pass2_resolve;
pub mod pass3_plan;
pub mod pass4_dispatch;
pub mod pass5_emit;
pub mod transpile;
pub mod watch;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Position, SourceFile, Stmt, StmtKind};
pub use config::TranspileConfig;
pub use error::{CompileError, Stage};
pub use pass3_plan::ProgramPlan;
pub use pass4_dispatch::DispatchPlan;
pub use pass5_emit::ArtifactMap;
pub use watch::{CounterStore, SlotKey, Watcher, WatcherState};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use lexer::lex;
pub use parser::parse;
pub use pass1_symbols::build_symbols;
pub use pass2_resolve::resolve;
pub use pass3_plan::plan;
pub use pass4_dispatch::synthesize;
pub use pass5_emit::emit;
pub use transpile::{compile, transpile, CompiledProgram};
