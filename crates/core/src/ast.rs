//! Raw AST produced by the parser.
//! Every node carries the position of its first token.
//! No name resolution is done here -- that is the symbol and resolve passes' job.
use serde::Serialize;
use std::fmt;

/// 1-based line and column of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// `objective:name` -- one score holder in one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRef {
    pub objective: String,
    pub name: String,
    pub pos: Position,
}

impl ScoreRef {
    /// True when both refs address the same score, regardless of position.
    pub fn same_score(&self, other: &ScoreRef) -> bool {
        self.objective == other.objective && self.name == other.name
    }
}

impl fmt::Display for ScoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.objective, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Score(ScoreRef),
    Literal { value: i32, pos: Position },
    Const { name: String, pos: Position },
}

impl Operand {
    pub fn pos(&self) -> Position {
        match self {
            Operand::Score(r) => r.pos,
            Operand::Literal { pos, .. } | Operand::Const { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Operand(Operand),
    /// At least one side is a score reference.
    Binary {
        op: ArithOp,
        left: Operand,
        right: Operand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

/// `if`/`while` condition. A missing test means "score >= 1".
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: ScoreRef,
    pub test: Option<(CmpOp, Operand)>,
}

/// A string argument to `run`/`show`/`title`.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub value: String,
    /// Written as `v"..."`.
    pub interpolated: bool,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    Title,
    Subtitle,
    Actionbar,
}

impl TitleKind {
    pub fn from_word(w: &str) -> Option<Self> {
        match w {
            "title" => Some(TitleKind::Title),
            "subtitle" => Some(TitleKind::Subtitle),
            "actionbar" => Some(TitleKind::Actionbar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TitleKind::Title => "title",
            TitleKind::Subtitle => "subtitle",
            TitleKind::Actionbar => "actionbar",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDecl {
    pub name: String,
    pub criteria: String,
    pub pos: Position,
}

/// `[Q]` suffix marking a construct wait-bearing.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotName {
    pub name: String,
    pub pos: Position,
}

/// One line captured by a `runs { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Objectives(Vec<ObjectiveDecl>),
    Vars(Vec<ScoreRef>),
    Const {
        name: String,
        value: ConstValue,
    },
    Assign {
        target: ScoreRef,
        op: AssignOp,
        value: Expr,
    },
    If {
        cond: Condition,
        slot: Option<SlotName>,
        body: Vec<Stmt>,
    },
    While {
        cond: Condition,
        slot: Option<SlotName>,
        body: Vec<Stmt>,
    },
    Call {
        target: String,
        slot: Option<SlotName>,
    },
    Run(Text),
    Show(Text),
    Title {
        kind: TitleKind,
        text: Text,
    },
    Rand {
        target: ScoreRef,
        range: Option<(Operand, Operand)>,
    },
    Raw(Vec<RawLine>),
}

impl StmtKind {
    /// The wait slot, for wait-bearing constructs.
    pub fn slot(&self) -> Option<&SlotName> {
        match self {
            StmtKind::If { slot, .. }
            | StmtKind::While { slot, .. }
            | StmtKind::Call { slot, .. } => slot.as_ref(),
            _ => None,
        }
    }

    /// Nested statement list of `if`/`while`.
    pub fn body(&self) -> Option<&[Stmt]> {
        match self {
            StmtKind::If { body, .. } | StmtKind::While { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub body: Vec<Stmt>,
    pub pos: Position,
    /// Synthesized from top-level statements rather than written as `func`.
    pub implicit: bool,
}

/// A parsed `.mcfn` file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceFile {
    pub functions: Vec<FunctionDecl>,
    /// Top-level `const` declarations. They belong to no function.
    pub constants: Vec<Stmt>,
}

impl SourceFile {
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Visit every statement of a body, depth first, in source order.
pub fn walk_stmts<'a>(body: &'a [Stmt], f: &mut dyn FnMut(&'a Stmt)) {
    for stmt in body {
        f(stmt);
        if let Some(inner) = stmt.kind.body() {
            walk_stmts(inner, f);
        }
    }
}
