//! Pass 3: Segment planning -- split every function instance into ordered
//! segments at wait boundaries and bind each boundary to a queue slot.
//!
//! At a wait-bearing construct the current segment closes, the construct's
//! own body is planned in place (it runs synchronously on entry), and a
//! continuation segment gated on the construct's slot opens. The slot's
//! descendants are every slot opened inside the body or anywhere in the
//! callee's instance tree; the gate releases only when all of them are
//! closed.
//!
//! Every call site of an async function runs a derived instance with its
//! own counter keys, so concurrently live calls never share a counter. An
//! awaited call site may take over a copy whose previous call was already
//! awaited, since their lifetimes cannot overlap. Sync functions are planned
//! once and called directly.
//!
//! Loop iterations re-enter the same call sites, so inside a loop body a
//! call to an async function must be awaited before the back edge runs.

use crate::ast::*;
use crate::error::CompileError;
use crate::interpolate::{self, TextComponent};
use crate::pass1_symbols::SymbolTable;
use crate::pass2_resolve::{int_constant, CallGraph};
use crate::watch::SlotKey;
use crate::TICK_HOOK;
use std::collections::{BTreeMap, BTreeSet};

pub type InstanceId = usize;

/// Upper bound on planned instances, roots included.
pub const MAX_INSTANCES: usize = 4096;

// ──────────────────────────────────────────────
// Plan tree
// ──────────────────────────────────────────────

/// A score holder an operation reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Holder {
    Score(ScoreRef),
    /// `#tmp` in the runtime objective.
    Temp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Copy,
    Add,
    Sub,
}

impl OperationKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            OperationKind::Copy => "=",
            OperationKind::Add => "+=",
            OperationKind::Sub => "-=",
        }
    }
}

/// One primitive scoreboard command.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOp {
    Set { target: Holder, value: i32 },
    /// Negative values lower the score. Never `i32::MIN`.
    Add { target: Holder, value: i32 },
    Operation {
        target: Holder,
        kind: OperationKind,
        source: Holder,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondTest {
    /// `matches <range>`
    Range(String),
    /// `<op> <rhs>` against another score.
    Compare { op: &'static str, rhs: ScoreRef },
}

/// A condition that can hold at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    pub lhs: ScoreRef,
    pub test: CondTest,
    /// `execute unless` instead of `execute if`.
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Instance(InstanceId),
    /// Not defined in this file; passed through by name.
    External(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Score(ScoreOp),
    AddObjective { name: String, criteria: String },
    /// Verbatim command text.
    Command(String),
    Tellraw(Vec<TextComponent>),
    Title { kind: TitleKind, text: String },
    Random { target: ScoreRef, lo: i32, hi: i32 },
    Call(CallTarget),
    Branch { cond: Cond, body: Block },
    Loop { cond: Cond, body: Block },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub segments: Vec<Segment>,
}

impl Block {
    pub fn head(&self) -> Option<&Segment> {
        self.segments.first()
    }

    /// A block whose only segment emits nothing.
    pub fn is_trivial(&self) -> bool {
        self.segments.iter().all(Segment::is_trivial)
    }
}

/// Re-test the loop condition at the end of a loop body and re-enter it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBack {
    pub cond: Cond,
    pub head: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Unique within the instance.
    pub id: u32,
    /// The slot whose closing releases this segment.
    pub gate: Option<SlotKey>,
    pub ops: Vec<Op>,
    /// Wait boundary ending this segment; the next segment of the block is
    /// its continuation.
    pub wait: Option<Wait>,
    pub loop_back: Option<LoopBack>,
}

impl Segment {
    fn new(id: u32, gate: Option<SlotKey>) -> Self {
        Segment {
            id,
            gate,
            ops: Vec::new(),
            wait: None,
            loop_back: None,
        }
    }

    /// Emits no lines; gets no artifact.
    pub fn is_trivial(&self) -> bool {
        self.ops.is_empty() && self.wait.is_none() && self.loop_back.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSlot {
    pub key: SlotKey,
    pub pos: Position,
    /// Watcher number within the instance.
    pub watcher: u32,
    /// Every slot opened inside the guarded work, transitively.
    pub descendants: BTreeSet<SlotKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaitConstruct {
    /// `cond` is `None` when it can never hold; the body is then empty.
    If { cond: Option<Cond>, body: Block },
    While { cond: Option<Cond>, body: Block },
    Call { instance: InstanceId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wait {
    pub slot: QueueSlot,
    pub construct: WaitConstruct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    /// Resource label; the function name for root instances.
    pub label: String,
    pub function: String,
    /// Invoked by the host at `<function>` rather than through a call site.
    pub root: bool,
    pub body: Block,
    /// Own slots, indexed by watcher number.
    pub slots: Vec<SlotKey>,
    /// Own slots plus every slot of the instances it calls.
    pub all_keys: BTreeSet<SlotKey>,
    /// Uses `#tmp` for aliased arithmetic.
    pub uses_temp: bool,
}

impl Instance {
    pub fn is_async(&self) -> bool {
        !self.all_keys.is_empty()
    }

    /// Visit every segment of the instance, blocks in preorder.
    pub fn segments(&self) -> Vec<&Segment> {
        fn walk<'a>(block: &'a Block, out: &mut Vec<&'a Segment>) {
            for seg in &block.segments {
                out.push(seg);
                for op in &seg.ops {
                    if let Op::Branch { body, .. } | Op::Loop { body, .. } = op {
                        walk(body, out);
                    }
                }
                if let Some(wait) = &seg.wait {
                    match &wait.construct {
                        WaitConstruct::If { body, .. } | WaitConstruct::While { body, .. } => {
                            walk(body, out)
                        }
                        WaitConstruct::Call { .. } => {}
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.body, &mut out);
        out.sort_by_key(|s| s.id);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgramPlan {
    /// Root instances first, in source order, then derived instances.
    pub instances: Vec<Instance>,
}

impl ProgramPlan {
    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id)
    }

    pub fn root(&self, function: &str) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|i| i.root && i.function == function)
    }

    pub fn slot_keys(&self) -> BTreeSet<SlotKey> {
        self.instances
            .iter()
            .flat_map(|i| i.slots.iter().cloned())
            .collect()
    }
}

// ──────────────────────────────────────────────
// Planner
// ──────────────────────────────────────────────

struct Planner<'a> {
    file: &'a SourceFile,
    symbols: &'a SymbolTable,
    graph: &'a CallGraph,
    roots: BTreeMap<&'a str, InstanceId>,
    instances: Vec<Option<Instance>>,
    derived: BTreeMap<String, u32>,
}

/// Whether code being planned can run again while a call it made is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Exposure {
    /// Nothing re-enters this code before its calls finish.
    Sequenced,
    /// Top level of a loop body: the back edge waits for awaited calls only.
    LoopBody,
    /// The next iteration can start while anything started here is live.
    Overlapping,
}

impl Exposure {
    fn looped(self) -> Self {
        self.max(Exposure::LoopBody)
    }

    /// Body of a non-wait `if`: nothing after it waits for the body.
    fn branch(self) -> Self {
        match self {
            Exposure::Sequenced => Exposure::Sequenced,
            _ => Exposure::Overlapping,
        }
    }

    /// Body of a wait construct: the continuation waits for all of it.
    fn awaited(self) -> Self {
        match self {
            Exposure::LoopBody => Exposure::Sequenced,
            other => other,
        }
    }
}

/// Per-instance allocation state.
struct InstanceState {
    label: String,
    function: String,
    next_segment: u32,
    slot_names: BTreeMap<String, Position>,
    slots: Vec<SlotKey>,
    uses_temp: bool,
    exposure: Exposure,
    /// Derived instances taken by call sites, in planning order.
    used: Vec<(String, InstanceId)>,
    /// Derived instances whose call has been awaited, per callee.
    free: BTreeMap<String, Vec<InstanceId>>,
}

impl InstanceState {
    fn alloc_segment(&mut self, gate: Option<SlotKey>) -> Segment {
        let seg = Segment::new(self.next_segment, gate);
        self.next_segment += 1;
        seg
    }

    /// Return every instance taken since `mark` to the pool.
    fn release_since(&mut self, mark: usize) {
        for (callee, id) in &self.used[mark..] {
            let pool = self.free.entry(callee.clone()).or_default();
            if !pool.contains(id) {
                pool.push(*id);
            }
        }
    }
}

pub fn plan(
    file: &SourceFile,
    symbols: &SymbolTable,
    graph: &CallGraph,
) -> Result<ProgramPlan, CompileError> {
    // The tick tag re-enters the hook every tick, live or not.
    if let Some(tick) = file.function(TICK_HOOK).filter(|f| graph.is_async(&f.name)) {
        return Err(CompileError::plan(
            tick.pos,
            format!(
                "function '{}' runs every tick, so it cannot wait or call wait-bearing functions",
                TICK_HOOK
            ),
        ));
    }
    let mut planner = Planner {
        file,
        symbols,
        graph,
        roots: BTreeMap::new(),
        instances: Vec::new(),
        derived: BTreeMap::new(),
    };
    for func in &file.functions {
        planner.roots.insert(func.name.as_str(), planner.instances.len());
        planner.instances.push(None);
    }
    for (id, func) in file.functions.iter().enumerate() {
        planner.plan_instance(func, func.name.clone(), id, true)?;
    }

    let mut instances = Vec::with_capacity(planner.instances.len());
    for (id, slot) in planner.instances.into_iter().enumerate() {
        let inst = slot.ok_or_else(|| {
            CompileError::codegen(format!("instance {} was reserved but never planned", id))
        })?;
        instances.push(inst);
    }
    let plan = ProgramPlan { instances };
    tracing::debug!(
        instances = plan.instances.len(),
        slots = plan.slot_keys().len(),
        "planned segments"
    );
    Ok(plan)
}

impl<'a> Planner<'a> {
    fn plan_instance(
        &mut self,
        func: &'a FunctionDecl,
        label: String,
        id: InstanceId,
        root: bool,
    ) -> Result<BTreeSet<SlotKey>, CompileError> {
        let mut st = InstanceState {
            label: label.clone(),
            function: func.name.clone(),
            next_segment: 0,
            slot_names: BTreeMap::new(),
            slots: Vec::new(),
            uses_temp: false,
            exposure: Exposure::Sequenced,
            used: Vec::new(),
            free: BTreeMap::new(),
        };
        let (body, all_keys) = self.plan_block(&mut st, &func.body, None)?;
        tracing::trace!(
            instance = %label,
            segments = st.next_segment,
            slots = st.slots.len(),
            "planned instance"
        );
        self.instances[id] = Some(Instance {
            id,
            label,
            function: func.name.clone(),
            root,
            body,
            slots: st.slots,
            all_keys: all_keys.clone(),
            uses_temp: st.uses_temp,
        });
        Ok(all_keys)
    }

    /// Plan a statement list into a block. Returns the block and every slot
    /// key opened anywhere inside it.
    fn plan_block(
        &mut self,
        st: &mut InstanceState,
        stmts: &'a [Stmt],
        gate: Option<SlotKey>,
    ) -> Result<(Block, BTreeSet<SlotKey>), CompileError> {
        let mut segments = Vec::new();
        let mut keys = BTreeSet::new();
        let mut cur = st.alloc_segment(gate);
        let outer_free = st.free.clone();
        let block_mark = st.used.len();

        for stmt in stmts {
            if let Some(slot) = stmt.kind.slot() {
                let mark = st.used.len();
                let (wait, opened) = self.plan_wait(st, stmt, slot)?;
                st.release_since(mark);
                let key = wait.slot.key.clone();
                keys.insert(key.clone());
                keys.extend(opened);
                cur.wait = Some(wait);
                segments.push(cur);
                cur = st.alloc_segment(Some(key));
                continue;
            }
            self.plan_stmt(st, stmt, &mut cur.ops, &mut keys)?;
        }
        segments.push(cur);

        // Work awaited here is only finished for the rest of this block.
        let taken: BTreeSet<InstanceId> =
            st.used[block_mark..].iter().map(|(_, id)| *id).collect();
        st.free = outer_free;
        for pool in st.free.values_mut() {
            pool.retain(|id| !taken.contains(id));
        }
        Ok((Block { segments }, keys))
    }

    fn plan_wait(
        &mut self,
        st: &mut InstanceState,
        stmt: &'a Stmt,
        slot: &SlotName,
    ) -> Result<(Wait, BTreeSet<SlotKey>), CompileError> {
        if let Some(first) = st.slot_names.get(&slot.name) {
            return Err(CompileError::plan(
                slot.pos,
                format!(
                    "queue slot '{}' is already used by another wait at {} in function '{}'",
                    slot.name, first, st.function
                ),
            ));
        }
        st.slot_names.insert(slot.name.clone(), slot.pos);
        let key = SlotKey::new(st.label.clone(), slot.name.clone());
        let watcher = st.slots.len() as u32;
        st.slots.push(key.clone());

        let outer = st.exposure;
        st.exposure = outer.awaited();
        let planned = self.plan_wait_construct(st, stmt);
        st.exposure = outer;
        let (construct, descendants) = planned?;

        Ok((
            Wait {
                slot: QueueSlot {
                    key,
                    pos: slot.pos,
                    watcher,
                    descendants: descendants.clone(),
                },
                construct,
            },
            descendants,
        ))
    }

    fn plan_wait_construct(
        &mut self,
        st: &mut InstanceState,
        stmt: &'a Stmt,
    ) -> Result<(WaitConstruct, BTreeSet<SlotKey>), CompileError> {
        let planned = match &stmt.kind {
            StmtKind::If { cond, body, .. } => match self.cond(cond)? {
                Some(c) => {
                    let (block, opened) = self.plan_block(st, body, None)?;
                    (
                        WaitConstruct::If {
                            cond: Some(c),
                            body: block,
                        },
                        opened,
                    )
                }
                None => {
                    never_holds(cond);
                    (
                        WaitConstruct::If {
                            cond: None,
                            body: Block::default(),
                        },
                        BTreeSet::new(),
                    )
                }
            },
            StmtKind::While { cond, body, .. } => match self.cond(cond)? {
                Some(c) => {
                    let (block, opened) = self.plan_loop_body(st, body, &c)?;
                    (
                        WaitConstruct::While {
                            cond: Some(c),
                            body: block,
                        },
                        opened,
                    )
                }
                None => {
                    never_holds(cond);
                    (
                        WaitConstruct::While {
                            cond: None,
                            body: Block::default(),
                        },
                        BTreeSet::new(),
                    )
                }
            },
            StmtKind::Call { target, .. } => {
                let (instance, opened) = self.call_instance(st, target, stmt.pos, true)?;
                (WaitConstruct::Call { instance }, opened)
            }
            _ => {
                return Err(CompileError::codegen(format!(
                    "statement at {} carries a slot but cannot wait",
                    stmt.pos
                )))
            }
        };
        Ok(planned)
    }

    fn plan_loop_body(
        &mut self,
        st: &mut InstanceState,
        body: &'a [Stmt],
        cond: &Cond,
    ) -> Result<(Block, BTreeSet<SlotKey>), CompileError> {
        let outer = st.exposure;
        st.exposure = outer.looped();
        let planned = self.plan_block(st, body, None);
        st.exposure = outer;
        let (mut block, opened) = planned?;
        let head = block.head().map(|s| s.id).unwrap_or_default();
        if let Some(tail) = block.segments.last_mut() {
            tail.loop_back = Some(LoopBack {
                cond: cond.clone(),
                head,
            });
        }
        Ok((block, opened))
    }

    /// Instance a call site runs. Async callees get a derived instance,
    /// reused from the pool when an earlier call to it was already awaited;
    /// sync callees share their root instance.
    fn call_instance(
        &mut self,
        st: &mut InstanceState,
        target: &str,
        pos: Position,
        awaited: bool,
    ) -> Result<(InstanceId, BTreeSet<SlotKey>), CompileError> {
        let file = self.file;
        let func = file.function(target).ok_or_else(|| {
            CompileError::plan(pos, format!("call to undefined function '{}'", target))
        })?;
        if !self.graph.is_async(target) {
            let id = self.roots.get(target).copied().ok_or_else(|| {
                CompileError::codegen(format!("function '{}' has no root instance", target))
            })?;
            return Ok((id, BTreeSet::new()));
        }

        match (st.exposure, awaited) {
            (Exposure::Sequenced, _) | (Exposure::LoopBody, true) => {}
            (_, false) => {
                return Err(CompileError::plan(
                    pos,
                    format!(
                        "call to wait-bearing function '{}' inside a loop must wait on a queue slot, e.g. call {}()[Q]; otherwise iterations share its counters",
                        target, target
                    ),
                ))
            }
            (Exposure::Overlapping, true) => {
                return Err(CompileError::plan(
                    pos,
                    format!(
                        "call to wait-bearing function '{}' can run again on the next loop iteration before it finishes; wait on the enclosing 'if' or move the call to the top of the loop body",
                        target
                    ),
                ))
            }
        }

        if let Some(id) = st.free.get_mut(target).and_then(|pool| pool.pop()) {
            let keys = self.planned(id)?.all_keys.clone();
            tracing::trace!(instance = id, function = %target, "reusing awaited instance");
            st.used.push((target.to_owned(), id));
            return Ok((id, keys));
        }
        if self.instances.len() >= MAX_INSTANCES {
            return Err(CompileError::plan(
                pos,
                format!(
                    "call to '{}' in function '{}' needs more than {} function instances; nest fewer concurrent wait-bearing calls",
                    target, st.function, MAX_INSTANCES
                ),
            ));
        }
        let n = self.derived.entry(target.to_owned()).or_insert(0);
        *n += 1;
        let label = format!("{}-{}", target, n);
        let id = self.instances.len();
        self.instances.push(None);
        let opened = self.plan_instance(func, label, id, false)?;
        st.used.push((target.to_owned(), id));
        Ok((id, opened))
    }

    fn planned(&self, id: InstanceId) -> Result<&Instance, CompileError> {
        self.instances
            .get(id)
            .and_then(Option::as_ref)
            .ok_or_else(|| CompileError::codegen(format!("instance {} is not planned yet", id)))
    }

    fn plan_stmt(
        &mut self,
        st: &mut InstanceState,
        stmt: &'a Stmt,
        ops: &mut Vec<Op>,
        keys: &mut BTreeSet<SlotKey>,
    ) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Objectives(decls) => {
                for d in decls {
                    ops.push(Op::AddObjective {
                        name: d.name.clone(),
                        criteria: d.criteria.clone(),
                    });
                }
            }
            StmtKind::Vars(refs) => {
                for r in refs {
                    ops.push(Op::Score(ScoreOp::Set {
                        target: Holder::Score(r.clone()),
                        value: 0,
                    }));
                }
            }
            StmtKind::Const { .. } => {}
            StmtKind::Assign { target, op, value } => {
                let lowered = self.lower_assign(target, *op, value)?;
                st.uses_temp |= lowered.iter().any(touches_temp);
                ops.extend(lowered.into_iter().map(Op::Score));
            }
            StmtKind::If { cond, body, .. } => match self.cond(cond)? {
                Some(c) => {
                    let outer = st.exposure;
                    st.exposure = outer.branch();
                    let planned = self.plan_block(st, body, None);
                    st.exposure = outer;
                    let (block, opened) = planned?;
                    keys.extend(opened);
                    if !block.is_trivial() {
                        ops.push(Op::Branch {
                            cond: c,
                            body: block,
                        });
                    }
                }
                None => never_holds(cond),
            },
            StmtKind::While { cond, body, .. } => match self.cond(cond)? {
                Some(c) => {
                    let (block, opened) = self.plan_loop_body(st, body, &c)?;
                    keys.extend(opened);
                    ops.push(Op::Loop {
                        cond: c,
                        body: block,
                    });
                }
                None => never_holds(cond),
            },
            StmtKind::Call { target, .. } => {
                if self.symbols.functions.contains_key(target) {
                    let (id, opened) = self.call_instance(st, target, stmt.pos, false)?;
                    keys.extend(opened);
                    ops.push(Op::Call(CallTarget::Instance(id)));
                } else {
                    ops.push(Op::Call(CallTarget::External(target.clone())));
                }
            }
            StmtKind::Run(text) => {
                let value = self.substitute(text)?;
                if text.interpolated {
                    let message = value.strip_prefix("say ").unwrap_or(&value);
                    ops.push(Op::Tellraw(interpolate::components(message, true)));
                } else {
                    ops.push(Op::Command(value));
                }
            }
            StmtKind::Show(text) => {
                let value = self.substitute(text)?;
                ops.push(Op::Tellraw(interpolate::components(
                    &value,
                    text.interpolated,
                )));
            }
            StmtKind::Title { kind, text } => {
                let value = self.substitute(text)?;
                ops.push(Op::Title {
                    kind: *kind,
                    text: value,
                });
            }
            StmtKind::Rand { target, range } => {
                let (lo, hi) = match range {
                    Some((lo, hi)) => (self.int_value(lo)?, self.int_value(hi)?),
                    None => (0, 100),
                };
                ops.push(Op::Random {
                    target: target.clone(),
                    lo,
                    hi,
                });
            }
            StmtKind::Raw(lines) => {
                ops.extend(lines.iter().map(|l| Op::Command(l.text.clone())));
            }
        }
        Ok(())
    }

    fn substitute(&self, text: &Text) -> Result<String, CompileError> {
        interpolate::substitute_constants(&text.value, text.pos, self.symbols)
    }

    fn int_value(&self, o: &Operand) -> Result<i32, CompileError> {
        match o {
            Operand::Literal { value, .. } => Ok(*value),
            Operand::Const { name, pos } => int_constant(name, *pos, self.symbols),
            Operand::Score(r) => Err(CompileError::plan(
                r.pos,
                format!("expected an integer value, got score {}", r),
            )),
        }
    }

    /// `None` when the condition can never hold.
    fn cond(&self, c: &Condition) -> Result<Option<Cond>, CompileError> {
        let (op, rhs) = match &c.test {
            None => {
                return Ok(Some(Cond {
                    lhs: c.lhs.clone(),
                    test: CondTest::Range("1..".to_owned()),
                    negate: false,
                }))
            }
            Some((op, rhs)) => (*op, rhs),
        };
        if let Operand::Score(r) = rhs {
            let (symbol, negate) = match op {
                CmpOp::Eq => ("=", false),
                CmpOp::Ne => ("=", true),
                CmpOp::Lt => ("<", false),
                CmpOp::Le => ("<=", false),
                CmpOp::Gt => (">", false),
                CmpOp::Ge => (">=", false),
            };
            return Ok(Some(Cond {
                lhs: c.lhs.clone(),
                test: CondTest::Compare {
                    op: symbol,
                    rhs: r.clone(),
                },
                negate,
            }));
        }
        let v = self.int_value(rhs)?;
        let (range, negate) = match op {
            CmpOp::Eq => (format!("{}..{}", v, v), false),
            CmpOp::Ne => (format!("{}..{}", v, v), true),
            CmpOp::Le => (format!("..{}", v), false),
            CmpOp::Ge => (format!("{}..", v), false),
            CmpOp::Lt => match v.checked_sub(1) {
                Some(hi) => (format!("..{}", hi), false),
                None => return Ok(None),
            },
            CmpOp::Gt => match v.checked_add(1) {
                Some(lo) => (format!("{}..", lo), false),
                None => return Ok(None),
            },
        };
        Ok(Some(Cond {
            lhs: c.lhs.clone(),
            test: CondTest::Range(range),
            negate,
        }))
    }

    fn lower_assign(
        &self,
        target: &ScoreRef,
        op: AssignOp,
        value: &Expr,
    ) -> Result<Vec<ScoreOp>, CompileError> {
        let t = || Holder::Score(target.clone());
        let mut out = Vec::new();
        match (op, value) {
            (AssignOp::Set, Expr::Operand(Operand::Score(s))) => {
                if !s.same_score(target) {
                    out.push(operation(t(), OperationKind::Copy, Holder::Score(s.clone())));
                }
            }
            (AssignOp::Set, Expr::Operand(o)) => out.push(ScoreOp::Set {
                target: t(),
                value: self.int_value(o)?,
            }),
            (AssignOp::Add | AssignOp::Sub, Expr::Operand(Operand::Score(s))) => {
                let kind = if op == AssignOp::Add {
                    OperationKind::Add
                } else {
                    OperationKind::Sub
                };
                out.push(operation(t(), kind, Holder::Score(s.clone())));
            }
            (AssignOp::Add, Expr::Operand(o)) => add_literal(&mut out, t(), self.int_value(o)?),
            (AssignOp::Sub, Expr::Operand(o)) => {
                add_literal(&mut out, t(), self.int_value(o)?.wrapping_neg())
            }
            (AssignOp::Add | AssignOp::Sub, Expr::Binary { .. }) => {
                return Err(CompileError::plan(
                    target.pos,
                    "compound assignment takes a single operand",
                ))
            }
            (AssignOp::Set, Expr::Binary { op, left, right }) => {
                let kind = match op {
                    ArithOp::Add => OperationKind::Add,
                    ArithOp::Sub => OperationKind::Sub,
                };
                match (left, right) {
                    (Operand::Score(l), Operand::Score(r)) => {
                        if r.same_score(target) && !l.same_score(target) {
                            out.push(operation(
                                Holder::Temp,
                                OperationKind::Copy,
                                Holder::Score(r.clone()),
                            ));
                            out.push(operation(t(), OperationKind::Copy, Holder::Score(l.clone())));
                            out.push(operation(t(), kind, Holder::Temp));
                        } else {
                            if !l.same_score(target) {
                                out.push(operation(
                                    t(),
                                    OperationKind::Copy,
                                    Holder::Score(l.clone()),
                                ));
                            }
                            out.push(operation(t(), kind, Holder::Score(r.clone())));
                        }
                    }
                    (Operand::Score(l), lit) => {
                        if !l.same_score(target) {
                            out.push(operation(t(), OperationKind::Copy, Holder::Score(l.clone())));
                        }
                        let n = self.int_value(lit)?;
                        let n = if *op == ArithOp::Add {
                            n
                        } else {
                            n.wrapping_neg()
                        };
                        add_literal(&mut out, t(), n);
                    }
                    (lit, Operand::Score(r)) => {
                        let n = self.int_value(lit)?;
                        match (op, r.same_score(target)) {
                            (ArithOp::Add, true) => add_literal(&mut out, t(), n),
                            (ArithOp::Sub, true) => {
                                out.push(operation(
                                    Holder::Temp,
                                    OperationKind::Copy,
                                    Holder::Score(r.clone()),
                                ));
                                out.push(ScoreOp::Set {
                                    target: t(),
                                    value: n,
                                });
                                out.push(operation(t(), OperationKind::Sub, Holder::Temp));
                            }
                            (_, false) => {
                                out.push(ScoreOp::Set {
                                    target: t(),
                                    value: n,
                                });
                                out.push(operation(t(), kind, Holder::Score(r.clone())));
                            }
                        }
                    }
                    (lit, _) => {
                        return Err(CompileError::plan(
                            lit.pos(),
                            "score arithmetic needs a score reference on at least one side",
                        ))
                    }
                }
            }
        }
        Ok(out)
    }
}

fn operation(target: Holder, kind: OperationKind, source: Holder) -> ScoreOp {
    ScoreOp::Operation {
        target,
        kind,
        source,
    }
}

/// `scoreboard players add/remove` cannot express `i32::MIN`; that value
/// goes through the temp holder instead (wrapping arithmetic agrees).
fn add_literal(out: &mut Vec<ScoreOp>, target: Holder, value: i32) {
    if value == 0 {
        return;
    }
    if value == i32::MIN {
        out.push(ScoreOp::Set {
            target: Holder::Temp,
            value,
        });
        out.push(operation(target, OperationKind::Add, Holder::Temp));
    } else {
        out.push(ScoreOp::Add { target, value });
    }
}

fn touches_temp(op: &ScoreOp) -> bool {
    match op {
        ScoreOp::Set { target, .. } | ScoreOp::Add { target, .. } => *target == Holder::Temp,
        ScoreOp::Operation { target, source, .. } => {
            *target == Holder::Temp || *source == Holder::Temp
        }
    }
}

fn never_holds(cond: &Condition) {
    tracing::warn!(
        score = %cond.lhs,
        line = cond.lhs.pos.line,
        "condition can never hold; its body is never entered"
    );
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
