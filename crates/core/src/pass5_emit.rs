//! Pass 5: Code generation -- render the planned segment tree and the
//! dispatcher into `.mcfunction` artifacts.
//!
//! Resource layout under `<namespace>/<out_root>/`:
//!
//! - `<function>` -- host entry of every function (its root instance)
//! - `__mcfn/<instance>/s<k>` -- every other non-trivial segment
//! - `__mcfn/<instance>/w<k>` -- watcher of the instance's k-th slot
//! - `__mcfn/<instance>/select` -- resume jump table of an instance
//! - `__mcfn/dispatch`, `__mcfn/any_open`, `__mcfn/load`
//!
//! Function tags go to `minecraft/tags/<out_root>/`: `load.json` runs
//! `__mcfn/load` and then `_ready` when the program defines it, and
//! `tick.json` runs `_tick` when defined.
//!
//! Output is a `BTreeMap`, so identical plans render byte-identical maps.

use crate::config::TranspileConfig;
use crate::error::CompileError;
use crate::interpolate;
use crate::pass3_plan::*;
use crate::pass4_dispatch::{DispatchPlan, WatcherSpec};
use crate::watch::SlotKey;
use crate::{LOAD_HOOK, RUNTIME_DIR, RUNTIME_OBJECTIVE, TICK_HOOK};
use serde::Serialize;
use std::collections::BTreeMap;

/// Artifact path -> artifact text.
pub type ArtifactMap = BTreeMap<String, String>;

const RESUME: &str = "#resume";
const OPEN: &str = "#open";
const ANY_OPEN: &str = "#any_open";
const TEMP: &str = "#tmp";

pub fn dispatch_resource() -> String {
    format!("{}/dispatch", RUNTIME_DIR)
}

pub fn any_open_resource() -> String {
    format!("{}/any_open", RUNTIME_DIR)
}

pub fn load_resource() -> String {
    format!("{}/load", RUNTIME_DIR)
}

pub fn segment_resource(inst: &Instance, segment: u32) -> String {
    if inst.root && segment == 0 {
        inst.function.clone()
    } else {
        format!("{}/{}/s{}", RUNTIME_DIR, inst.label, segment)
    }
}

pub fn watcher_resource(inst: &Instance, index: u32) -> String {
    format!("{}/{}/w{}", RUNTIME_DIR, inst.label, index)
}

pub fn selector_resource(inst: &Instance) -> String {
    format!("{}/{}/select", RUNTIME_DIR, inst.label)
}

fn runtime(holder: &str) -> String {
    format!("{} {}", holder, RUNTIME_OBJECTIVE)
}

fn holder(h: &Holder) -> String {
    match h {
        Holder::Score(r) => format!("{} {}", r.name, r.objective),
        Holder::Temp => runtime(TEMP),
    }
}

fn slot(key: &SlotKey) -> String {
    runtime(&key.to_string())
}

/// `data/minecraft/tags/<registry>/<tag>.json`
#[derive(Serialize)]
struct FunctionTag {
    values: Vec<String>,
}

struct Emitter<'a> {
    plan: &'a ProgramPlan,
    dispatch: &'a DispatchPlan,
    config: &'a TranspileConfig,
    out: ArtifactMap,
}

pub fn emit(
    plan: &ProgramPlan,
    dispatch: &DispatchPlan,
    config: &TranspileConfig,
) -> Result<ArtifactMap, CompileError> {
    let mut em = Emitter {
        plan,
        dispatch,
        config,
        out: ArtifactMap::new(),
    };

    for inst in &plan.instances {
        for seg in inst.segments() {
            let entry = inst.root && seg.id == 0;
            if seg.is_trivial() && !entry {
                continue;
            }
            let mut lines = Vec::new();
            if entry && (inst.is_async() || inst.uses_temp) {
                lines.push(format!("scoreboard objectives add {} dummy", RUNTIME_OBJECTIVE));
            }
            em.segment_lines(inst, seg, &mut lines)?;
            em.write(&segment_resource(inst, seg.id), lines)?;
        }
    }

    for watcher in &dispatch.watchers {
        let inst = em.instance(watcher.instance)?;
        let lines = em.watcher_lines(inst, watcher)?;
        em.write(&watcher_resource(inst, watcher.index), lines)?;
    }

    for selector in &dispatch.selectors {
        let inst = em.instance(selector.instance)?;
        let lines = selector
            .entries
            .iter()
            .map(|r| {
                format!(
                    "execute if score {} matches {} run function {}",
                    runtime(RESUME),
                    r.ordinal,
                    em.id(&segment_resource(inst, r.segment))
                )
            })
            .collect();
        em.write(&selector_resource(inst), lines)?;
    }

    let load = em.load_lines();
    em.write(&load_resource(), load)?;
    let mut on_load = vec![em.id(&load_resource())];
    if let Some(ready) = plan.root(LOAD_HOOK) {
        on_load.push(em.id(&segment_resource(ready, 0)));
    }
    em.write_tag("load", on_load)?;
    if let Some(tick) = plan.root(TICK_HOOK) {
        let on_tick = vec![em.id(&segment_resource(tick, 0))];
        em.write_tag("tick", on_tick)?;
    }
    if !dispatch.is_empty() {
        let main = em.dispatch_lines()?;
        em.write(&dispatch_resource(), main)?;
        let any_open = em.any_open_lines();
        em.write(&any_open_resource(), any_open)?;
    }

    tracing::debug!(artifacts = em.out.len(), "emitted artifacts");
    Ok(em.out)
}

impl<'a> Emitter<'a> {
    fn instance(&self, id: InstanceId) -> Result<&'a Instance, CompileError> {
        self.plan
            .instance(id)
            .ok_or_else(|| CompileError::codegen(format!("unknown function instance {}", id)))
    }

    fn id(&self, resource: &str) -> String {
        self.config.function_id(resource)
    }

    fn write(&mut self, resource: &str, lines: Vec<String>) -> Result<(), CompileError> {
        let path = self.config.artifact_path(resource);
        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        if self.out.insert(path.clone(), text).is_some() {
            return Err(CompileError::codegen(format!(
                "artifact path collision: {}",
                path
            )));
        }
        Ok(())
    }

    fn write_tag(&mut self, tag: &str, values: Vec<String>) -> Result<(), CompileError> {
        let path = self.config.tag_path(tag);
        let mut text = serde_json::to_string_pretty(&FunctionTag { values })
            .map_err(|e| CompileError::codegen(format!("function tag '{}': {}", tag, e)))?;
        text.push('\n');
        if self.out.insert(path.clone(), text).is_some() {
            return Err(CompileError::codegen(format!(
                "artifact path collision: {}",
                path
            )));
        }
        Ok(())
    }

    fn cond_prefix(&self, cond: &Cond) -> String {
        let mode = if cond.negate { "unless" } else { "if" };
        let lhs = format!("{} {}", cond.lhs.name, cond.lhs.objective);
        match &cond.test {
            CondTest::Range(range) => {
                format!("execute {} score {} matches {}", mode, lhs, range)
            }
            CondTest::Compare { op, rhs } => format!(
                "execute {} score {} {} {} {}",
                mode, lhs, op, rhs.name, rhs.objective
            ),
        }
    }

    fn enter_block(
        &self,
        inst: &Instance,
        cond: &Cond,
        body: &Block,
    ) -> Option<String> {
        let head = body.head().filter(|_| !body.is_trivial())?;
        Some(format!(
            "{} run function {}",
            self.cond_prefix(cond),
            self.id(&segment_resource(inst, head.id))
        ))
    }

    fn segment_lines(
        &self,
        inst: &Instance,
        seg: &Segment,
        lines: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        for op in &seg.ops {
            self.op_lines(inst, op, lines)?;
        }
        if let Some(wait) = &seg.wait {
            lines.push(format!("scoreboard players set {} 1", slot(&wait.slot.key)));
            match &wait.construct {
                WaitConstruct::If {
                    cond: Some(cond),
                    body,
                }
                | WaitConstruct::While {
                    cond: Some(cond),
                    body,
                } => lines.extend(self.enter_block(inst, cond, body)),
                WaitConstruct::If { cond: None, .. } | WaitConstruct::While { cond: None, .. } => {}
                WaitConstruct::Call { instance } => {
                    let callee = self.instance(*instance)?;
                    lines.push(format!(
                        "function {}",
                        self.id(&segment_resource(callee, 0))
                    ));
                }
            }
            lines.push(format!(
                "schedule function {} 1t replace",
                self.id(&watcher_resource(inst, wait.slot.watcher))
            ));
        }
        if let Some(back) = &seg.loop_back {
            lines.push(format!(
                "{} run function {}",
                self.cond_prefix(&back.cond),
                self.id(&segment_resource(inst, back.head))
            ));
        }
        Ok(())
    }

    fn op_lines(
        &self,
        inst: &Instance,
        op: &Op,
        lines: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        let audience = &self.config.audience;
        match op {
            Op::Score(ScoreOp::Set { target, value }) => {
                lines.push(format!("scoreboard players set {} {}", holder(target), value));
            }
            Op::Score(ScoreOp::Add { target, value }) => {
                let verb = if *value < 0 { "remove" } else { "add" };
                lines.push(format!(
                    "scoreboard players {} {} {}",
                    verb,
                    holder(target),
                    value.unsigned_abs()
                ));
            }
            Op::Score(ScoreOp::Operation {
                target,
                kind,
                source,
            }) => {
                lines.push(format!(
                    "scoreboard players operation {} {} {}",
                    holder(target),
                    kind.symbol(),
                    holder(source)
                ));
            }
            Op::AddObjective { name, criteria } => {
                lines.push(format!("scoreboard objectives add {} {}", name, criteria));
            }
            Op::Command(text) => lines.push(text.clone()),
            Op::Tellraw(components) => {
                lines.push(format!(
                    "tellraw {} {}",
                    audience,
                    interpolate::to_json(components)?
                ));
            }
            Op::Title { kind, text } => {
                let json = interpolate::to_json(&serde_json::json!({ "text": text }))?;
                lines.push(format!("title {} {} {}", audience, kind.as_str(), json));
            }
            Op::Random { target, lo, hi } => {
                lines.push(format!(
                    "execute store result score {} {} run random value {}..{}",
                    target.name, target.objective, lo, hi
                ));
            }
            Op::Call(CallTarget::Instance(id)) => {
                let callee = self.instance(*id)?;
                lines.push(format!(
                    "function {}",
                    self.id(&segment_resource(callee, 0))
                ));
            }
            Op::Call(CallTarget::External(name)) => {
                lines.push(format!("function {}", self.id(name)));
            }
            Op::Branch { cond, body } | Op::Loop { cond, body } => {
                lines.extend(self.enter_block(inst, cond, body));
            }
        }
        Ok(())
    }

    fn watcher_lines(
        &self,
        inst: &Instance,
        w: &WatcherSpec,
    ) -> Result<Vec<String>, CompileError> {
        let mut release = vec![format!("scoreboard players set {} 0", slot(&w.key))];
        if let Some(ordinal) = w.release {
            release.push(format!(
                "scoreboard players set {} {}",
                runtime(RESUME),
                ordinal
            ));
            release.push(format!("function {}", self.id(&dispatch_resource())));
        }
        if w.descendants.is_empty() {
            return Ok(release);
        }

        let open = runtime(OPEN);
        let mut lines = vec![format!("scoreboard players set {} 0", open)];
        for d in &w.descendants {
            lines.push(format!(
                "execute if score {} matches 1.. run scoreboard players set {} 1",
                slot(d),
                open
            ));
        }
        lines.push(format!(
            "execute if score {} matches 1 run schedule function {} 1t replace",
            open,
            self.id(&watcher_resource(inst, w.index))
        ));
        for line in release {
            lines.push(format!("execute if score {} matches 0 run {}", open, line));
        }
        Ok(lines)
    }

    fn dispatch_lines(&self) -> Result<Vec<String>, CompileError> {
        let mut lines = Vec::new();
        for selector in &self.dispatch.selectors {
            let inst = self.instance(selector.instance)?;
            let Some((first, last)) = selector.range() else {
                continue;
            };
            let range = if first == last {
                first.to_string()
            } else {
                format!("{}..{}", first, last)
            };
            lines.push(format!(
                "execute if score {} matches {} run function {}",
                runtime(RESUME),
                range,
                self.id(&selector_resource(inst))
            ));
        }
        Ok(lines)
    }

    fn any_open_lines(&self) -> Vec<String> {
        let flag = runtime(ANY_OPEN);
        let mut lines = vec![format!("scoreboard players set {} 0", flag)];
        for key in &self.dispatch.slot_keys {
            lines.push(format!(
                "execute if score {} matches 1.. run scoreboard players set {} 1",
                slot(key),
                flag
            ));
        }
        lines
    }

    fn load_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("scoreboard objectives add {} dummy", RUNTIME_OBJECTIVE),
            format!("scoreboard players set {} 0", runtime(RESUME)),
        ];
        for key in &self.dispatch.slot_keys {
            lines.push(format!("scoreboard players set {} 0", slot(key)));
        }
        lines
    }
}
