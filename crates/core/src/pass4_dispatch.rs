//! Pass 4: Dispatcher synthesis -- resume ordinals, per-instance segment
//! selectors and one watcher per queue slot.
//!
//! Every gated continuation that emits something gets a global resume
//! ordinal (0 means idle). A watcher that sees all descendants of its slot
//! closed writes its continuation's ordinal to `#resume` and calls the main
//! dispatcher, which jumps to the owning instance's selector.

use crate::pass3_plan::{Block, InstanceId, Op, ProgramPlan, WaitConstruct};
use crate::watch::{SlotKey, Watcher};
use std::collections::{BTreeMap, BTreeSet};

/// A gated continuation segment reachable through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resume {
    pub ordinal: u32,
    pub instance: InstanceId,
    pub segment: u32,
}

/// Jump table of one instance over its resume ordinals.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub instance: InstanceId,
    pub entries: Vec<Resume>,
}

impl Selector {
    /// Inclusive ordinal range routed to this selector.
    pub fn range(&self) -> Option<(u32, u32)> {
        let first = self.entries.first()?.ordinal;
        let last = self.entries.last()?.ordinal;
        Some((first, last))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatcherSpec {
    pub key: SlotKey,
    pub instance: InstanceId,
    /// Watcher number within the instance.
    pub index: u32,
    pub descendants: BTreeSet<SlotKey>,
    /// Ordinal of the continuation; `None` when it has nothing to run.
    pub release: Option<u32>,
}

impl WatcherSpec {
    /// The state machine this watcher's artifact implements.
    pub fn model(&self) -> Watcher {
        Watcher::new(self.key.clone(), self.descendants.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DispatchPlan {
    pub resumes: Vec<Resume>,
    /// One per instance that has at least one resume, in instance order.
    pub selectors: Vec<Selector>,
    /// Instance order, then watcher number.
    pub watchers: Vec<WatcherSpec>,
    /// Every counter the program can open.
    pub slot_keys: BTreeSet<SlotKey>,
}

impl DispatchPlan {
    pub fn is_empty(&self) -> bool {
        self.slot_keys.is_empty()
    }

    pub fn watcher(&self, key: &SlotKey) -> Option<&WatcherSpec> {
        self.watchers.iter().find(|w| &w.key == key)
    }

    pub fn resume_ordinal(&self, instance: InstanceId, segment: u32) -> Option<u32> {
        self.resumes
            .iter()
            .find(|r| r.instance == instance && r.segment == segment)
            .map(|r| r.ordinal)
    }
}

pub fn synthesize(plan: &ProgramPlan) -> DispatchPlan {
    let mut out = DispatchPlan {
        slot_keys: plan.slot_keys(),
        ..DispatchPlan::default()
    };

    let mut next = 1u32;
    let mut ordinals: BTreeMap<(InstanceId, u32), u32> = BTreeMap::new();
    for inst in &plan.instances {
        let mut entries = Vec::new();
        for seg in inst.segments() {
            if seg.gate.is_none() || seg.is_trivial() {
                continue;
            }
            let resume = Resume {
                ordinal: next,
                instance: inst.id,
                segment: seg.id,
            };
            next += 1;
            ordinals.insert((inst.id, seg.id), resume.ordinal);
            entries.push(resume);
        }
        out.resumes.extend(entries.iter().copied());
        if !entries.is_empty() {
            out.selectors.push(Selector {
                instance: inst.id,
                entries,
            });
        }
    }

    for inst in &plan.instances {
        let mut specs = Vec::new();
        collect_watchers(&inst.body, inst.id, &ordinals, &mut specs);
        specs.sort_by_key(|w| w.index);
        out.watchers.extend(specs);
    }

    tracing::debug!(
        resumes = out.resumes.len(),
        selectors = out.selectors.len(),
        watchers = out.watchers.len(),
        "synthesized dispatcher"
    );
    out
}

fn collect_watchers(
    block: &Block,
    instance: InstanceId,
    ordinals: &BTreeMap<(InstanceId, u32), u32>,
    out: &mut Vec<WatcherSpec>,
) {
    for (i, seg) in block.segments.iter().enumerate() {
        for op in &seg.ops {
            if let Op::Branch { body, .. } | Op::Loop { body, .. } = op {
                collect_watchers(body, instance, ordinals, out);
            }
        }
        let Some(wait) = &seg.wait else {
            continue;
        };
        if let WaitConstruct::If { body, .. } | WaitConstruct::While { body, .. } = &wait.construct
        {
            collect_watchers(body, instance, ordinals, out);
        }
        let release = block
            .segments
            .get(i + 1)
            .and_then(|next| ordinals.get(&(instance, next.id)).copied());
        out.push(WatcherSpec {
            key: wait.slot.key.clone(),
            instance,
            index: wait.slot.watcher,
            descendants: wait.slot.descendants.clone(),
            release,
        });
    }
}
