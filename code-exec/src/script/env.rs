use std::collections::HashMap;

use super::budget::Budget;
use super::error::ScriptResult;
use super::value::Value;

/// Index of a frame in [`Environments`].
pub type EnvId = usize;

/// Fixed cost charged for every live frame.
const FRAME_COST: u64 = 64;
/// Fixed cost charged per binding on top of the name and payload bytes.
const BINDING_COST: u64 = 32;

#[derive(Debug)]
struct Frame {
    vars: HashMap<String, Value>,
    parent: Option<EnvId>,
    /// Set once a closure may refer to this frame; captured frames live until
    /// the whole evaluation is dropped.
    captured: bool,
    retained: u64,
}

impl Frame {
    fn new(parent: Option<EnvId>) -> Self {
        Self {
            vars: HashMap::new(),
            parent,
            captured: false,
            retained: FRAME_COST,
        }
    }
}

fn binding_cost(name: &str, value: &Value) -> u64 {
    BINDING_COST + name.len() as u64 + value.heap_size()
}

/// Arena of lexical scopes for one evaluation. Frames are addressed by index
/// so closures never form reference cycles; uncaptured frames are recycled
/// when their call or block unwinds.
#[derive(Debug)]
pub struct Environments {
    frames: Vec<Option<Frame>>,
    free: Vec<EnvId>,
}

impl Environments {
    pub const GLOBAL: EnvId = 0;

    /// Create the arena with a global frame pre-populated with `globals`.
    /// Pre-populated bindings are not charged against the memory budget.
    pub fn with_globals(globals: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut global = Frame::new(None);
        global.captured = true;
        global.vars.extend(globals);
        Self {
            frames: vec![Some(global)],
            free: Vec::new(),
        }
    }

    pub fn push(&mut self, parent: EnvId, budget: &mut Budget) -> ScriptResult<EnvId> {
        budget.charge(FRAME_COST)?;
        let frame = Some(Frame::new(Some(parent)));
        let id = match self.free.pop() {
            Some(id) => {
                self.frames[id] = frame;
                id
            }
            None => {
                self.frames.push(frame);
                self.frames.len() - 1
            }
        };
        Ok(id)
    }

    /// Drop the frame unless a closure captured it.
    pub fn release(&mut self, env: EnvId, budget: &mut Budget) {
        let Some(frame) = self.frames.get(env).and_then(Option::as_ref) else {
            return;
        };
        if frame.captured || env == Self::GLOBAL {
            return;
        }
        budget.release(frame.retained);
        self.frames[env] = None;
        self.free.push(env);
    }

    /// Mark `env` and every ancestor as captured by a closure.
    pub fn capture(&mut self, env: EnvId) {
        let mut current = Some(env);
        while let Some(id) = current {
            match self.frames.get_mut(id).and_then(Option::as_mut) {
                Some(frame) if !frame.captured => {
                    frame.captured = true;
                    current = frame.parent;
                }
                _ => break,
            }
        }
    }

    /// Bind `name` in `env`, shadowing any outer binding.
    pub fn define(
        &mut self,
        env: EnvId,
        name: &str,
        value: Value,
        budget: &mut Budget,
    ) -> ScriptResult<()> {
        let Some(frame) = self.frames.get_mut(env).and_then(Option::as_mut) else {
            return Ok(());
        };
        let cost = binding_cost(name, &value);
        budget.charge(cost)?;
        frame.retained += cost;
        if let Some(old) = frame.vars.insert(name.to_string(), value) {
            let old_cost = binding_cost(name, &old);
            frame.retained = frame.retained.saturating_sub(old_cost);
            budget.release(old_cost);
        }
        Ok(())
    }

    /// Overwrite the nearest existing binding of `name`. Returns `Ok(false)`
    /// when no scope in the chain defines it.
    pub fn assign(
        &mut self,
        env: EnvId,
        name: &str,
        value: Value,
        budget: &mut Budget,
    ) -> ScriptResult<bool> {
        let Some(owner) = self.resolve(env, name) else {
            return Ok(false);
        };
        self.define(owner, name, value, budget)?;
        Ok(true)
    }

    /// Walk from `env` outwards to the global frame.
    pub fn lookup(&self, env: EnvId, name: &str) -> Option<Value> {
        let owner = self.resolve(env, name)?;
        self.frames[owner].as_ref()?.vars.get(name).cloned()
    }

    fn resolve(&self, env: EnvId, name: &str) -> Option<EnvId> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = self.frames.get(id)?.as_ref()?;
            if frame.vars.contains_key(name) {
                return Some(id);
            }
            current = frame.parent;
        }
        None
    }

    /// Frames currently alive, including the global one.
    pub fn live_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}
