//! Temporary storage locations and their reference ownership.
//!
//! Every value computed while emitting an expression lives in a named
//! temporary. A temporary is either **owned** (holds a reference the
//! emitted code must give up) or **borrowed**. Each temporary is consumed
//! exactly once, either by a release or by handing it off as a result;
//! touching it afterwards is an [`EmitError`].
//!
//! The allocator tracks one statement at a time. At the end of a
//! statement every temporary allocated for it must have been consumed.

use rustc_hash::FxHashMap;

use crate::EmitError;

/// C type of reference-counted values.
pub const OBJECT_TYPE: &str = "PyObject *";

/// Handle to one temporary of the current function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(u32);

impl TempId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ownership tag given at allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    Owned,
    Borrowed,
}

/// Lifecycle of one temporary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TempState {
    Owned,
    Borrowed,
    /// Consumed by a release.
    Released,
    /// Consumed by becoming part of a result.
    HandedOff,
}

impl TempState {
    fn is_live(self) -> bool {
        matches!(self, TempState::Owned | TempState::Borrowed)
    }
}

/// Bookkeeping for one statement.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TempStats {
    pub allocated: usize,
    /// Temporaries consumed by a release, with or without emitted code.
    pub released: usize,
    pub handed_off: usize,
    /// Releases that emitted a reference decrement.
    pub decrefs: usize,
}

#[derive(Clone, Debug)]
struct TempSlot {
    name: String,
    c_type: &'static str,
    state: TempState,
}

impl TempSlot {
    fn holds_reference(&self) -> bool {
        self.state == TempState::Owned && self.c_type == OBJECT_TYPE
    }
}

#[derive(Clone, Debug, Default)]
pub struct TempAllocator {
    slots: Vec<TempSlot>,
    counters: FxHashMap<String, u32>,
    statement_start: usize,
    stats: TempStats,
}

impl TempAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `tmp_<purpose>_<n>`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "temporary counts never exceed u32"
    )]
    pub fn allocate(&mut self, purpose: &str, c_type: &'static str, ownership: Ownership) -> TempId {
        let counter = self.counters.entry(purpose.to_owned()).or_insert(0);
        *counter += 1;
        let id = TempId(self.slots.len() as u32);
        self.slots.push(TempSlot {
            name: format!("tmp_{purpose}_{counter}"),
            c_type,
            state: match ownership {
                Ownership::Owned => TempState::Owned,
                Ownership::Borrowed => TempState::Borrowed,
            },
        });
        self.stats.allocated += 1;
        id
    }

    fn slot(&self, id: TempId) -> Result<&TempSlot, EmitError> {
        self.slots
            .get(id.index())
            .ok_or(EmitError::UnknownTemporary { index: id.index() })
    }

    fn slot_mut(&mut self, id: TempId) -> Result<&mut TempSlot, EmitError> {
        self.slots
            .get_mut(id.index())
            .ok_or(EmitError::UnknownTemporary { index: id.index() })
    }

    /// The C name of a live temporary.
    pub fn name(&self, id: TempId) -> Result<&str, EmitError> {
        let slot = self.slot(id)?;
        if slot.state.is_live() {
            Ok(&slot.name)
        } else {
            Err(EmitError::UseAfterRelease {
                temp: slot.name.clone(),
            })
        }
    }

    pub fn c_type(&self, id: TempId) -> Result<&'static str, EmitError> {
        Ok(self.slot(id)?.c_type)
    }

    pub fn state(&self, id: TempId) -> Result<TempState, EmitError> {
        Ok(self.slot(id)?.state)
    }

    /// Consume a temporary by releasing it.
    ///
    /// Returns the decrement to emit for owned object temporaries.
    pub fn release(&mut self, id: TempId) -> Result<Option<String>, EmitError> {
        let slot = self.slot_mut(id)?;
        if !slot.state.is_live() {
            return Err(EmitError::DoubleRelease {
                temp: slot.name.clone(),
            });
        }
        let code = slot
            .holds_reference()
            .then(|| format!("Py_DECREF({});", slot.name));
        slot.state = TempState::Released;
        self.stats.released += 1;
        if code.is_some() {
            self.stats.decrefs += 1;
        }
        Ok(code)
    }

    /// Consume a temporary by transferring it into a result.
    pub fn hand_off(&mut self, id: TempId) -> Result<(), EmitError> {
        let slot = self.slot_mut(id)?;
        if !slot.state.is_live() {
            return Err(EmitError::UseAfterRelease {
                temp: slot.name.clone(),
            });
        }
        slot.state = TempState::HandedOff;
        self.stats.handed_off += 1;
        Ok(())
    }

    /// Make a borrowed object temporary owned.
    ///
    /// Returns the increment to emit, if one is needed.
    pub fn take_reference(&mut self, id: TempId) -> Result<Option<String>, EmitError> {
        let slot = self.slot_mut(id)?;
        match slot.state {
            TempState::Owned => Ok(None),
            TempState::Borrowed => {
                slot.state = TempState::Owned;
                Ok((slot.c_type == OBJECT_TYPE).then(|| format!("Py_INCREF({});", slot.name)))
            }
            TempState::Released | TempState::HandedOff => Err(EmitError::UseAfterRelease {
                temp: slot.name.clone(),
            }),
        }
    }

    /// Take over the reference just stored in a borrowed temporary.
    ///
    /// Results are allocated borrowed so that their own failure check
    /// does not release them, and adopted once the check has passed.
    pub fn adopt(&mut self, id: TempId) -> Result<(), EmitError> {
        let slot = self.slot_mut(id)?;
        match slot.state {
            TempState::Borrowed => {
                slot.state = TempState::Owned;
                Ok(())
            }
            TempState::Owned => Ok(()),
            TempState::Released | TempState::HandedOff => Err(EmitError::UseAfterRelease {
                temp: slot.name.clone(),
            }),
        }
    }

    /// Decrements for every live owned temporary of the statement, in
    /// allocation order. The temporaries stay live.
    pub fn failure_releases(&self) -> Vec<String> {
        self.slots[self.statement_start..]
            .iter()
            .filter(|slot| slot.holds_reference())
            .map(|slot| format!("Py_DECREF({});", slot.name))
            .collect()
    }

    /// Consume every live temporary of the statement for a path that
    /// leaves it for good, returning the decrements to emit.
    pub fn abandon_live(&mut self) -> Vec<String> {
        let mut code = Vec::new();
        for slot in &mut self.slots[self.statement_start..] {
            if !slot.state.is_live() {
                continue;
            }
            if slot.holds_reference() {
                code.push(format!("Py_DECREF({});", slot.name));
                self.stats.decrefs += 1;
            }
            slot.state = TempState::Released;
            self.stats.released += 1;
        }
        code
    }

    /// Close the current statement.
    ///
    /// Fails when a temporary allocated for it is still live.
    pub fn finish_statement(&mut self) -> Result<TempStats, EmitError> {
        let leaked: Vec<String> = self.slots[self.statement_start..]
            .iter()
            .filter(|slot| slot.state.is_live())
            .map(|slot| slot.name.clone())
            .collect();
        self.statement_start = self.slots.len();
        let stats = std::mem::take(&mut self.stats);
        if leaked.is_empty() {
            Ok(stats)
        } else {
            Err(EmitError::LeakedTemporaries { temps: leaked })
        }
    }

    /// Every temporary ever allocated, as `(c_type, name)`.
    pub fn declarations(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.slots.iter().map(|slot| (slot.c_type, slot.name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
