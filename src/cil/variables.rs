use crate::cil::Error;
use crate::metadata::TypeId;
use std::fmt;
use std::ops::Index;

/// Stable handle to a variable slot allocated by a [`VariableSlots`]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VariableId(pub(crate) usize);

impl fmt::Debug for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A local variable of a method body
#[derive(Clone, Debug)]
pub struct VariableSlot<'g> {
    pub variable_type: TypeId<'g>,
    index: Option<usize>,
}

impl<'g> VariableSlot<'g> {
    /// Raw index reported for a slot that is not in any sequence
    pub const DETACHED_INDEX: i32 = -1;

    /// Position in the owning sequence, `None` when detached
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Position in the owning sequence, or [`Self::DETACHED_INDEX`] when detached
    pub fn raw_index(&self) -> i32 {
        self.index.map_or(Self::DETACHED_INDEX, |index| index as i32)
    }
}

/// Ordered local variables of a method body
///
/// Unlike instructions, variable indices are renumbered eagerly: after any edit, every member's
/// index equals its position. Variable lists are short, so the linear renumbering is cheap.
#[derive(Clone, Debug, Default)]
pub struct VariableSlots<'g> {
    slots: Vec<VariableSlot<'g>>,
    order: Vec<VariableId>,
}

impl<'g> VariableSlots<'g> {
    pub fn new() -> VariableSlots<'g> {
        VariableSlots {
            slots: vec![],
            order: vec![],
        }
    }

    /// Allocate a new detached slot
    pub fn create(&mut self, variable_type: TypeId<'g>) -> VariableId {
        let id = VariableId(self.slots.len());
        self.slots.push(VariableSlot {
            variable_type,
            index: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Variable at a position
    pub fn get(&self, position: usize) -> Option<VariableId> {
        self.order.get(position).copied()
    }

    pub fn slot(&self, id: VariableId) -> Option<&VariableSlot<'g>> {
        self.slots.get(id.0)
    }

    pub fn contains(&self, id: VariableId) -> bool {
        self.slot(id).map_or(false, |slot| slot.index.is_some())
    }

    /// Members, in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (VariableId, &VariableSlot<'g>)> + '_ {
        self.order.iter().map(|id| (*id, &self.slots[id.0]))
    }

    fn check_detached(&self, id: VariableId) -> Result<(), Error> {
        match self.slot(id) {
            None => Err(Error::UnknownVariable(id)),
            Some(slot) if slot.index.is_some() => Err(Error::VariableAlreadyMember(id)),
            Some(_) => Ok(()),
        }
    }

    fn check_position(&self, position: usize, allow_end: bool) -> Result<(), Error> {
        let len = self.order.len();
        if position < len || (allow_end && position == len) {
            Ok(())
        } else {
            Err(Error::PositionOutOfRange { position, len })
        }
    }

    /// Renumber every member from `from` onwards
    fn renumber(&mut self, from: usize) {
        for (position, id) in self.order.iter().enumerate().skip(from) {
            self.slots[id.0].index = Some(position);
        }
    }

    pub fn append(&mut self, id: VariableId) -> Result<(), Error> {
        self.check_detached(id)?;
        self.order.push(id);
        self.renumber(self.order.len() - 1);
        Ok(())
    }

    /// Insert a variable before the one currently at `position`, shifting later ones up
    pub fn insert(&mut self, position: usize, id: VariableId) -> Result<(), Error> {
        self.check_position(position, true)?;
        self.check_detached(id)?;
        self.order.insert(position, id);
        self.renumber(position);
        Ok(())
    }

    /// Replace the variable at `position`, returning the replaced one (now detached)
    pub fn replace(&mut self, position: usize, id: VariableId) -> Result<VariableId, Error> {
        self.check_position(position, false)?;
        self.check_detached(id)?;
        let replaced = std::mem::replace(&mut self.order[position], id);
        self.slots[replaced.0].index = None;
        self.slots[id.0].index = Some(position);
        Ok(replaced)
    }

    /// Remove the variable at `position`, shifting later ones down
    ///
    /// Instructions that still mention the removed variable are left as they are.
    pub fn remove(&mut self, position: usize) -> Result<VariableId, Error> {
        self.check_position(position, false)?;
        let removed = self.order.remove(position);
        self.slots[removed.0].index = None;
        self.renumber(position);
        log::trace!("removed variable {:?} from {}", removed, position);
        Ok(removed)
    }
}

impl<'g> Index<VariableId> for VariableSlots<'g> {
    type Output = VariableSlot<'g>;

    fn index(&self, id: VariableId) -> &VariableSlot<'g> {
        &self.slots[id.0]
    }
}
