use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Rights an identity may hold on an object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PermissionFlags: u8 {
        const SELECT = 0b0001;
        const INSERT = 0b0010;
        const UPDATE = 0b0100;
        const DELETE = 0b1000;
    }
}

impl PermissionFlags {
    pub const NONE: Self = Self::empty();
    pub const ALL: Self = Self::all();
    pub const READ_ONLY: Self = Self::SELECT;
    pub const READ_WRITE: Self = Self::SELECT.union(Self::INSERT).union(Self::UPDATE);

    pub fn from_bools(select: bool, insert: bool, update: bool, delete: bool) -> Self {
        let mut flags = Self::NONE;
        flags.set(Self::SELECT, select);
        flags.set(Self::INSERT, insert);
        flags.set(Self::UPDATE, update);
        flags.set(Self::DELETE, delete);
        flags
    }

    pub fn can_select(self) -> bool {
        self.contains(Self::SELECT)
    }

    pub fn can_insert(self) -> bool {
        self.contains(Self::INSERT)
    }

    pub fn can_update(self) -> bool {
        self.contains(Self::UPDATE)
    }

    pub fn can_delete(self) -> bool {
        self.contains(Self::DELETE)
    }

    /// True when every bit of `required` is held.
    pub fn allows(self, required: Self) -> bool {
        self.contains(required)
    }
}

impl fmt::Display for PermissionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut parts = Vec::new();
        if self.can_select() {
            parts.push("select");
        }
        if self.can_insert() {
            parts.push("insert");
        }
        if self.can_update() {
            parts.push("update");
        }
        if self.can_delete() {
            parts.push("delete");
        }
        f.write_str(&parts.join("|"))
    }
}
