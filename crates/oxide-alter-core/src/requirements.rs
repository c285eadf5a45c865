//! Alteration requirements.

use std::fmt;

bitflags::bitflags! {
    /// What applying an action (or a whole batch) needs from the backend.
    ///
    /// The requirements of a batch are the union of its actions'
    /// requirements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Requirements: u8 {
        /// The physical table must be recreated.
        const PHYSICAL_ALTERATION = 1;
        /// Existing values must be converted while copying rows.
        const DATA_CONVERSION = 1 << 1;
        /// The main schema catalog must be updated.
        const MAIN_CATALOG_UPDATE = 1 << 2;
        /// The extended schema catalog must be updated.
        const EXTENDED_CATALOG_UPDATE = 1 << 3;
    }
}

impl Default for Requirements {
    fn default() -> Self {
        Self::empty()
    }
}

/// How the executor will apply a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlterStrategy {
    /// Nothing to do.
    NoOp,
    /// Catalog updates only; the physical table is untouched.
    MetadataUpdate,
    /// The physical table is recreated and rows are copied.
    PhysicalRecreate,
}

impl Requirements {
    /// Returns true if the table needs to be recreated.
    #[must_use]
    pub fn requires_physical(self) -> bool {
        self.intersects(Self::PHYSICAL_ALTERATION | Self::DATA_CONVERSION)
    }

    /// Returns true if only catalog updates are needed.
    #[must_use]
    pub fn is_metadata_only(self) -> bool {
        !self.requires_physical()
            && self.intersects(Self::MAIN_CATALOG_UPDATE | Self::EXTENDED_CATALOG_UPDATE)
    }

    /// Returns the execution strategy these requirements call for.
    #[must_use]
    pub fn strategy(self) -> AlterStrategy {
        if self.requires_physical() {
            AlterStrategy::PhysicalRecreate
        } else if self.is_metadata_only() {
            AlterStrategy::MetadataUpdate
        } else {
            AlterStrategy::NoOp
        }
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::PHYSICAL_ALTERATION, "PhysicalAlteration"),
            (Self::DATA_CONVERSION, "DataConversion"),
            (Self::MAIN_CATALOG_UPDATE, "MainCatalogUpdate"),
            (Self::EXTENDED_CATALOG_UPDATE, "ExtendedCatalogUpdate"),
        ];
        let parts: Vec<&str> = names
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl fmt::Display for AlterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoOp => "no-op",
            Self::MetadataUpdate => "metadata update",
            Self::PhysicalRecreate => "physical recreate",
        };
        f.write_str(name)
    }
}
