use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::{MULTI_OP_ENTITY_PREFIX, Operation};

/// A content addressed entity standing for a set of operations.
///
/// The name depends only on the set, not on the order or repetition of the
/// operations it was built from, so two capabilities for the same set share
/// one store entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiOpEntity {
    name: String,
    operations: Vec<Operation>,
}

impl MultiOpEntity {
    /// Sorts and deduplicates `operations` and names the result.
    ///
    /// The name is `multi-` followed by the hex SHA-256 of each operation
    /// rendered as `action\nentity\n`, in sorted order.
    pub fn new(operations: &[Operation]) -> Self {
        let mut operations = operations.to_vec();
        operations.sort();
        operations.dedup();

        let mut hasher = Sha256::new();
        for op in &operations {
            hasher.update(op.action.as_bytes());
            hasher.update(b"\n");
            hasher.update(op.entity.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();

        let mut name = String::with_capacity(MULTI_OP_ENTITY_PREFIX.len() + 1 + digest.len() * 2);
        name.push_str(MULTI_OP_ENTITY_PREFIX);
        name.push('-');
        for byte in digest {
            let _ = write!(name, "{byte:02x}");
        }

        Self { name, operations }
    }

    /// The entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sorted, deduplicated operations.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Consumes the entity, returning its name and operations.
    pub fn into_parts(self) -> (String, Vec<Operation>) {
        (self.name, self.operations)
    }
}

/// True when `entity` names a set of operations.
pub fn is_multi_op_entity(entity: &str) -> bool {
    entity
        .strip_prefix(MULTI_OP_ENTITY_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}
