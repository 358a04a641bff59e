use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use dialog_bakery::{Acl, AclError, AclSource, Operation};

/// ACLs from a fixed table that remembers what it was asked.
///
/// Operations missing from the table get an empty ACL.
#[derive(Debug, Clone, Default)]
pub struct StaticAcls {
    table: Arc<Mutex<HashMap<Operation, Acl>>>,
    requests: Arc<Mutex<Vec<Vec<Operation>>>>,
}

impl StaticAcls {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ACL of `operation`.
    pub fn set(&self, operation: Operation, acl: Acl) {
        if let Ok(mut table) = self.table.lock() {
            table.insert(operation, acl);
        }
    }

    /// Every request made so far, in order.
    pub fn requests(&self) -> Vec<Vec<Operation>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Forgets past requests.
    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }
}

#[async_trait]
impl AclSource for StaticAcls {
    async fn acls(&self, operations: &[Operation]) -> Result<Vec<Acl>, AclError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(operations.to_vec());
        }
        let table = self
            .table
            .lock()
            .map_err(|error| AclError::backend(std::io::Error::other(error.to_string())))?;
        Ok(operations
            .iter()
            .map(|op| table.get(op).cloned().unwrap_or_default())
            .collect())
    }
}

/// An ACL source that always answers with one ACL too few.
#[derive(Debug, Clone, Default)]
pub struct ShortAcls;

#[async_trait]
impl AclSource for ShortAcls {
    async fn acls(&self, operations: &[Operation]) -> Result<Vec<Acl>, AclError> {
        Ok(vec![Acl::everyone(); operations.len().saturating_sub(1)])
    }
}
