//! Canonical text form of administrative replies.

use mongodb::bson::{Bson, Document};

use crate::errors::ClusterError;

/// Reply document returned by an administrative command.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminReply {
    document: Document,
}

impl AdminReply {
    /// Wraps a reply document.
    #[must_use]
    pub const fn new(document: Document) -> Self {
        Self { document }
    }

    /// Borrows the reply document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }
}

/// Serialises `reply` as relaxed extended JSON indented by two spaces.
///
/// Fields keep the order the cluster sent them in, so encoding the same
/// reply twice yields identical bytes.
///
/// # Errors
///
/// Returns [`ClusterError::Encode`] when the document cannot be serialised.
pub fn encode(reply: &AdminReply) -> Result<Vec<u8>, ClusterError> {
    let value = Bson::Document(reply.document().clone()).into_relaxed_extjson();
    serde_json::to_vec_pretty(&value).map_err(ClusterError::encode)
}
