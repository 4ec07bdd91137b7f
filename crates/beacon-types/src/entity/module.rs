use serde::{Deserialize, Serialize};

/// One step of the server-defined module sequence a client walks through.
///
/// Arrives in the server configuration after authentication; consumed in
/// ascending `order` through a persisted cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTarget {
    pub id: String,
    pub name: String,
    /// Opaque destination handed back to the embedding application.
    pub target: String,
    pub order: i64,
}
