//! redb table definitions for the Hearth state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Definition shape shared by every table.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Server records keyed by server name.
pub const SERVERS: JsonTable = TableDefinition::new("servers");

/// Lock records keyed by resource id (instance id or a job sentinel).
pub const LOCKS: JsonTable = TableDefinition::new("locks");

/// Catalog entries keyed by game id.
pub const CATALOG: JsonTable = TableDefinition::new("catalog");

/// The tables a caller may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Servers,
    Locks,
    Catalog,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Servers, Table::Locks, Table::Catalog];

    pub fn definition(self) -> JsonTable {
        match self {
            Table::Servers => SERVERS,
            Table::Locks => LOCKS,
            Table::Catalog => CATALOG,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Table::Servers => "servers",
            Table::Locks => "locks",
            Table::Catalog => "catalog",
        }
    }
}
