use redb::TableDefinition;

/// Session records: key -> SessionRecord (msgpack)
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Expiration index: expiry_key(expires_at, key) -> key
pub const RECORD_EXPIRY: TableDefinition<&str, &str> = TableDefinition::new("record_expiry");
