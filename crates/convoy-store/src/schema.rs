/// SQL DDL for the convoy-store database.
/// WAL mode + foreign keys enabled at connection time.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS callers (
    phone_number TEXT PRIMARY KEY,
    call_sid TEXT UNIQUE,
    full_name TEXT,
    email TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    phone_number TEXT NOT NULL,
    transcript TEXT NOT NULL,
    system_instructions TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS carriers (
    id TEXT PRIMARY KEY,
    mc_number TEXT NOT NULL UNIQUE,
    name TEXT,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    country TEXT NOT NULL DEFAULT 'USA',
    region TEXT,
    phone TEXT NOT NULL UNIQUE,
    agent_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS assistants (
    id TEXT PRIMARY KEY,
    twilio_number TEXT NOT NULL UNIQUE,
    region TEXT,
    carrier_id TEXT NOT NULL UNIQUE REFERENCES carriers(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_phone ON conversations(phone_number);
CREATE INDEX IF NOT EXISTS idx_conversations_phone_id ON conversations(phone_number, id);
CREATE INDEX IF NOT EXISTS idx_carriers_phone ON carriers(phone);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
