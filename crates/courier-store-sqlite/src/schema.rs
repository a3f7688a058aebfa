//! SQL schema for the Courier SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.
//!
//! Cascades are declared on the foreign keys, so deleting a user removes
//! their messages, and deleting a message removes its replies, notifications
//! and history. `foreign_keys` must be on for any of that to happen.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_id        TEXT PRIMARY KEY,
    sender_id         TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    receiver_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    content           TEXT NOT NULL,
    created_at        TEXT NOT NULL,   -- RFC 3339 UTC, microseconds; never updated
    edited            INTEGER NOT NULL DEFAULT 0,
    read              INTEGER NOT NULL DEFAULT 0,
    parent_message_id TEXT REFERENCES messages(message_id) ON DELETE CASCADE,
    CHECK (parent_message_id IS NULL OR parent_message_id != message_id)
);

-- Append-only: rows are inserted by edits and removed only by cascade.
CREATE TABLE IF NOT EXISTS message_history (
    history_id  TEXT PRIMARY KEY,
    message_id  TEXT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
    old_content TEXT NOT NULL,
    edited_at   TEXT NOT NULL,
    edited_by   TEXT REFERENCES users(user_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    message_id      TEXT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_receiver_idx ON messages(receiver_id, read);
CREATE INDEX IF NOT EXISTS messages_sender_idx   ON messages(sender_id);
CREATE INDEX IF NOT EXISTS messages_parent_idx   ON messages(parent_message_id);
CREATE INDEX IF NOT EXISTS history_message_idx   ON message_history(message_id);
CREATE INDEX IF NOT EXISTS history_editor_idx    ON message_history(edited_by);
CREATE INDEX IF NOT EXISTS notifications_user_idx    ON notifications(user_id);
CREATE INDEX IF NOT EXISTS notifications_message_idx ON notifications(message_id);

PRAGMA user_version = 1;
";
