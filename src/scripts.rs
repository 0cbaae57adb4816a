// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexLock.
//
// PlexLock is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexLock is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexLock. If not, see <https://www.gnu.org/licenses/>.

//! Server-side lock scripts.
//!
//! ## Purpose
//! Each lock operation is a single Lua script so it executes atomically with
//! respect to other commands on the same endpoint. The scripts are wrapped in
//! [`redis::Script`], which hashes the body locally, invokes by digest, and
//! reloads the body once on a "script not found" response — so each body is
//! loaded at most once per endpoint in the common case.
//!
//! Every script begins with a best-effort `select` of the logical database;
//! the `pcall` swallows the error on endpoints that do not implement logical
//! databases.
//!
//! Script arguments:
//! - acquire/extend: `ARGV[1]` lock value, `ARGV[2]` TTL in milliseconds,
//!   `ARGV[3]` logical db.
//! - release: `ARGV[1]` lock value, `ARGV[2]` logical db.

use once_cell::sync::Lazy;
use redis::Script;

const ACQUIRE_BODY: &str = r#"
redis.pcall("select", ARGV[3])
-- Refuse if any entry already exists, under any value.
for _, key in ipairs(KEYS) do
  if redis.call("exists", key) == 1 then
    return 0
  end
end
for _, key in ipairs(KEYS) do
  redis.call("set", key, ARGV[1], "PX", ARGV[2])
end
return #KEYS
"#;

const EXTEND_BODY: &str = r#"
redis.pcall("select", ARGV[3])
-- Refuse unless every entry still holds this lock value.
for _, key in ipairs(KEYS) do
  if redis.call("get", key) ~= ARGV[1] then
    return 0
  end
end
for _, key in ipairs(KEYS) do
  redis.call("set", key, ARGV[1], "PX", ARGV[2])
end
return #KEYS
"#;

const RELEASE_BODY: &str = r#"
redis.pcall("select", ARGV[2])
local count = 0
for _, key in ipairs(KEYS) do
  -- Only remove entries held under this lock value.
  if redis.call("get", key) == ARGV[1] then
    redis.call("del", key)
    count = count + 1
  end
end
return count
"#;

/// One of the three lock operations, as a named server-side script.
pub struct LockScript {
    name: &'static str,
    script: Script,
}

impl LockScript {
    fn new(name: &'static str, body: &'static str) -> Self {
        Self {
            name,
            script: Script::new(body),
        }
    }

    /// Operation name: `"acquire"`, `"extend"`, or `"release"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The prepared script, hashed at construction.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// The server-assigned digest (SHA1 of the body).
    pub fn digest(&self) -> &str {
        self.script.get_hash()
    }
}

/// Process-wide acquire script. Sets every key to the lock value with the
/// requested expiry, refusing if any key already exists.
pub static ACQUIRE_SCRIPT: Lazy<LockScript> =
    Lazy::new(|| LockScript::new("acquire", ACQUIRE_BODY));

/// Process-wide extend script. Re-arms every key's expiry, refusing unless
/// every key still holds the lock value.
pub static EXTEND_SCRIPT: Lazy<LockScript> = Lazy::new(|| LockScript::new("extend", EXTEND_BODY));

/// Process-wide release script. Deletes every key held under the lock value
/// and returns the number removed.
pub static RELEASE_SCRIPT: Lazy<LockScript> =
    Lazy::new(|| LockScript::new("release", RELEASE_BODY));
