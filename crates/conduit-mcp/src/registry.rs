//! Aggregated tool namespace across all connected servers.
//!
//! Every public name is qualified with its server: `<server>__<operation>`.
//! Bare operation names are never exposed, so two servers advertising the
//! same operation always end up as two distinct entries.
//!
//! Public names must also satisfy the model API's tool-name rule
//! (`[A-Za-z0-9_-]{1,64}`). Operations whose qualified name breaks it are
//! published under a rewritten name; the server still receives the name it
//! advertised.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::RegistryError;
use crate::protocol::ToolInfo;

/// Separator between server name and operation name in a public tool name.
pub const TOOL_NAME_SEPARATOR: &str = "__";

/// Longest tool name the model API accepts.
pub const MAX_PUBLIC_NAME_LEN: usize = 64;

/// Build the qualified name for an operation.
pub fn qualify(server: &str, operation: &str) -> String {
    format!("{}{}{}", server, TOOL_NAME_SEPARATOR, operation)
}

/// Whether `name` can be handed to the model as a tool name.
pub fn is_valid_public_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_PUBLIC_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// The name the model sees for `operation` on `server`.
///
/// Equal to [`qualify`] when that is already valid. Otherwise disallowed
/// characters become `_`, the name is cut to fit, and an 8-hex-digit hash of
/// the original operation name is appended so rewritten names stay distinct
/// and stable across runs.
pub fn public_tool_name(server: &str, operation: &str) -> String {
    let qualified = qualify(server, operation);
    if is_valid_public_name(&qualified) {
        return qualified;
    }

    let suffix = format!("_{:08x}", fnv1a(operation.as_bytes()));
    let mut name: String = qualified
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Only ASCII remains, so byte truncation is char-safe.
    name.truncate(MAX_PUBLIC_NAME_LEN - suffix.len());
    name.push_str(&suffix);
    name
}

// 32-bit FNV-1a: fixed across builds, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5_u32, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

/// Split a public name into `(server, operation)`.
///
/// Server names never contain the separator, so the first occurrence is
/// the boundary.
pub fn split_public_name(name: &str) -> Option<(&str, &str)> {
    let (server, operation) = name.split_once(TOOL_NAME_SEPARATOR)?;
    if server.is_empty() || operation.is_empty() {
        return None;
    }
    Some((server, operation))
}

/// Schema used when a server omits `inputSchema`.
pub fn default_input_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// One entry of the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTool {
    /// Globally unique name shown to the model.
    pub public_name: String,
    /// Owning server.
    pub server: String,
    /// The operation as the server advertised it.
    pub tool: ToolInfo,
}

/// Where a public name routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolTarget<'a> {
    /// Owning server.
    pub server: &'a str,
    /// Operation name as the server knows it.
    pub operation: &'a str,
}

/// Model-facing description of one registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Public name.
    pub name: String,
    /// Description, empty when the server gave none.
    pub description: String,
    /// JSON schema for the input, passed through verbatim.
    pub input_schema: Value,
}

/// Flat, collision-free map from public tool name to owning server.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    servers: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every operation of `server`.
    ///
    /// Either all operations are inserted or none are. Returns the number of
    /// entries added.
    pub fn register(&mut self, server: &str, tools: &[ToolInfo]) -> Result<usize, RegistryError> {
        if self.servers.iter().any(|s| s == server) {
            return Err(RegistryError::ServerAlreadyRegistered(server.to_string()));
        }

        let mut batch = HashSet::with_capacity(tools.len());
        let mut staged = Vec::with_capacity(tools.len());
        for tool in tools {
            let public_name = public_tool_name(server, &tool.name);
            if public_name != qualify(server, &tool.name) {
                tracing::debug!(
                    server,
                    operation = %tool.name,
                    public_name = %public_name,
                    "rewrote tool name the model API would reject"
                );
            }
            if let Some(&existing) = self.index.get(&public_name) {
                return Err(RegistryError::DuplicateName {
                    public_name,
                    server: server.to_string(),
                    existing_server: self.entries[existing].server.clone(),
                });
            }
            if !batch.insert(public_name.clone()) {
                return Err(RegistryError::DuplicateName {
                    public_name,
                    server: server.to_string(),
                    existing_server: server.to_string(),
                });
            }
            staged.push(RegisteredTool {
                public_name,
                server: server.to_string(),
                tool: tool.clone(),
            });
        }

        let added = staged.len();
        for entry in staged {
            self.index
                .insert(entry.public_name.clone(), self.entries.len());
            self.entries.push(entry);
        }
        self.servers.push(server.to_string());

        tracing::debug!(server, tool_count = added, "registered tools");
        Ok(added)
    }

    /// Remove every entry owned by `server`. Returns how many were removed.
    pub fn unregister(&mut self, server: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.server != server);
        self.servers.retain(|s| s != server);
        self.reindex();

        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(server, tool_count = removed, "unregistered tools");
        }
        removed
    }

    /// Look up the owner of a public name.
    pub fn resolve(&self, public_name: &str) -> Result<ToolTarget<'_>, RegistryError> {
        let entry = self
            .get(public_name)
            .ok_or_else(|| RegistryError::UnknownTool(public_name.to_string()))?;
        Ok(ToolTarget {
            server: &entry.server,
            operation: &entry.tool.name,
        })
    }

    /// Get an entry by public name.
    pub fn get(&self, public_name: &str) -> Option<&RegisteredTool> {
        self.index.get(public_name).map(|&i| &self.entries[i])
    }

    /// Check whether a public name is registered.
    pub fn contains(&self, public_name: &str) -> bool {
        self.index.contains_key(public_name)
    }

    /// Model-facing catalog in registration order.
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .map(|entry| CatalogEntry {
                name: entry.public_name.clone(),
                description: entry.tool.description.clone().unwrap_or_default(),
                input_schema: entry
                    .tool
                    .input_schema
                    .clone()
                    .unwrap_or_else(default_input_schema),
            })
            .collect()
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.entries.iter()
    }

    /// Entries owned by one server.
    pub fn tools_for<'a>(&'a self, server: &'a str) -> impl Iterator<Item = &'a RegisteredTool> {
        self.entries.iter().filter(move |entry| entry.server == server)
    }

    /// Servers that have registered, in registration order.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Number of public tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.public_name.clone(), i))
            .collect();
    }
}
