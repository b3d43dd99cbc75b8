//! Duplicate grouping
//!
//! `shield.tga` and `shield.dds` in the same directory are the same texture
//! as far as the game is concerned. Only one of them is converted (the
//! canonical, best-ranked by [`format_priority`]); the others receive a copy
//! of its output under their own filename.

use crate::asset::{AssetRecord, Role};
use crate::formats::format_priority;
use std::collections::HashMap;

/// Assign a [`Role`] to every record. Order of the returned list matches the input.
pub fn deduplicate(records: Vec<AssetRecord>) -> Vec<AssetRecord> {
    let roles = assign_roles(&records);

    let duplicates = roles.iter().filter(|r| matches!(r, Role::Dependent { .. })).count();
    if duplicates > 0 {
        tracing::info!(duplicates, "Duplicate textures will be copied from their canonical");
    }

    records
        .into_iter()
        .zip(roles)
        .map(|(record, role)| record.with_role(role))
        .collect()
}

fn assign_roles(records: &[AssetRecord]) -> Vec<Role> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        groups.entry(record.identity.as_str()).or_default().push(idx);
    }

    let mut roles = vec![Role::Unique; records.len()];
    for members in groups.values().filter(|m| m.len() > 1) {
        let mut ranked = members.clone();
        // stable: equal priority keeps discovery order
        ranked.sort_by_key(|&idx| format_priority(&records[idx].original_ext));

        let canonical = ranked[0];
        roles[canonical] = Role::Canonical;
        for &dependent in &ranked[1..] {
            roles[dependent] = Role::Dependent {
                canonical: records[canonical].original_filename.clone(),
            };
        }
    }
    roles
}
