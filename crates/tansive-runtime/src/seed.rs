//! Seeds the Runtime's local catalog fake from a bundled JSON file.
//!
//! Full catalog CRUD (views, skillsets, variants) is an out-of-scope SQL
//! service (§1) the Runtime would normally read through the Server's
//! control plane instead of owning directly. Since this Runtime keeps its
//! own in-process [`InMemoryCatalog`] rather than proxying every catalog
//! read back to the Server, it needs *some* local source of truth for
//! `GET /sessions/execution-state`'s skillset name to resolve against —
//! a single `skillsets.json` under the working directory, read once at
//! startup, fills that gap.

use std::path::Path;

use serde::Deserialize;
use tansive_catalog::{InMemoryCatalog, SkillSet};

#[derive(Deserialize)]
struct SeedFile {
    #[serde(default)]
    skillsets: Vec<SkillSet>,
}

/// Load `<working_dir>/skillsets.json`, if present, inserting every
/// skillset it declares into `catalog`.
///
/// A missing file is not an error — a Runtime that only ever opens MCP
/// proxy sessions (no `fetch_objects` skillset lookup) has nothing to
/// seed. A malformed file is: it almost certainly means a config mistake
/// the operator should see at startup, not a silent no-op.
pub fn load_skillsets(working_dir: &Path, catalog: &InMemoryCatalog) -> anyhow::Result<()> {
    let path = working_dir.join("skillsets.json");
    if !path.exists() {
        tracing::info!(path = %path.display(), "no skillsets.json found, starting with an empty local catalog");
        return Ok(());
    }

    let raw = std::fs::read_to_string(&path)?;
    let seed: SeedFile = serde_json::from_str(&raw)?;
    let count = seed.skillsets.len();
    for skillset in seed.skillsets {
        catalog.insert_skillset(skillset);
    }
    tracing::info!(path = %path.display(), count, "seeded local catalog with skillsets");
    Ok(())
}
