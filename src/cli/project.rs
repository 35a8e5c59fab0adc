use std::fs;
use std::path::Path;

use serde_json::{Value, json};

use super::print_json;
use crate::agent::PepAgent;
use crate::digest::compute_digest;
use crate::registry::parse_registry_path;
use crate::types::*;

/// Reads a project document, parsing YAML for `.yaml`/`.yml` files and JSON otherwise.
fn load_document(file: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", file.display()))?;

    let is_yaml = file
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let document = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(document)
}

/// Samples listed under `_sample_dict`, the usual layout of an exported project.
pub fn sample_count(document: &Value) -> u64 {
    match document.get("_sample_dict") {
        Some(Value::Array(samples)) => samples.len() as u64,
        Some(Value::Object(samples)) => samples.len() as u64,
        _ => 0,
    }
}

fn load_payload(file: &Path, samples: Option<u64>) -> anyhow::Result<ProjectPayload> {
    let document = load_document(file)?;
    let count = samples.unwrap_or_else(|| sample_count(&document));
    Ok(ProjectPayload::new(document)?.with_sample_count(count))
}

#[allow(clippy::too_many_arguments)]
pub fn run_push(
    agent: &PepAgent,
    caller: &CallerContext,
    registry_path: &str,
    file: &Path,
    description: Option<String>,
    private: bool,
    schema: Option<String>,
    samples: Option<u64>,
    overwrite: bool,
) -> anyhow::Result<()> {
    let key = parse_registry_path(registry_path)?;
    let mut project = NewProject::new(key.clone(), load_payload(file, samples)?).private(private);
    if let Some(description) = description {
        project = project.description(description);
    }
    if let Some(schema) = schema {
        project = project.pep_schema(schema);
    }

    let options = if overwrite {
        UpsertOptions::overwrite()
    } else {
        UpsertOptions::create()
    };
    let digest = compute_digest(project.payload.document())?;
    let outcome = agent.upsert(&project, options, caller)?;

    // Private pushes may not be readable by the caller, so no read-back here.
    print_json(&json!({
        "outcome": outcome,
        "registry_path": key.registry_path(),
        "digest": digest,
    }))
}

pub fn run_pull(
    agent: &PepAgent,
    caller: &CallerContext,
    registry_path: &str,
    annotation: bool,
) -> anyhow::Result<()> {
    if annotation {
        print_json(&agent.get_annotation_by_registry_path(registry_path, caller)?)
    } else {
        print_json(&agent.get_by_registry_path(registry_path, caller)?)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_update(
    agent: &PepAgent,
    caller: &CallerContext,
    registry_path: &str,
    tag: Option<String>,
    name: Option<String>,
    description: Option<String>,
    clear_description: bool,
    visibility: Option<bool>,
    schema: Option<String>,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let key = parse_registry_path(registry_path)?;

    let mut update = ProjectUpdate::new();
    if let Some(tag) = tag {
        update = update.tag(tag);
    }
    if let Some(name) = name {
        update = update.name(name);
    }
    if let Some(description) = description {
        update = update.description(description);
    } else if clear_description {
        update = update.clear_description();
    }
    if let Some(is_private) = visibility {
        update = update.private(is_private);
    }
    if let Some(schema) = schema {
        update = update.pep_schema(schema);
    }
    if let Some(file) = file {
        update = update.payload(load_payload(file, None)?);
    }

    let project = agent.update(&key, &update, caller)?;
    print_json(&project.annotation())
}

pub fn run_fork(
    agent: &PepAgent,
    caller: &CallerContext,
    source: &str,
    target: &str,
    description: Option<String>,
    private: bool,
) -> anyhow::Result<()> {
    let source = parse_registry_path(source)?;
    let mut request = ForkRequest::new(parse_registry_path(target)?).private(private);
    if let Some(description) = description {
        request = request.description(description);
    }

    let project = agent.fork(&source, &request, caller)?;
    print_json(&project.annotation())
}

pub fn run_delete(agent: &PepAgent, caller: &CallerContext, registry_path: &str) -> anyhow::Result<()> {
    agent.delete_by_registry_path(registry_path, caller)?;
    println!("Deleted {registry_path}");
    Ok(())
}

pub fn run_digest(file: &Path) -> anyhow::Result<()> {
    let document = load_document(file)?;
    println!("{}", compute_digest(&document)?);
    Ok(())
}
