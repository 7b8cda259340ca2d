//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Every command opens the keyspace, runs one transaction and prints either
//! human-readable text or, in JSON mode, a single pretty-printed document.

use super::CliError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use trellis_core::graph::{DirectedEdges, EdgeHost};
use trellis_core::primitives::{ENCODING_VERSION, THING_IID_LENGTH, TYPE_IID_LENGTH};
use trellis_core::{
    Direction, EdgeSchema, Iid, Keyspace, Session, SessionType, ThingEdgeSchema, ThingSchema,
    Transaction, TransactionType, TypeEdgeSchema, TypeSchema, Value, ValueType, hex_string,
};

// =============================================================================
// REPORTS
// =============================================================================

/// Arguments of `define-type`.
#[derive(Debug, Clone, Default)]
pub struct TypeDefinition {
    pub kind: String,
    pub label: String,
    pub sub: Option<String>,
    pub is_abstract: bool,
    pub value_type: Option<String>,
    pub regex: Option<String>,
}

/// One edge as seen from the inspected vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeReport {
    pub schema: &'static str,
    pub direction: &'static str,
    pub adjacent: String,
}

/// A vertex with its properties and every incident edge.
#[derive(Debug, Clone, Serialize)]
pub struct VertexReport {
    pub iid: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub properties: BTreeMap<&'static str, String>,
    pub edges: Vec<EdgeReport>,
}

#[derive(Debug, Clone, Serialize)]
struct TypeSummary {
    label: String,
    iid: String,
    kind: &'static str,
    #[serde(rename = "abstract")]
    is_abstract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_type: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
struct DumpEntry {
    key: String,
    value: String,
}

// =============================================================================
// HELPERS
// =============================================================================

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open(db_path: &Path) -> Result<Keyspace, CliError> {
    Ok(Keyspace::open(db_path)?)
}

/// Schema session that fails instead of waiting for another one.
fn schema_session(keyspace: &Keyspace) -> Result<Session, CliError> {
    keyspace
        .try_session(SessionType::Schema)
        .ok_or_else(|| CliError::usage("another schema session is open on this keyspace"))
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "out",
        Direction::In => "in",
    }
}

/// Parse a `0x`-prefixed hex IID as printed by the other commands.
pub fn parse_iid(text: &str) -> Result<Iid, CliError> {
    let invalid = || CliError::usage(format!("'{}' is not a hex IID (0x...)", text));
    let digits = text.strip_prefix("0x").ok_or_else(invalid)?;
    if digits.is_empty() {
        return Err(invalid());
    }
    let bytes = hex::decode(digits).map_err(|_| invalid())?;
    Ok(Iid::new(bytes))
}

fn type_iid_by_label(transaction: &mut Transaction, label: &str) -> Result<Iid, CliError> {
    transaction
        .types()
        .iid_of(label)?
        .ok_or_else(|| CliError::usage(format!("no type labelled '{}'", label)))
}

fn collect_edges<G: EdgeHost>(graph: &mut G, iid: &Iid) -> Result<Vec<EdgeReport>, CliError> {
    let mut edges = Vec::new();
    for direction in [Direction::Out, Direction::In] {
        let view = DirectedEdges::of(&mut *graph, iid, direction)?;
        for schema in G::Schema::ALL {
            for adjacent in view.get(*schema)? {
                edges.push(EdgeReport {
                    schema: schema.name(),
                    direction: direction_name(direction),
                    adjacent: adjacent?.to_string(),
                });
            }
        }
    }
    Ok(edges)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create and initialise a keyspace file.
pub fn cmd_init(db_path: &Path, json_mode: bool, force: bool) -> Result<(), CliError> {
    if db_path.exists() {
        if !force {
            return Err(CliError::usage(format!(
                "keyspace {} already exists. Use --force to overwrite.",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path).map_err(|source| CliError::Remove {
            path: db_path.to_path_buf(),
            source,
        })?;
        tracing::warn!(path = %db_path.display(), "existing keyspace removed");
    }

    let keyspace = Keyspace::create(db_path)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "keyspace": keyspace.name(),
            "encoding_version": ENCODING_VERSION,
        }));
    }
    println!("Initialized new keyspace at {}", db_path.display());
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show keyspace status.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), CliError> {
    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Read)?;

    let initialised = transaction.graphs().is_initialised()?;
    let types = transaction.types().labels()?.len();
    let mut things = 0usize;
    let mut entries = 0usize;
    for entry in transaction.entries()? {
        let (key, _) = entry?;
        entries += 1;
        if key.len() == THING_IID_LENGTH && ThingSchema::of(key[0]).is_ok() {
            things += 1;
        }
    }

    if json_mode {
        return print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "initialised": initialised,
            "encoding_version": ENCODING_VERSION,
            "types": types,
            "things": things,
            "entries": entries,
        }));
    }

    println!("Trellis Keyspace Status");
    println!("=======================");
    println!("Database:    {}", db_path.display());
    println!("Initialised: {}", initialised);
    println!("Encoding:    v{}", ENCODING_VERSION);
    println!();
    println!("Types:       {}", types);
    println!("Things:      {}", things);
    println!("Entries:     {}", entries);
    Ok(())
}

// =============================================================================
// DEFINE-TYPE COMMAND
// =============================================================================

/// Define a type under its supertype and return its IID.
pub fn cmd_define_type(
    db_path: &Path,
    json_mode: bool,
    definition: &TypeDefinition,
) -> Result<Iid, CliError> {
    let schema = TypeSchema::from_kind(&definition.kind).ok_or_else(|| {
        CliError::usage(format!(
            "unknown type kind '{}' (entity, relation, role, attribute)",
            definition.kind
        ))
    })?;
    let value_type = definition
        .value_type
        .as_deref()
        .map(|name| {
            ValueType::from_name(name)
                .ok_or_else(|| CliError::usage(format!("unknown value type '{}'", name)))
        })
        .transpose()?;
    if schema == TypeSchema::AttributeType && value_type.is_none() {
        return Err(CliError::usage("attribute types need --value-type"));
    }

    let keyspace = open(db_path)?;
    let session = schema_session(&keyspace)?;
    let mut transaction = session.transaction(TransactionType::Write)?;

    let supertype_label = definition
        .sub
        .clone()
        .unwrap_or_else(|| schema.root_label().to_string());
    let supertype = type_iid_by_label(&mut transaction, &supertype_label)?;
    let supertype_schema = trellis_core::encoding::keys::validate_type_iid(&supertype)?;
    if supertype_schema != schema {
        return Err(CliError::usage(format!(
            "'{}' is a {}, not a {}",
            supertype_label, supertype_schema, schema
        )));
    }

    let iid = transaction.types().create(schema, &definition.label)?;
    {
        let vertex = transaction
            .types()
            .get_mut(&iid)?
            .ok_or_else(|| CliError::usage(format!("type {} vanished", iid)))?;
        if definition.is_abstract {
            vertex.set_abstract(true)?;
        }
        if let Some(value_type) = value_type {
            vertex.set_value_type(value_type)?;
        }
        if let Some(regex) = &definition.regex {
            vertex.set_regex(regex)?;
        }
    }
    transaction
        .types()
        .outs(&iid)?
        .add(TypeEdgeSchema::Sub, &supertype)?;
    let summary = transaction.commit()?;
    tracing::info!(%iid, label = %definition.label, types = summary.types, "type defined");

    if json_mode {
        print_json(&serde_json::json!({
            "iid": iid.to_string(),
            "label": definition.label,
            "kind": schema.name(),
            "sub": supertype_label,
        }))?;
    } else {
        println!(
            "Defined {} '{}' as {} (sub {})",
            schema, definition.label, iid, supertype_label
        );
    }
    Ok(iid)
}

// =============================================================================
// INSERT COMMAND
// =============================================================================

/// Insert an instance of the type labelled `type_label` and return its IID.
pub fn cmd_insert(
    db_path: &Path,
    json_mode: bool,
    type_label: &str,
    value: Option<&str>,
) -> Result<Iid, CliError> {
    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Write)?;

    let type_iid = type_iid_by_label(&mut transaction, type_label)?;
    let value_type = transaction
        .types()
        .get(&type_iid)?
        .map(|vertex| vertex.value_type())
        .transpose()?
        .flatten();

    let iid = match (value_type, value) {
        (Some(value_type), Some(text)) => {
            let value = Value::parse(value_type, text)?;
            transaction.graphs().create_attribute(&type_iid, value)?
        }
        (Some(value_type), None) => {
            return Err(CliError::usage(format!(
                "'{}' holds {} values; pass --value",
                type_label, value_type
            )));
        }
        (None, Some(_)) => {
            return Err(CliError::usage(format!(
                "'{}' does not hold values",
                type_label
            )));
        }
        (None, None) => transaction.graphs().create_thing(&type_iid)?,
    };
    transaction.commit()?;
    tracing::info!(%iid, type_label, "thing inserted");

    if json_mode {
        print_json(&serde_json::json!({
            "iid": iid.to_string(),
            "type": type_label,
            "value": value,
        }))?;
    } else {
        println!("Inserted {} as {}", type_label, iid);
    }
    Ok(iid)
}

// =============================================================================
// LINK COMMAND
// =============================================================================

/// Add an edge of `schema_name` between two things.
pub fn cmd_link(
    db_path: &Path,
    json_mode: bool,
    schema_name: &str,
    from: &str,
    to: &str,
) -> Result<(), CliError> {
    let schema = ThingEdgeSchema::ALL
        .iter()
        .copied()
        .find(|schema| schema.name() == schema_name)
        .ok_or_else(|| {
            CliError::usage(format!(
                "unknown edge schema '{}' (has, playing, relating, role-player)",
                schema_name
            ))
        })?;
    let from = parse_iid(from)?;
    let to = parse_iid(to)?;

    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Write)?;
    transaction.things().outs(&from)?.add(schema, &to)?;
    transaction.commit()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "schema": schema.name(),
            "from": from.to_string(),
            "to": to.to_string(),
        }));
    }
    println!("Linked {} -[{}]-> {}", from, schema.name(), to);
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

fn inspect_type(transaction: &mut Transaction, iid: &Iid) -> Result<VertexReport, CliError> {
    let types = transaction.types();
    let vertex = types
        .get(iid)?
        .ok_or_else(|| CliError::usage(format!("no type {}", iid)))?;
    let kind = vertex.schema().name();
    let label = vertex.label()?.map(str::to_string);
    let mut properties = BTreeMap::new();
    properties.insert("abstract", vertex.is_abstract()?.to_string());
    if let Some(value_type) = vertex.value_type()? {
        properties.insert("value_type", value_type.to_string());
    }
    if let Some(regex) = vertex.regex()? {
        properties.insert("regex", regex.to_string());
    }
    let edges = collect_edges(types, iid)?;
    Ok(VertexReport {
        iid: iid.to_string(),
        kind,
        label,
        properties,
        edges,
    })
}

fn inspect_thing(transaction: &mut Transaction, iid: &Iid) -> Result<VertexReport, CliError> {
    let things = transaction.things();
    let vertex = things
        .get(iid)?
        .ok_or_else(|| CliError::usage(format!("no thing {}", iid)))?;
    let kind = vertex.schema().name();
    let type_iid = vertex.type_iid();
    let mut properties = BTreeMap::new();
    properties.insert("type", type_iid.to_string());
    if let Some(value) = vertex.value()? {
        properties.insert("value", value.to_string());
    }
    let edges = collect_edges(things, iid)?;
    let label = transaction
        .types()
        .get(&type_iid)?
        .map(|vertex| vertex.label().map(|label| label.map(str::to_string)))
        .transpose()?
        .flatten();
    Ok(VertexReport {
        iid: iid.to_string(),
        kind,
        label,
        properties,
        edges,
    })
}

/// Describe a vertex given a type label or a `0x` IID.
pub fn inspect(db_path: &Path, target: &str) -> Result<VertexReport, CliError> {
    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Read)?;

    let iid = if target.starts_with("0x") {
        parse_iid(target)?
    } else {
        type_iid_by_label(&mut transaction, target)?
    };
    match iid.len() {
        TYPE_IID_LENGTH => inspect_type(&mut transaction, &iid),
        THING_IID_LENGTH => inspect_thing(&mut transaction, &iid),
        length => Err(CliError::usage(format!(
            "IID {} has {} bytes; types have {} and things {}",
            iid, length, TYPE_IID_LENGTH, THING_IID_LENGTH
        ))),
    }
}

/// Show a vertex by label or IID.
pub fn cmd_inspect(db_path: &Path, json_mode: bool, target: &str) -> Result<(), CliError> {
    let report = inspect(db_path, target)?;
    if json_mode {
        return print_json(&report);
    }

    println!("{} {}", report.kind, report.iid);
    if let Some(label) = &report.label {
        println!("  label: {}", label);
    }
    for (name, value) in &report.properties {
        println!("  {}: {}", name, value);
    }
    if report.edges.is_empty() {
        println!("  (no edges)");
    }
    for edge in &report.edges {
        let arrow = if edge.direction == "out" { "->" } else { "<-" };
        println!("  {} {} {}", arrow, edge.schema, edge.adjacent);
    }
    Ok(())
}

// =============================================================================
// TYPES COMMAND
// =============================================================================

/// List every type label with its kind and IID.
pub fn cmd_types(db_path: &Path, json_mode: bool) -> Result<(), CliError> {
    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Read)?;

    let mut summaries = Vec::new();
    for (label, iid) in transaction.types().labels()? {
        let Some(vertex) = transaction.types().get(&iid)? else {
            continue;
        };
        summaries.push(TypeSummary {
            kind: vertex.schema().name(),
            is_abstract: vertex.is_abstract()?,
            value_type: vertex.value_type()?.map(|value_type| value_type.name()),
            iid: iid.to_string(),
            label,
        });
    }

    if json_mode {
        return print_json(&summaries);
    }
    for summary in &summaries {
        println!(
            "{:<24} {:<16} {}{}",
            summary.label,
            summary.kind,
            summary.iid,
            if summary.is_abstract { " (abstract)" } else { "" }
        );
    }
    Ok(())
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

/// Print raw key/value pairs in key order.
pub fn cmd_dump(db_path: &Path, json_mode: bool, limit: Option<usize>) -> Result<(), CliError> {
    let keyspace = open(db_path)?;
    let session = keyspace.session(SessionType::Data);
    let transaction = session.transaction(TransactionType::Read)?;

    let mut entries = Vec::new();
    for entry in transaction.entries()?.take(limit.unwrap_or(usize::MAX)) {
        let (key, value) = entry?;
        entries.push(DumpEntry {
            key: hex_string(&key),
            value: hex_string(&value),
        });
    }

    if json_mode {
        return print_json(&entries);
    }
    for entry in &entries {
        println!("{} = {}", entry.key, entry.value);
    }
    Ok(())
}
