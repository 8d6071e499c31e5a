//! The `nepomuk` binary: a thin driver over [`nepomuk_core::CoreContext`]'s
//! mutation API, rooted at a store directory given on the command line.
//! Every invocation opens a fresh context, applies one operation, and exits.
//! There is no long-running daemon, so the on-disk store (not CLI process
//! state) is the only thing that persists between invocations.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{bail, Context, Error, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{NamedNode, NamedOrBlankNode, Term};

use nepomuk_core::{
    Config, CoreContext, DescribeFlags, IdentificationMode, RemoveFlags, SimpleResourceGraph, StoreFlags,
    SyncResource, Value,
};

#[derive(Debug, Parser)]
#[command(name = "nepomuk")]
#[command(about = "Drives the Nepomuk Data Management Core's mutation API")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory backing the on-disk store; omit for a throwaway in-memory store.
    #[clap(long, global = true)]
    store: Option<PathBuf>,

    /// Ontology file or directory to (re-)load before running the command. Repeatable.
    #[clap(long = "ontology-dir", global = true)]
    ontology_dirs: Vec<PathBuf>,

    /// Reject ontology files that declare no owl:Ontology subject.
    #[clap(long, action, global = true)]
    require_ontology_names: bool,

    /// Application id recorded as the maintainer of every statement this invocation writes.
    #[clap(long, default_value = "nepomuk-cli", global = true)]
    app: String,

    /// Verbose mode - sets the log level to info, defaults to warning.
    #[clap(long, short, action, global = true)]
    verbose: bool,

    /// Debug mode - sets the log level to debug, defaults to warning.
    #[clap(long, action, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open (creating if necessary) the store at --store and load configured ontologies.
    Init,
    /// Print store path, quad count, resource count and maintainer applications.
    Status,
    /// Mint a fresh resource with the given types, label and description.
    CreateResource {
        /// Fully-qualified rdf:type URI. Repeatable.
        #[clap(long = "type")]
        types: Vec<String>,
        #[clap(long)]
        label: Option<String>,
        #[clap(long)]
        description: Option<String>,
    },
    /// Add values to a property on one or more resources, keeping any existing values.
    AddProperty {
        /// Resource URIs. Repeatable.
        #[clap(long = "resource", required = true)]
        resources: Vec<String>,
        #[clap(long)]
        property: String,
        /// Value to add. Repeatable; parsed as integer/double/boolean/resource/string.
        #[clap(long = "value", required = true)]
        values: Vec<String>,
    },
    /// Replace this application's contribution to a property with the given values.
    SetProperty {
        #[clap(long = "resource", required = true)]
        resources: Vec<String>,
        #[clap(long)]
        property: String,
        /// Value to set. Omit entirely to clear the property.
        #[clap(long = "value")]
        values: Vec<String>,
    },
    /// Remove values from a property, or every value if none are given.
    RemoveProperty {
        #[clap(long = "resource", required = true)]
        resources: Vec<String>,
        #[clap(long)]
        property: String,
        #[clap(long = "value")]
        values: Vec<String>,
    },
    /// Remove resources outright.
    RemoveResources {
        #[clap(long = "resource", required = true)]
        resources: Vec<String>,
        /// Recursively remove now-parentless sub-resources.
        #[clap(long, action)]
        cascade: bool,
    },
    /// Remove this application's data about the given resources, or (with no
    /// --resource) every resource this application maintains anything about.
    RemoveDataByApplication {
        #[clap(long = "resource")]
        resources: Vec<String>,
        #[clap(long, action)]
        cascade: bool,
    },
    /// Ingest a set of resources (as quads parsed from a file) identifying each against the store.
    StoreResources {
        /// N-Quads/Turtle/TriG/N-Triples file describing the incoming resources.
        #[clap(long)]
        input: PathBuf,
        /// Never identify by defining properties: mint a fresh URI unless nie:url matches.
        #[clap(long, action)]
        no_identify: bool,
        /// Overwrite a functional property's existing value instead of rejecting the store.
        #[clap(long, action)]
        overwrite: bool,
        /// Defer cardinality checks until the whole batch has merged.
        #[clap(long, action)]
        lazy_cardinalities: bool,
        /// Additional `key=value` metadata attached to this application's provenance graph. Repeatable.
        #[clap(long = "meta")]
        metadata: Vec<String>,
    },
    /// Merge resource b's statements into resource a and remove b.
    MergeResources { a: String, b: String },
    /// Print every statement known about the given resources.
    DescribeResources {
        #[clap(long = "resource", required = true)]
        resources: Vec<String>,
        #[clap(long, action)]
        include_related: bool,
        #[clap(long, action)]
        exclude_discardable: bool,
        /// Print `{uri: {property: [values]}}` instead of one line per statement.
        #[clap(long, action)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    nepomuk_core::init_logging();
    let cmd = Cli::parse();
    execute(cmd)
}

pub fn run_from_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    nepomuk_core::init_logging();
    let cmd = Cli::try_parse_from(args).map_err(Error::from)?;
    execute(cmd)
}

fn execute(cmd: Cli) -> Result<()> {
    if cmd.debug {
        std::env::set_var("RUST_LOG", "debug");
    } else if cmd.verbose {
        std::env::set_var("RUST_LOG", "info");
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "warn");
    }
    let _ = env_logger::try_init();

    let mut builder = Config::builder().require_ontology_names(cmd.require_ontology_names);
    if let Some(path) = &cmd.store {
        builder = builder.store_path(path.clone());
    }
    if !cmd.ontology_dirs.is_empty() {
        builder = builder.ontology_locations(cmd.ontology_dirs.clone());
    }
    let config = builder.build().context("building core configuration")?;

    let ctx = CoreContext::open(config).context("opening the Nepomuk store")?;
    let app = cmd.app.as_str();

    match cmd.command {
        Commands::Init => {
            info!("store initialized");
            println!(
                "store ready at {}",
                cmd.store.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<in-memory>".into())
            );
            print_status(&ctx)?;
        }
        Commands::Status => print_status(&ctx)?,
        Commands::CreateResource { types, label, description } => {
            let types = types.iter().map(|t| parse_uri(t)).collect::<Result<Vec<_>>>()?;
            let uri = ctx.create_resource(
                &types,
                label.as_deref().unwrap_or(""),
                description.as_deref().unwrap_or(""),
                app,
            )?;
            println!("{uri}");
        }
        Commands::AddProperty { resources, property, values } => {
            let resources = parse_uris(&resources)?;
            let property = parse_uri(&property)?;
            let values: Vec<Value> = values.iter().map(|v| parse_value(v)).collect();
            ctx.add_property(&resources, &property, &values, app)?;
        }
        Commands::SetProperty { resources, property, values } => {
            let resources = parse_uris(&resources)?;
            let property = parse_uri(&property)?;
            let values: Vec<Value> = values.iter().map(|v| parse_value(v)).collect();
            ctx.set_property(&resources, &property, &values, app)?;
        }
        Commands::RemoveProperty { resources, property, values } => {
            let resources = parse_uris(&resources)?;
            let property = parse_uri(&property)?;
            let values: Vec<Value> = values.iter().map(|v| parse_value(v)).collect();
            ctx.remove_property(&resources, &property, &values, app)?;
        }
        Commands::RemoveResources { resources, cascade } => {
            let resources = parse_uris(&resources)?;
            let flags = RemoveFlags { remove_sub_resources: cascade };
            ctx.remove_resources(&resources, flags, app)?;
        }
        Commands::RemoveDataByApplication { resources, cascade } => {
            let flags = RemoveFlags { remove_sub_resources: cascade };
            if resources.is_empty() {
                ctx.remove_all_data_by_application(flags, app)?;
            } else {
                let resources = parse_uris(&resources)?;
                ctx.remove_data_by_application(&resources, flags, app)?;
            }
        }
        Commands::StoreResources { input, no_identify, overwrite, lazy_cardinalities, metadata } => {
            let graph = load_resource_graph(&input)?;
            let mode = if no_identify {
                IdentificationMode::IdentifyNone
            } else {
                IdentificationMode::IdentifyNew
            };
            let flags = StoreFlags {
                overwrite_properties: overwrite,
                lazy_cardinalities,
            };
            let additional_metadata = parse_metadata(&metadata)?;
            let resolved = ctx.store_resources(graph, mode, flags, &additional_metadata, app)?;
            let mut entries: Vec<(String, NamedNode)> = resolved.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            for (input_uri, resolved_uri) in entries {
                println!("{input_uri} -> {resolved_uri}");
            }
        }
        Commands::MergeResources { a, b } => {
            let a = parse_uri(&a)?;
            let b = parse_uri(&b)?;
            ctx.merge_resources(&a, &b, app)?;
        }
        Commands::DescribeResources { resources, include_related, exclude_discardable, json } => {
            let resources = parse_uris(&resources)?;
            let flags = DescribeFlags {
                include_related_resources: include_related,
                exclude_discardable_data: exclude_discardable,
            };
            let graph = ctx.describe_resources(&resources, flags)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resource_graph_to_json(&graph))?);
            } else {
                print_resource_graph(&graph);
            }
        }
    }

    Ok(())
}

fn print_status(ctx: &CoreContext) -> Result<()> {
    let store = ctx.store().inner();
    let mut quad_count = 0usize;
    let mut resources: std::collections::HashSet<NamedNode> = std::collections::HashSet::new();
    let mut graphs: std::collections::HashSet<String> = std::collections::HashSet::new();
    for quad in store.quads_for_pattern(None, None, None, None).filter_map(std::result::Result::ok) {
        quad_count += 1;
        if let NamedOrBlankNode::NamedNode(n) = &quad.subject {
            resources.insert(n.clone());
        }
        if let oxigraph::model::GraphName::NamedNode(g) = &quad.graph_name {
            graphs.insert(g.as_str().to_string());
        }
    }
    println!("quads: {quad_count}");
    println!("distinct named subjects: {}", resources.len());
    println!("provenance graphs: {}", graphs.len());
    println!("checked at: {}", Utc::now().to_rfc3339());
    Ok(())
}

fn resource_graph_to_json(graph: &SimpleResourceGraph) -> serde_json::Value {
    let mut uris: Vec<&str> = graph.uris().collect();
    uris.sort_unstable();
    let mut out = serde_json::Map::new();
    for uri in uris {
        let resource = graph.get(uri).expect("uri came from this graph's own listing");
        let mut by_property: std::collections::BTreeMap<String, Vec<serde_json::Value>> = Default::default();
        for (property, value) in resource.iter() {
            by_property
                .entry(property.as_str().to_string())
                .or_default()
                .push(serde_json::Value::String(display_term(value)));
        }
        out.insert(uri.to_string(), serde_json::json!(by_property));
    }
    serde_json::Value::Object(out)
}

fn print_resource_graph(graph: &SimpleResourceGraph) {
    let mut uris: Vec<&str> = graph.uris().collect();
    uris.sort_unstable();
    for uri in uris {
        let resource = graph.get(uri).expect("uri came from this graph's own listing");
        for (property, value) in resource.iter() {
            println!("<{uri}> <{property}> {}", display_term(value));
        }
    }
}

fn display_term(term: &Term) -> String {
    match term {
        Term::NamedNode(n) => format!("<{n}>"),
        Term::BlankNode(b) => format!("_:{}", b.as_str()),
        Term::Literal(l) => l.to_string(),
        #[allow(unreachable_patterns)]
        _ => String::new(),
    }
}

fn parse_uri(raw: &str) -> Result<NamedNode> {
    if let Some(blank) = raw.strip_prefix("_:") {
        return Ok(NamedNode::new_unchecked(format!("_:{blank}")));
    }
    NamedNode::new(raw).map_err(|e| Error::msg(format!("'{raw}' is not a valid URI: {e}")))
}

fn parse_uris(raw: &[String]) -> Result<Vec<NamedNode>> {
    raw.iter().map(|r| parse_uri(r)).collect()
}

/// Parses a CLI-supplied value heuristically; the core re-coerces it against
/// the property's declared range regardless, so a misguessed type here (e.g.
/// treating a numeric-looking resource identifier as an integer) is corrected
/// before it is ever written.
fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Double(f);
    }
    match raw {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::String(raw.to_string()),
    }
}

fn parse_metadata(raw: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            bail!("metadata entry '{entry}' is not in key=value form");
        };
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

fn rdf_format_for(path: &std::path::Path) -> RdfFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("trig") => RdfFormat::TriG,
        Some("nq") | Some("nquads") => RdfFormat::NQuads,
        Some("ttl") => RdfFormat::Turtle,
        Some("nt") => RdfFormat::NTriples,
        _ => RdfFormat::NQuads,
    }
}

/// Parses `path` into a [`SimpleResourceGraph`], representing blank-node
/// subjects/objects the same way `storeResources` expects incoming
/// blank-node URIs: a `_:`-prefixed string wrapped in a `NamedNode`, never
/// `oxigraph`'s own `Term::BlankNode`.
fn load_resource_graph(path: &std::path::Path) -> Result<SimpleResourceGraph> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let parser = RdfParser::from_format(rdf_format_for(path));
    let mut graph = SimpleResourceGraph::new();
    for quad in parser.for_reader(std::io::Cursor::new(bytes)) {
        let quad = quad.with_context(|| format!("parsing {}", path.display()))?;
        let subject = match quad.subject {
            NamedOrBlankNode::NamedNode(n) => n,
            NamedOrBlankNode::BlankNode(b) => NamedNode::new_unchecked(format!("_:{}", b.as_str())),
        };
        let object = match quad.object {
            Term::NamedNode(n) => Term::NamedNode(n),
            Term::BlankNode(b) => Term::NamedNode(NamedNode::new_unchecked(format!("_:{}", b.as_str()))),
            Term::Literal(l) => Term::Literal(l),
            #[allow(unreachable_patterns)]
            other => other,
        };
        match graph.get_mut(subject.as_str()) {
            Some(resource) => resource.insert(quad.predicate, object),
            None => {
                let mut resource = SyncResource::new(subject.as_str());
                resource.insert(quad.predicate, object);
                graph.insert(resource);
            }
        }
    }
    Ok(graph)
}
