use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapter::CollectionAdapter;
use crate::config::{RuntimeConfig, ServiceConfig};
use crate::context::RequestContext;
use crate::model::{BodyParser, JsonEntryParser};
use crate::security::HeaderIdentityResolver;
use crate::service::AtomService;
use crate::target::{RouteTable, TargetResolver};

/// Inspect and exercise an AtomPub route configuration.
#[derive(Parser, Debug)]
#[command(name = "atomrouter", version, about = "AtomPub routing and dispatch tool", long_about = None)]
pub struct Cli {
    /// Service configuration (YAML or JSON)
    #[arg(short, long, env = "ATOMR_CONFIG", default_value = "atomrouter.yaml")]
    pub config: PathBuf,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registrations in resolution order
    Routes {
        /// Emit JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Resolve a path to its target
    Resolve {
        /// Request path, query allowed
        path: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
    /// Expand a named route
    UrlFor {
        /// Route name, e.g. `posts.entry`
        name: String,

        /// Parameters as `name=value`
        #[arg(value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Run one request against in-memory collections
    Request {
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request target, e.g. `/posts/hello`
        uri: String,

        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Request body; `@path` reads a file
        #[arg(short, long)]
        data: Option<String>,

        /// Seed an entry before the request as `collection=key=entry.json` (repeatable)
        #[arg(long, value_parser = parse_seed)]
        seed: Vec<(String, String, PathBuf)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected 'Name: value', got '{s}'"))
}

fn parse_seed(s: &str) -> Result<(String, String, PathBuf), String> {
    let mut parts = s.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(c), Some(k), Some(p)) if !c.is_empty() && !k.is_empty() => {
            Ok((c.to_string(), k.to_string(), PathBuf::from(p)))
        }
        _ => Err(format!("expected collection=key=path, got '{s}'")),
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).with_context(|| format!("invalid method {method}"))
}

/// Loaded configuration plus the in-memory adapters backing it.
struct Loaded {
    config: ServiceConfig,
    runtime: RuntimeConfig,
    adapters: Vec<Arc<dyn CollectionAdapter>>,
    table: RouteTable,
}

fn load(cli: &Cli) -> Result<Loaded> {
    let mut config = ServiceConfig::load(&cli.config)?;
    let runtime = RuntimeConfig::from_env();
    runtime.apply(&mut config);
    let adapters = config.memory_adapters();
    let table = config.build(&adapters)?;
    Ok(Loaded {
        config,
        runtime,
        adapters,
        table,
    })
}

/// Parse the process arguments and run.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)
}

/// Run `cli`, writing the report to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let loaded = load(cli)?;
    match &cli.command {
        Commands::Routes { json } => routes(&loaded.table, *json, out),
        Commands::Resolve { path, method } => {
            let method = parse_method(method)?;
            let target = TargetResolver::new(&loaded.table).resolve_path(&method, path);
            let params: BTreeMap<&str, &str> = target.params().iter().collect();
            writeln!(out, "type:   {}", target.resource_type())?;
            writeln!(out, "route:  {}", target.route_name().unwrap_or("-"))?;
            writeln!(out, "params: {}", serde_json::to_string(&params)?)?;
            Ok(())
        }
        Commands::UrlFor { name, params } => {
            let source: BTreeMap<String, String> = params.iter().cloned().collect();
            let url = loaded
                .table
                .expand(name, &source)
                .ok_or_else(|| anyhow!("no route named '{name}'"))?;
            writeln!(out, "{url}")?;
            Ok(())
        }
        Commands::Request {
            method,
            uri,
            headers,
            data,
            seed,
        } => request(loaded, parse_method(method)?, uri, headers, data.as_deref(), seed, out),
    }
}

fn routes(table: &RouteTable, as_json: bool, out: &mut dyn Write) -> Result<()> {
    let summary = table.summary();
    if as_json {
        let rows: Vec<_> = summary
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "source": s.source,
                    "type": s.resource_type,
                    "adapter": s.adapter,
                    "collection_root": s.collection_root,
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(());
    }
    for (idx, s) in summary.iter().enumerate() {
        writeln!(
            out,
            "{idx:>3}  {:<20} {:<11} {}{}",
            s.name,
            s.resource_type.as_str(),
            s.source,
            s.adapter.as_deref().map(|a| format!("  [{a}]")).unwrap_or_default()
        )?;
    }
    Ok(())
}

fn request(
    loaded: Loaded,
    method: Method,
    uri: &str,
    headers: &[(String, String)],
    data: Option<&str>,
    seed: &[(String, String, PathBuf)],
    out: &mut dyn Write,
) -> Result<()> {
    let parser = JsonEntryParser;
    for (collection, key, path) in seed {
        let adapter = loaded
            .adapters
            .iter()
            .find(|a| a.name() == collection.as_str())
            .ok_or_else(|| anyhow!("no collection '{collection}' to seed"))?;
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let entry = parser.parse_entry(&bytes)?;
        let placeholder = RequestContext::new(Method::POST, uri);
        let member = adapter.create_member(&placeholder, entry, Some(key))?;
        if member.key != *key {
            bail!("seed key '{key}' already taken in '{collection}'");
        }
    }

    let mut request = RequestContext::new(method, uri);
    if let Some(base) = loaded.config.base_url()? {
        request = request.with_base(base);
    }
    if let Some(context_path) = &loaded.config.context_path {
        request = request.with_context_path(context_path);
    }
    let mut content_type = None;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.clone());
        } else {
            request = request.with_header(name, value.as_str());
        }
    }
    if let Some(data) = data {
        let body = match data.strip_prefix('@') {
            Some(path) => std::fs::read(path).with_context(|| format!("failed to read {path}"))?,
            None => data.as_bytes().to_vec(),
        };
        let content_type = content_type.take().unwrap_or_else(|| "application/json".to_string());
        request = request.with_body(&content_type, body);
    }
    if let Some(content_type) = content_type {
        request = request.with_header("Content-Type", content_type);
    }

    let service = AtomService::new(loaded.table)
        .with_runtime_config(loaded.runtime)
        .with_identity_resolver(Arc::new(HeaderIdentityResolver::default()));
    let outcome = service.handle(request);

    writeln!(out, "HTTP {}", outcome.status)?;
    for (name, value) in outcome.header_lines() {
        writeln!(out, "{name}: {value}")?;
    }
    let body = outcome.render()?;
    if !body.is_empty() {
        writeln!(out)?;
        out.write_all(&body)?;
        writeln!(out)?;
    }
    Ok(())
}
