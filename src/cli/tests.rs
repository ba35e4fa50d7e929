//! Unit tests for CLI commands

use crate::cli::{run, Cli, Commands};
use clap::Parser;
use std::io::Write;

const CONFIG: &str = r#"
base_uri: http://blog.example/
service: /
workspaces:
  - title: Blog
    collections:
      - name: posts
        href: /posts
routes:
  - name: entry
    template: /{collection}/{entry}
    type: entry
"#;

fn config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();
    file
}

fn run_args(args: &[&str]) -> String {
    let file = config_file();
    let path = file.path().to_string_lossy().to_string();
    let mut argv = vec!["atomrouter", "--config", path.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let mut out = Vec::new();
    run(&cli, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_commands_parse() {
    let cli = Cli::try_parse_from(["atomrouter", "resolve", "/posts/1", "-X", "delete"]).unwrap();
    match cli.command {
        Commands::Resolve { path, method } => {
            assert_eq!(path, "/posts/1");
            assert_eq!(method, "delete");
        }
        _ => panic!("Expected Resolve command"),
    }
    assert_eq!(cli.config.to_string_lossy(), "atomrouter.yaml");

    let cli = Cli::try_parse_from(["atomrouter", "url-for", "entry", "collection=posts", "entry=1"]).unwrap();
    match cli.command {
        Commands::UrlFor { name, params } => {
            assert_eq!(name, "entry");
            assert_eq!(params.len(), 2);
            assert_eq!(params[0], ("collection".to_string(), "posts".to_string()));
        }
        _ => panic!("Expected UrlFor command"),
    }
}

#[test]
fn test_malformed_arguments_are_rejected() {
    assert!(Cli::try_parse_from(["atomrouter", "url-for", "entry", "novalue"]).is_err());
    assert!(Cli::try_parse_from(["atomrouter", "request", "/x", "-H", "no-colon"]).is_err());
    assert!(Cli::try_parse_from(["atomrouter", "request", "/x", "--seed", "posts=only"]).is_err());
}

#[test]
fn test_routes_lists_resolution_order() {
    let out = run_args(&["routes"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("service"));
    assert!(lines[1].contains("posts") && lines[1].contains("[posts]"));
    assert!(lines[2].contains("/{collection}/{entry}"));

    let json: serde_json::Value = serde_json::from_str(&run_args(&["routes", "--json"])).unwrap();
    assert_eq!(json[1]["type"], "COLLECTION");
    assert_eq!(json[1]["collection_root"], true);
}

#[test]
fn test_resolve_and_url_for() {
    let out = run_args(&["resolve", "/drafts/9?x=1"]);
    assert!(out.contains("type:   ENTRY"));
    assert!(out.contains(r#""entry":"9""#));

    let out = run_args(&["url-for", "posts.entry", "entry=a b"]);
    assert_eq!(out.trim(), "/posts/a%20b");
}

#[test]
fn test_request_runs_pipeline() {
    let out = run_args(&["request", "/posts"]);
    assert!(out.starts_with("HTTP 200"));
    assert!(out.contains("ETag: "));
    assert!(out.contains(r#""kind":"feed""#));

    let out = run_args(&["request", "-X", "DELETE", "/"]);
    assert!(out.starts_with("HTTP 405"));
    assert!(out.contains("Allow: GET, HEAD, OPTIONS"));
}

#[test]
fn test_request_with_body_creates_member() {
    let entry = r#"{"id":"urn:x:1","title":"Hi","authors":[{"name":"a"}],"updated":"2024-01-01T00:00:00Z","content":{"value":"x"}}"#;
    let out = run_args(&["request", "-X", "POST", "/posts", "-H", "Slug: hello there", "-d", entry]);
    assert!(out.starts_with("HTTP 201"), "{out}");
    assert!(out.contains("Location: http://blog.example/posts/hello_there"));
}
