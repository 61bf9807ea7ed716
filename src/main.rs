use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, anyhow};
use texture_forge::{
    TextureGraph,
    catalog::{NodeCatalog, load_catalog_from_path, load_default_catalog},
    shader::PREVIEW_VERTEX_SHADER,
    snapshot::{load_snapshot_from_path, save_snapshot_to_path},
    ws,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_WS_ADDR: &str = "127.0.0.1:8090";

#[derive(Debug, Default, Clone)]
struct Cli {
    snapshot: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    serve: Option<String>,
    catalog: Option<PathBuf>,
    save_snapshot: Option<PathBuf>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = || {
            args.get(i + 1)
                .ok_or_else(|| anyhow!("missing value for {flag}"))
        };
        match flag {
            "--snapshot" => cli.snapshot = Some(PathBuf::from(value()?)),
            "--outputdir" | "--output-dir" => cli.output_dir = Some(PathBuf::from(value()?)),
            "--serve" => cli.serve = Some(value()?.clone()),
            "--catalog" => cli.catalog = Some(PathBuf::from(value()?)),
            "--save-snapshot" => cli.save_snapshot = Some(PathBuf::from(value()?)),
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --snapshot <file.json>, --output-dir <dir>, --serve <addr>, --catalog <file.json>, --save-snapshot <file.json>)"
                ));
            }
        }
        i += 2;
    }
    Ok(cli)
}

fn load_catalog(path: Option<&Path>) -> Result<NodeCatalog> {
    match path {
        Some(path) => load_catalog_from_path(path)
            .with_context(|| format!("failed to load --catalog {}", path.display())),
        None => load_default_catalog().context("bundled node catalog is invalid"),
    }
}

fn load_graph(catalog: Arc<NodeCatalog>, snapshot: Option<&Path>) -> Result<TextureGraph> {
    let mut graph = TextureGraph::new(catalog);
    if let Some(path) = snapshot {
        let snapshot = load_snapshot_from_path(path)
            .with_context(|| format!("failed to read --snapshot {}", path.display()))?;
        graph
            .load_snapshot(&snapshot)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?;
    }
    Ok(graph)
}

/// Write `<node>.frag` for every ready node, plus the shared vertex stage.
fn compile_snapshot(graph: &TextureGraph, output_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir {}", output_dir.display()))?;

    let vertex_path = output_dir.join("preview.vert");
    std::fs::write(&vertex_path, PREVIEW_VERTEX_SHADER)
        .with_context(|| format!("failed to write {}", vertex_path.display()))?;

    let mut written = 0;
    for id in graph.ready_nodes() {
        let Some(shader) = graph.fragment_shader(id) else {
            continue;
        };
        let path = output_dir.join(format!("{id}.frag"));
        std::fs::write(&path, shader)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(node = %id, path = %path.display(), "wrote fragment shader");
        written += 1;
    }

    let skipped = graph.graph().nodes().len() - written;
    if skipped > 0 {
        tracing::warn!(skipped, "some nodes have unconnected inputs upstream and were skipped");
    }
    Ok(written)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,texture_forge=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;

    let catalog = Arc::new(load_catalog(cli.catalog.as_deref())?);
    tracing::info!(node_types = catalog.len(), "loaded node catalog");
    let graph = load_graph(catalog, cli.snapshot.as_deref())?;

    // Written after repairs, so it is the snapshot the engine actually loaded.
    if let Some(path) = cli.save_snapshot.as_deref() {
        save_snapshot_to_path(&graph.snapshot(), path)
            .with_context(|| format!("failed to write --save-snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved normalized snapshot");
    }

    if cli.serve.is_none() {
        if let Some(snapshot_path) = cli.snapshot.as_deref() {
            let output_dir = cli.output_dir.unwrap_or_else(|| {
                snapshot_path
                    .parent()
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| PathBuf::from("."))
            });
            let written = compile_snapshot(&graph, &output_dir)?;
            tracing::info!(written, dir = %output_dir.display(), "compiled snapshot");
            return Ok(());
        }
    }

    let addr = cli.serve.as_deref().unwrap_or(DEFAULT_WS_ADDR);
    let state = Arc::new(Mutex::new(graph));
    let handle = ws::spawn_ws_server(addr, state, ws::WsHub::default())?;
    handle
        .join()
        .map_err(|_| anyhow!("ws server thread panicked"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_cli_snapshot_outputdir() {
        let cli = parse_cli(&args(&["--snapshot", "graph.json", "--outputdir", "out"])).unwrap();
        assert_eq!(cli.snapshot.as_ref().unwrap(), &PathBuf::from("graph.json"));
        assert_eq!(cli.output_dir.as_ref().unwrap(), &PathBuf::from("out"));
        assert!(cli.serve.is_none());
    }

    #[test]
    fn parse_cli_rejects_unknown_and_dangling_flags() {
        assert!(parse_cli(&args(&["--headless"])).is_err());
        assert!(parse_cli(&args(&["--serve"])).is_err());
        let cli = parse_cli(&args(&["--serve", "0.0.0.0:9000"])).unwrap();
        assert_eq!(cli.serve.as_deref(), Some("0.0.0.0:9000"));
    }

    #[test]
    fn save_snapshot_writes_a_loadable_file() {
        let dir = std::env::temp_dir().join(format!("texture-forge-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let out = dir.join("saved.json");
        let cli = parse_cli(&args(&["--save-snapshot", out.to_str().unwrap()])).unwrap();
        assert_eq!(cli.save_snapshot.as_deref(), Some(out.as_path()));

        let catalog = Arc::new(load_catalog(None).unwrap());
        let mut graph = load_graph(catalog.clone(), None).unwrap();
        graph.add_node("a", "simplex", Default::default()).unwrap();
        save_snapshot_to_path(&graph.snapshot(), &out).unwrap();

        let reloaded = load_graph(catalog, Some(&out)).unwrap();
        assert_eq!(reloaded.snapshot(), graph.snapshot());
        assert_eq!(reloaded.ready_nodes(), vec!["a"]);
        let written = compile_snapshot(&reloaded, &dir).unwrap();
        assert_eq!(written, 1);
        assert!(dir.join("a.frag").exists());
        assert!(dir.join("preview.vert").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
