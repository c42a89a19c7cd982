use anyhow::Result;
use clap::Command;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use sitegen_dev_server::{LiveServer, LiveServerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cmd::build::{BuildOptions, run_build};
use crate::config::CliConfig;

pub fn make_serve_subcommand() -> Command {
    Command::new("serve").about("Serve the built site")
}

pub fn make_dev_subcommand() -> Command {
    Command::new("dev").about("Build, serve with live reload and rebuild on changes")
}

fn server_config(config: &CliConfig, live_reload: bool) -> LiveServerConfig {
    let server = &config.development.server;
    LiveServerConfig {
        host: server.host.clone(),
        port: server.port,
        root: config.output_dir(),
        open: server.open,
        live_reload,
        ignore: vec![".git".to_string(), ".tmp".to_string()],
    }
}

pub async fn execute_serve(config: &CliConfig) -> Result<()> {
    tracing::info!("Starting development server...");
    tracing::info!("Press Ctrl+C to stop");
    LiveServer::new(server_config(config, false)).run().await
}

pub async fn execute_dev(config: &CliConfig) -> Result<()> {
    tracing::info!("Starting development mode...");

    let initial = config.clone();
    let built =
        tokio::task::spawn_blocking(move || run_build(&initial, &BuildOptions::default())).await??;
    if !built {
        anyhow::bail!("Initial build failed");
    }

    let server = LiveServer::new(server_config(config, true));
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("Dev server error: {}", e);
        }
    });

    let watcher_config = config.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_sources(watcher_config).await {
            tracing::error!("Source watcher error: {}", e);
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;
    Ok(())
}

/// Paths a rebuild depends on
fn source_paths(config: &CliConfig) -> Vec<PathBuf> {
    vec![
        config.content_dir(),
        config.resolve(&config.build.template_dir),
        config.resolve(&config.build.static_dir),
        config.config_file.clone(),
    ]
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

async fn watch_sources(config: CliConfig) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(
        Duration::from_millis(500),
        move |res: DebounceEventResult| {
            if let Ok(events) = res {
                for event in events {
                    let _ = tx.blocking_send(event.path);
                }
            }
        },
    )?;

    let mut watched = Vec::new();
    for path in source_paths(&config) {
        if path.is_dir() {
            debouncer
                .watcher()
                .watch(&path, notify::RecursiveMode::Recursive)?;
        } else if path.is_file() {
            debouncer
                .watcher()
                .watch(&path, notify::RecursiveMode::NonRecursive)?;
        } else {
            continue;
        }
        tracing::info!("Watching {}", path.display());
        watched.push(canonical(&path));
    }

    let output_dir = canonical(&config.output_dir());
    let rebuild = BuildOptions {
        // Keep the served directory in place so its watcher survives
        clean: false,
        backup: false,
        validate_project: false,
        validate_output: false,
    };

    while let Some(path) = rx.recv().await {
        let path = canonical(&path);
        if path.starts_with(&output_dir) || !watched.iter().any(|w| path.starts_with(w)) {
            continue;
        }
        tracing::info!("Changed: {}", path.display());

        let build_config = config.clone();
        let options = rebuild.clone();
        match tokio::task::spawn_blocking(move || run_build(&build_config, &options)).await? {
            Ok(true) => tracing::info!("Site rebuilt"),
            Ok(false) => tracing::warn!("Rebuild reported problems"),
            Err(e) => tracing::error!("Rebuild failed: {e:#}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_server_serves_output_with_reload() {
        let mut config = CliConfig {
            config_file: PathBuf::from("site/site.config.yaml"),
            ..Default::default()
        };
        config.development.server.port = 9000;

        let server = server_config(&config, true);
        assert_eq!(server.root, PathBuf::from("site/docs"));
        assert_eq!(server.port, 9000);
        assert_eq!(server.host, "localhost");
        assert!(server.live_reload);
    }

    #[test]
    fn test_watches_sources_and_config() {
        let config = CliConfig {
            config_file: PathBuf::from("site/site.config.yaml"),
            ..Default::default()
        };
        assert_eq!(
            source_paths(&config),
            vec![
                PathBuf::from("site/content"),
                PathBuf::from("site/templates"),
                PathBuf::from("site/static"),
                PathBuf::from("site/site.config.yaml"),
            ]
        );
    }
}
