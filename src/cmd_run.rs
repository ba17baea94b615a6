//! `modhost run`: initialize, serve until shutdown, clean up.

use std::sync::Arc;

use tracing::{error, info, warn};

use modhost_config::{Config, ConfigLoader, InitPolicyConfig, PluginsConfig};
use modhost_core::{Admin, ComponentLoader, InitPolicy, LoaderSettings, Runtime, RuntimeOptions};

use crate::register::register_bundled;

pub(crate) fn runtime_options(config: &Config) -> RuntimeOptions {
    let policy = match config.runtime.init_policy {
        InitPolicyConfig::Lenient => InitPolicy::Lenient,
        InitPolicyConfig::Strict => InitPolicy::Strict,
    };
    RuntimeOptions {
        policy,
        phase_timeout: config.runtime.phase_timeout(),
        component_config: config.components.clone(),
    }
}

pub(crate) fn loader_settings(plugins: &PluginsConfig) -> LoaderSettings {
    LoaderSettings::new(ConfigLoader::expand_path(&plugins.directory))
        .with_extension(plugins.extension.clone())
        .with_include(plugins.include.iter().cloned())
        .with_exclude(plugins.exclude.iter().cloned())
}

pub(crate) async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting modhost v{}", env!("CARGO_PKG_VERSION"));

    let runtime = Runtime::new(runtime_options(&config));

    let admin = if config.runtime.dev_mode {
        info!("Dev mode: registering bundled components");
        register_bundled(&runtime)?;
        Admin::new(runtime.clone())
    } else {
        let settings = loader_settings(&config.plugins);
        info!("Loading components from {}", settings.directory.display());
        let loader = Arc::new(ComponentLoader::new(runtime.clone(), settings));
        let report = loader.load_all().await?;
        info!(
            "Loaded {} unit(s), skipped {}, failed {}",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Admin::with_loader(runtime.clone(), loader)
    };

    let report = runtime.init_all().await?;
    for (name, e) in &report.failed {
        warn!("Component {} is unavailable: {}", name, e);
    }
    info!("modhost ready: {}", report.initialized.join(" -> "));

    let served = serve(&admin).await;

    let cleanup = runtime.cleanup().await?;
    for (name, e) in &cleanup.errors {
        error!("Cleanup of {} failed: {}", name, e);
    }
    info!("Shut down");

    served
}

async fn reload(admin: &Admin) {
    match admin.reload_all().await {
        Ok(report) => info!(
            "Reloaded {} unit(s), skipped {}, failed {}",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        ),
        Err(e) => warn!("Reload failed: {}", e),
    }
}

/// Wait for a shutdown signal; SIGHUP reloads every unit.
#[cfg(unix)]
async fn serve(admin: &Admin) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break;
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP - reloading components");
                reload(admin).await;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve(_admin: &Admin) -> Result<(), Box<dyn std::error::Error>> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    Ok(())
}
