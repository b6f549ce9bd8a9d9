mod host;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;

use dconnect_core::kernel::constants;
use dconnect_core::kernel::error::Result;
use dconnect_core::plugin_system::{AddressCodec, DevicePlugin, PluginSystemError};
use dconnect_core::storage::{FileSettingsStore, LocalStorageProvider, SettingsStore, StorageProvider};
use dconnect_core::{Application, CoreConfig};

use crate::host::{HostManifest, MANIFEST_FILE_NAME, ManifestHost};

/// dconnect: device plugin manager
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Answer "pong" and exit without touching any state
    #[arg(long)]
    ping: bool,

    /// Directory holding config.toml, host.json and the plugin settings
    #[arg(long, env = "DCONNECT_HOME", global = true)]
    config_dir: Option<PathBuf>,

    /// Host manifest, relative to the configuration directory unless absolute
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage device plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
    /// Show which plugin and local service an application-facing service id addresses
    Resolve {
        service_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List discovered plugins
    List {},
    /// Enable a plugin and connect it
    Enable { plugin_id: String },
    /// Disable a plugin and disconnect it
    Disable { plugin_id: String },
    /// Print the communication report of a plugin as JSON
    Report { plugin_id: String },
    /// Forget the communication history of a plugin
    Clear { plugin_id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    init_logging();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Keep stdout for command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_config_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(constants::CONFIG_DIR_NAME)
}

fn build_application(config_dir: &Path, manifest: Option<&Path>) -> Result<Application> {
    info!("Using configuration directory {}", config_dir.display());
    let provider = Arc::new(LocalStorageProvider::new(config_dir.to_path_buf()));

    let config_path = Path::new(constants::CONFIG_FILE_NAME);
    let config = if provider.is_file(config_path) {
        CoreConfig::load(provider.as_ref(), config_path)?
    } else {
        CoreConfig::default()
    };

    let manifest_path = manifest.unwrap_or(Path::new(MANIFEST_FILE_NAME));
    let host = ManifestHost::new(HostManifest::load(provider.as_ref(), manifest_path)?);
    let store: Arc<dyn SettingsStore> = Arc::new(FileSettingsStore::new(provider, constants::SETTINGS_DIR_NAME));

    Ok(Application::new(Arc::new(host), store, config))
}

async fn run(args: CliArgs) -> Result<()> {
    let config_dir = args.config_dir.unwrap_or_else(default_config_dir);
    let mut app = build_application(&config_dir, args.manifest.as_deref())?;

    match args.command {
        Some(Commands::Plugin { command }) => {
            app.initialize().await?;
            let result = run_plugin_command(&app, command).await;
            app.shutdown().await?;
            result
        }
        Some(Commands::Resolve { service_id }) => {
            app.initialize().await?;
            let result = resolve(&app, &service_id);
            app.shutdown().await?;
            result
        }
        None => {
            app.startup().await?;
            for plugin in app.registry().all() {
                println!("{}", describe(&plugin));
            }
            app.shutdown().await
        }
    }
}

async fn run_plugin_command(app: &Application, command: PluginCommand) -> Result<()> {
    let manager = app.plugin_manager();
    match command {
        PluginCommand::List {} => {
            let plugins = manager.device_plugins();
            if plugins.is_empty() {
                println!("No device plugins found.");
            }
            for plugin in plugins {
                println!("{}", describe(&plugin));
            }
        }
        PluginCommand::Enable { plugin_id } => {
            let plugin = find_plugin(app, &plugin_id)?;
            plugin.enable().await?;
            println!("Enabled {} ({})", plugin.plugin_id(), plugin.state());
        }
        PluginCommand::Disable { plugin_id } => {
            let plugin = find_plugin(app, &plugin_id)?;
            plugin.disable().await;
            println!("Disabled {}", plugin.plugin_id());
        }
        PluginCommand::Report { plugin_id } => {
            let plugin = find_plugin(app, &plugin_id)?;
            let report = serde_json::to_string_pretty(&plugin.report()).map_err(|e| e.to_string())?;
            println!("{}", report);
        }
        PluginCommand::Clear { plugin_id } => {
            let plugin = find_plugin(app, &plugin_id)?;
            plugin.history().clear();
            println!("Cleared history of {}", plugin.plugin_id());
        }
    }
    Ok(())
}

fn resolve(app: &Application, service_id: &str) -> Result<()> {
    let codec = AddressCodec::new(app.config().domain.as_str());
    let plugin_id = codec
        .plugin_id_from_service_id(service_id)
        .ok_or_else(|| PluginSystemError::UnknownServiceId(service_id.to_string()))?;
    let plugin = find_plugin(app, plugin_id)?;
    let local = codec.split_plugin_id_to_service_id(plugin_id, service_id);

    println!("plugin: {}", plugin.plugin_id());
    println!("component: {}", plugin.descriptor().component);
    println!("service: {}", local.as_deref().unwrap_or("-"));
    Ok(())
}

fn find_plugin(app: &Application, plugin_id: &str) -> Result<Arc<DevicePlugin>> {
    app.plugin_manager()
        .device_plugin(plugin_id)
        .ok_or_else(|| PluginSystemError::PluginNotFound(plugin_id.to_string()).into())
}

fn describe(plugin: &DevicePlugin) -> String {
    let descriptor = plugin.descriptor();
    let status = if plugin.is_enabled() { "Enabled" } else { "Disabled" };
    let profiles: Vec<_> = descriptor.profiles.iter().map(String::as_str).collect();
    format!(
        "{}  {}  {} v{}  [{}]  {}",
        descriptor.plugin_id,
        status,
        descriptor.name,
        descriptor.version,
        profiles.join(", "),
        plugin.state()
    )
}
