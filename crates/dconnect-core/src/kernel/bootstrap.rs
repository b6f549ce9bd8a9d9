use std::sync::Arc;

use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::config::CoreConfig;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::{DevicePluginManager, HostBridge, PluginRegistry};
use crate::storage::SettingsStore;

/// Owns the plugin core and drives its lifecycle.
///
/// `initialize` discovers plugins, `start` connects the enabled ones and
/// `shutdown` disconnects everything, in reverse registration order.
#[derive(Debug)]
pub struct Application {
    config: CoreConfig,
    registry: Arc<PluginRegistry>,
    plugin_manager: Arc<DevicePluginManager>,
    components: DependencyRegistry,
    initialized: bool,
}

impl Application {
    /// Wire the core around an injected host and settings store.
    /// Must be called from within a Tokio runtime.
    pub fn new(host: Arc<dyn HostBridge>, store: Arc<dyn SettingsStore>, config: CoreConfig) -> Self {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        log::debug!("Service id domain: {}", config.domain);

        let registry = Arc::new(PluginRegistry::new());
        let plugin_manager = Arc::new(DevicePluginManager::new(
            host,
            store,
            registry.clone(),
            config.clone(),
        ));

        let mut components = DependencyRegistry::new();
        components.register_instance(plugin_manager.clone());

        Self {
            config,
            registry,
            plugin_manager,
            components,
            initialized: false,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn plugin_manager(&self) -> &Arc<DevicePluginManager> {
        &self.plugin_manager
    }

    /// Gets a specific component instance by its concrete type
    pub fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        self.components.get_concrete::<T>()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialize then start every component
    pub async fn startup(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Bootstrap,
                component_name: None,
                message: "Application already initialized".to_string(),
                source: None,
            });
        }
        self.initialize().await?;
        self.start().await?;
        self.initialized = true;
        log::info!("{} started with {} device plugin(s)", constants::APP_NAME, self.registry.len());
        Ok(())
    }

    /// Run discovery on every component
    pub async fn initialize(&mut self) -> Result<()> {
        for component in self.components.components() {
            log::info!("Initializing component: {}", component.name());
            component
                .initialize()
                .await
                .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Initialize, component.name(), e))?;
        }
        Ok(())
    }

    pub async fn start(&mut self) -> Result<()> {
        for component in self.components.components() {
            log::info!("Starting component: {}", component.name());
            component
                .start()
                .await
                .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Start, component.name(), e))?;
        }
        Ok(())
    }

    /// Stop every component in reverse order, reporting the first failure
    pub async fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        for component in self.components.components().into_iter().rev() {
            log::info!("Stopping component: {}", component.name());
            if let Err(e) = component.stop().await {
                log::error!("Error stopping component {}: {}", component.name(), e);
                first_error
                    .get_or_insert_with(|| Error::lifecycle(KernelLifecyclePhase::Shutdown, component.name(), e));
            }
        }
        self.initialized = false;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
