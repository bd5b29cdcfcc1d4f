use crate::core::plugin::PluginRegistry;
use anyhow::Result;
use tracing::info;

pub fn handle_list_plugins_cli() -> Result<()> {
    let registry = PluginRegistry::builtin();
    info!("🧩 {} built-in plugin(s):", registry.len());
    for name in registry.names() {
        info!("  - {}", name);
    }
    Ok(())
}
