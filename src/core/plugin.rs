use crate::core::frame::{Frame, Gray16Image};
use crate::errors::AppError;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Maps a raw thermal frame to a processed one.
///
/// Implementations may fail or even panic; the acquisition loop isolates every
/// call and falls back to the unprocessed display frame.
pub trait ThermalTransform: Send + Sync {
    fn name(&self) -> &str;
    fn transform(&self, raw: &Gray16Image) -> anyhow::Result<Frame>;
}

pub type SharedTransform = Arc<dyn ThermalTransform>;

/// Name-indexed set of available transforms, assembled at bootstrap.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, SharedTransform>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every transform shipped with the crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(crate::plugins::TemperatureSegmentation::new());
        registry.register(crate::plugins::ContoursDetection::new());
        registry
    }

    /// Adds or replaces a transform under its own name.
    pub fn register<T: ThermalTransform + 'static>(&mut self, plugin: T) -> &mut Self {
        self.plugins.insert(plugin.name().to_string(), Arc::new(plugin));
        self
    }

    pub fn get(&self, name: &str) -> Option<SharedTransform> {
        self.plugins.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.plugins.keys()).finish()
    }
}

/// The active transform, if any.
///
/// Reads are not linearized with selection: the thermal loop picks up a
/// change on its next cycle.
pub struct PluginSelector {
    registry: PluginRegistry,
    active: RwLock<Option<SharedTransform>>,
}

impl PluginSelector {
    pub fn new(registry: PluginRegistry) -> Self {
        PluginSelector {
            registry,
            active: RwLock::new(None),
        }
    }

    /// `None` deselects. An unknown name leaves the current selection as is.
    pub fn select(&self, name: Option<&str>) -> Result<(), AppError> {
        let next = match name {
            None => None,
            Some(name) => Some(
                self.registry
                    .get(name)
                    .ok_or_else(|| AppError::UnknownPlugin(name.to_string()))?,
            ),
        };
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = next;
        Ok(())
    }

    pub fn clear(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn active(&self) -> Option<SharedTransform> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn active_name(&self) -> Option<String> {
        self.active().map(|p| p.name().to_string())
    }
}

impl std::fmt::Debug for PluginSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginSelector")
            .field("registry", &self.registry)
            .field("active", &self.active_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Named(&'static str);

    impl ThermalTransform for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn transform(&self, _raw: &Gray16Image) -> anyhow::Result<Frame> {
            bail!("not used")
        }
    }

    #[test]
    fn builtin_registry_lists_shipped_transforms() {
        let registry = PluginRegistry::builtin();
        assert_eq!(registry.names(), vec!["Contours detection", "Temp. Segmentation"]);
    }

    #[test]
    fn selection_switches_and_clears() {
        let mut registry = PluginRegistry::new();
        registry.register(Named("a")).register(Named("b"));
        let selector = PluginSelector::new(registry);

        assert!(selector.active().is_none());
        selector.select(Some("b")).unwrap();
        assert_eq!(selector.active_name().as_deref(), Some("b"));
        selector.select(None).unwrap();
        assert!(selector.active().is_none());
    }

    #[test]
    fn unknown_name_keeps_previous_selection() {
        let mut registry = PluginRegistry::new();
        registry.register(Named("a"));
        let selector = PluginSelector::new(registry);
        selector.select(Some("a")).unwrap();

        let err = selector.select(Some("missing")).unwrap_err();
        assert!(matches!(err, AppError::UnknownPlugin(ref n) if n == "missing"));
        assert_eq!(selector.active_name().as_deref(), Some("a"));
    }

    #[test]
    fn debug_shows_registry_and_selection() {
        let mut registry = PluginRegistry::new();
        registry.register(Named("a"));
        let selector = PluginSelector::new(registry);
        assert_eq!(format!("{:?}", selector), r#"PluginSelector { registry: ["a"], active: None }"#);
        selector.select(Some("a")).unwrap();
        assert_eq!(format!("{:?}", selector), r#"PluginSelector { registry: ["a"], active: Some("a") }"#);
    }
}
