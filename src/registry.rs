use tracing::debug;

use crate::{config::StyleConfig, plugin::Plugin, styles, utils::KeyedVec, Error};

/// Builds a plugin from its configuration and the number of atom types
pub type Constructor =
    Box<dyn Fn(&StyleConfig, usize) -> Result<Box<dyn Plugin>, Error> + Send + Sync>;

/// Maps style names to plugin constructors
pub struct StyleRegistry {
    constructors: KeyedVec<String, Constructor>,
}
impl Default for StyleRegistry {
    /// Registry with every built-in style
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert_builtin(styles::LjCut::STYLE, |c, n| {
            Ok(Box::new(styles::LjCut::from_config(c, n)?))
        });
        registry.insert_builtin(styles::Viscous::STYLE, |c, _| {
            Ok(Box::new(styles::Viscous::from_config(c)?))
        });
        registry.insert_builtin(styles::Halt::STYLE, |c, _| {
            Ok(Box::new(styles::Halt::from_config(c)?))
        });
        registry.insert_builtin(styles::Thermo::STYLE, |c, _| {
            Ok(Box::new(styles::Thermo::from_config(c)?))
        });
        registry
    }
}
impl StyleRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: KeyedVec::new(),
        }
    }

    fn insert_builtin<F>(&mut self, style: &str, constructor: F)
    where
        F: Fn(&StyleConfig, usize) -> Result<Box<dyn Plugin>, Error> + Send + Sync + 'static,
    {
        self.constructors
            .add(style.to_string(), Box::new(constructor));
    }

    /// Add a style; fails if the name is taken
    pub fn register<F>(&mut self, style: &str, constructor: F) -> Result<(), Error>
    where
        F: Fn(&StyleConfig, usize) -> Result<Box<dyn Plugin>, Error> + Send + Sync + 'static,
    {
        match self
            .constructors
            .add(style.to_string(), Box::new(constructor))
        {
            Some(_) => Ok(()),
            None => Err(Error::config(format!(
                "Style '{}' is already registered",
                style
            ))),
        }
    }

    pub fn styles(&self) -> &[String] {
        self.constructors.keys()
    }
    pub fn contains(&self, style: &str) -> bool {
        self.constructors.position(&style.to_string()).is_some()
    }

    pub fn build(&self, config: &StyleConfig, num_types: usize) -> Result<Box<dyn Plugin>, Error> {
        let constructor = self.constructors.get(&config.style).ok_or_else(|| {
            Error::config(format!(
                "Unknown style '{}' for '{}'",
                config.style, config.id
            ))
        })?;
        debug!(id = %config.id, style = %config.style, "Building plugin");
        let plugin = constructor(config, num_types)?;
        if plugin.id() != config.id {
            return Err(Error::plugin(
                &config.id,
                format!("constructor produced a plugin with id '{}'", plugin.id()),
            ));
        }
        Ok(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_styles_are_registered() {
        let registry = StyleRegistry::default();
        for style in ["lj/cut", "viscous", "halt", "thermo"] {
            assert!(registry.contains(style), "{}", style);
        }
        let plugin = registry
            .build(&StyleConfig::new("t", "thermo", serde_yml::Value::Null), 1)
            .unwrap();
        assert_eq!(plugin.style(), "thermo");
    }

    #[test]
    fn unknown_and_duplicate_styles_fail() {
        let mut registry = StyleRegistry::default();
        let config = StyleConfig::new("x", "eam", serde_yml::Value::Null);
        assert!(matches!(registry.build(&config, 1), Err(Error::Config(_))));
        let dup = registry.register("halt", |c, _| Ok(Box::new(styles::Halt::from_config(c)?)));
        assert!(dup.is_err());
    }
}
