//! RON loader for class catalogs and session configuration

use crate::error::{Error, Result};
use crate::schema::ClassDef;
use federa_core::{EntityClassDefinition, SessionConfig};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Loads class catalogs and a session configuration from RON
#[derive(Debug, Default)]
pub struct Loader {
    classes: IndexMap<String, ClassDef>,
    config: Option<SessionConfig>,
}

impl Loader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single RON file
    ///
    /// Files containing a `classes:` list are read as catalogs, anything else
    /// as a session configuration.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading script");

        if content.contains("classes:") {
            self.load_classes_str(&content)
        } else {
            self.load_config_str(&content).map(|_| ())
        }
    }

    /// Load a class catalog from a RON string
    pub fn load_classes_str(&mut self, content: &str) -> Result<()> {
        #[derive(serde::Deserialize)]
        struct ClassFile {
            classes: Vec<ClassDef>,
        }

        let file: ClassFile = ron::from_str(content)?;
        for class in file.classes {
            class.validate().map_err(Error::InvalidSchema)?;
            if self.classes.contains_key(&class.name) {
                return Err(Error::DuplicateDefinition(class.name));
            }
            debug!(class = %class.name, attributes = class.attributes.len(), "loaded class");
            self.classes.insert(class.name.clone(), class);
        }
        Ok(())
    }

    /// Load and validate a session configuration from a RON string
    pub fn load_config_str(&mut self, content: &str) -> Result<&SessionConfig> {
        let config: SessionConfig = ron::from_str(content)?;
        config.validate()?;
        Ok(self.config.insert(config))
    }

    /// Loaded class schemas in load order
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.values()
    }

    /// Look up a loaded class schema
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Runtime definitions for every loaded class
    pub fn definitions(&self) -> Vec<EntityClassDefinition> {
        self.classes.values().map(ClassDef::to_definition).collect()
    }

    /// The loaded session configuration, if any
    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }
}

/// Read and validate a session configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<SessionConfig> {
    let content = fs::read_to_string(path)?;
    let config: SessionConfig = ron::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use federa_core::{AttributeCodec, Backoff};

    const BALLS: &str = r#"
(
    classes: [
        (
            name: "BallEntity",
            description: "A bouncing ball",
            attributes: [
                (name: "PositionVector", codec: Vector2),
                (name: "VelocityVector", codec: Vector2),
                (name: "Radius", codec: Integer),
            ],
        ),
    ],
)
"#;

    #[test]
    fn test_load_classes() {
        let mut loader = Loader::new();
        loader.load_classes_str(BALLS).unwrap();

        let ball = loader.class("BallEntity").unwrap();
        assert_eq!(ball.attributes.len(), 3);
        assert_eq!(ball.attributes[2].codec, AttributeCodec::Integer);

        let definitions = loader.definitions();
        let names: Vec<_> = definitions[0].attribute_names().collect();
        assert_eq!(names, ["PositionVector", "VelocityVector", "Radius"]);
    }

    #[test]
    fn test_duplicate_class() {
        let mut loader = Loader::new();
        loader.load_classes_str(BALLS).unwrap();
        let err = loader.load_classes_str(BALLS).unwrap_err();
        assert!(matches!(err, Error::DuplicateDefinition(name) if name == "BallEntity"));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let content = r#"(classes: [(name: "Ball", attributes: [
            (name: "Radius", codec: Integer),
            (name: "Radius", codec: Integer),
        ])])"#;
        let err = Loader::new().load_classes_str(content).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_unknown_codec_is_parse_error() {
        let content = r#"(classes: [(name: "Ball", attributes: [(name: "Radius", codec: Float)])])"#;
        let err = Loader::new().load_classes_str(content).unwrap_err();
        assert!(matches!(err, Error::Ron(_)));
    }

    #[test]
    fn test_load_config_with_defaults() {
        let content = r#"(
            federation_name: "Main Sim Federation",
            federate_name: "Main Sim Federate",
            fom_location: "MainSim.xml",
        )"#;
        let mut loader = Loader::new();
        let config = loader.load_config_str(content).unwrap().clone();

        assert_eq!(config.federation_name, "Main Sim Federation");
        assert!(config.create_federation);
        assert_eq!(config.join.max_attempts, 10);
        assert_eq!(config.tick_interval_ms, 200);
        assert_eq!(loader.config(), Some(&config));
    }

    #[test]
    fn test_load_config_with_backoff() {
        let content = r#"(
            federation_name: "Fed",
            federate_name: "Me",
            fom_location: "Fed.xml",
            tolerate_existing_federation: true,
            join: (max_attempts: 5, backoff: Exponential(initial_ms: 50, max_ms: 800)),
            callback_wait: (min_secs: 0.0, max_secs: 0.05),
        )"#;
        let mut loader = Loader::new();
        let config = loader.load_config_str(content).unwrap();

        assert!(config.tolerate_existing_federation);
        assert_eq!(config.join.max_attempts, 5);
        assert_eq!(
            config.join.backoff,
            Backoff::Exponential {
                initial_ms: 50,
                max_ms: 800
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let content = r#"(federation_name: "", federate_name: "Me", fom_location: "Fed.xml")"#;
        let err = Loader::new().load_config_str(content).unwrap_err();
        assert!(matches!(err, Error::Config(federa_core::Error::InvalidConfig(_))));
    }
}
