use std::{
    io,
    path::{Path, PathBuf},
};

use fs_err as fs;
use packos::{Packer, PackingOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

static CONFIG_FILENAME: &str = "texpack.toml";

/// Configuration for one atlas, contained in a texpack.toml file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct AtlasConfig {
    /// The name of the atlas, used in logs and error messages.
    pub name: String,

    #[serde(default)]
    pub packing: PackingConfig,

    /// The path that this config came from, if it was read from disk.
    #[serde(skip)]
    pub file_path: PathBuf,
}

/// The `[packing]` table. Every key is optional and falls back to the same
/// defaults as `PackingOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PackingConfig {
    #[serde(default = "default_allow_rotation")]
    pub allow_rotation: bool,

    #[serde(default = "default_padding_horizontal")]
    pub padding_horizontal: i32,

    #[serde(default = "default_padding_vertical")]
    pub padding_vertical: i32,

    /// Empty margin along every edge of a page.
    #[serde(default = "default_edge_border")]
    pub edge_border: i32,

    /// The largest a page may grow to, as `[width, height]`.
    #[serde(default = "default_max_size")]
    pub max_size: (i32, i32),

    /// Round page dimensions up to powers of two.
    #[serde(default = "default_power_of_two")]
    pub power_of_two: bool,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self::from(PackingOptions::default())
    }
}

impl From<PackingOptions> for PackingConfig {
    fn from(options: PackingOptions) -> Self {
        Self {
            allow_rotation: options.allow_rotation,
            padding_horizontal: options.padding_horizontal,
            padding_vertical: options.padding_vertical,
            edge_border: options.edge_border,
            max_size: options.max_size(),
            power_of_two: options.output_pages_as_power_of_two,
        }
    }
}

impl AtlasConfig {
    pub fn read_from_folder_or_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;

        if meta.is_file() {
            Self::read_from_file(path)
        } else {
            Self::read_from_folder(path)
        }
    }

    pub fn read_from_folder<P: AsRef<Path>>(folder_path: P) -> Result<Self, ConfigError> {
        let folder_path = folder_path.as_ref();
        let file_path = &folder_path.join(CONFIG_FILENAME);

        Self::read_from_file(file_path)
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read(path)?;

        let mut config: Self = toml::from_slice(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_owned(),
            source,
        })?;
        config.file_path = path.to_owned();

        log::trace!("Read config for atlas {} from {}", config.name, path.display());

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: PathBuf::from(CONFIG_FILENAME),
            source,
        })
    }

    /// Checks the `[packing]` table and turns it into options a packer
    /// accepts.
    pub fn packing_options(&self) -> Result<PackingOptions, ConfigError> {
        let packing = &self.packing;
        let options = PackingOptions {
            allow_rotation: packing.allow_rotation,
            padding_horizontal: packing.padding_horizontal,
            padding_vertical: packing.padding_vertical,
            edge_border: packing.edge_border,
            max_width: packing.max_size.0,
            max_height: packing.max_size.1,
            output_pages_as_power_of_two: packing.power_of_two,
        };

        check_options(&options).map_err(|reason| ConfigError::Invalid {
            name: self.name.clone(),
            reason,
        })?;

        Ok(options)
    }

    /// Creates an empty packer for this atlas.
    pub fn packer<T>(&self) -> Result<Packer<T>, ConfigError> {
        Ok(Packer::new(self.packing_options()?))
    }
}

/// Reports the first problem that would make a packer reject `options`.
pub(crate) fn check_options(options: &PackingOptions) -> Result<(), String> {
    if options.padding_horizontal < 0 || options.padding_vertical < 0 {
        return Err(format!(
            "padding must not be negative, got {}x{}",
            options.padding_horizontal, options.padding_vertical
        ));
    }

    if options.edge_border < 0 {
        return Err(format!(
            "edge-border must not be negative, got {}",
            options.edge_border
        ));
    }

    if options.max_width <= 0 || options.max_height <= 0 {
        return Err(format!(
            "max-size must be positive, got {}x{}",
            options.max_width, options.max_height
        ));
    }

    let inner_width = options.max_width - options.edge_border * 2;
    let inner_height = options.max_height - options.edge_border * 2;

    if inner_width <= 0 || inner_height <= 0 {
        return Err(format!(
            "an edge-border of {} leaves no room inside a {}x{} page",
            options.edge_border, options.max_width, options.max_height
        ));
    }

    Ok(())
}

fn default_allow_rotation() -> bool {
    PackingOptions::default().allow_rotation
}

fn default_padding_horizontal() -> i32 {
    PackingOptions::default().padding_horizontal
}

fn default_padding_vertical() -> i32 {
    PackingOptions::default().padding_vertical
}

fn default_edge_border() -> i32 {
    PackingOptions::default().edge_border
}

fn default_max_size() -> (i32, i32) {
    PackingOptions::default().max_size()
}

fn default_power_of_two() -> bool {
    PackingOptions::default().output_pages_as_power_of_two
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{source} in {}", .path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Invalid packing options for atlas {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl ConfigError {
    /// Tells whether this ConfigError originated because of a path not
    /// existing.
    pub fn is_not_found(&self) -> bool {
        match self {
            ConfigError::Io { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_packing_options() {
        let config = AtlasConfig::from_toml_str(r#"name = "ui""#).unwrap();

        assert_eq!(config.name, "ui");
        assert_eq!(config.packing_options().unwrap(), PackingOptions::default());
    }

    #[test]
    fn reads_packing_table() {
        let config = AtlasConfig::from_toml_str(
            r#"
            name = "icons"

            [packing]
            allow-rotation = true
            padding-horizontal = 1
            padding-vertical = 3
            edge-border = 0
            max-size = [2048, 1024]
            power-of-two = false
            "#,
        )
        .unwrap();

        let options = config.packing_options().unwrap();

        assert!(options.allow_rotation);
        assert_eq!((options.padding_horizontal, options.padding_vertical), (1, 3));
        assert_eq!(options.edge_border, 0);
        assert_eq!(options.max_size(), (2048, 1024));
        assert!(!options.output_pages_as_power_of_two);
    }

    #[test]
    fn partial_packing_table_keeps_other_defaults() {
        let config = AtlasConfig::from_toml_str(
            r#"
            name = "icons"

            [packing]
            max-size = [512, 512]
            "#,
        )
        .unwrap();

        let options = config.packing_options().unwrap();

        assert_eq!(options.max_size(), (512, 512));
        assert_eq!(options.padding_horizontal, 2);
        assert_eq!(options.edge_border, 2);
        assert!(options.output_pages_as_power_of_two);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = AtlasConfig::from_toml_str(
            r#"
            name = "icons"

            [packing]
            padding = 4
            "#,
        );

        match result {
            Err(ConfigError::Toml { path, .. }) => assert_eq!(path, Path::new(CONFIG_FILENAME)),
            other => panic!("expected a TOML error, got {:?}", other),
        }
    }

    #[test]
    fn negative_padding_is_invalid() {
        let mut config = AtlasConfig::from_toml_str(r#"name = "ui""#).unwrap();
        config.packing.padding_vertical = -1;

        let err = config.packing_options().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("atlas ui"), "{}", err);
    }

    #[test]
    fn border_must_leave_room() {
        let mut config = AtlasConfig::from_toml_str(r#"name = "ui""#).unwrap();
        config.packing.max_size = (64, 64);
        config.packing.edge_border = 32;

        assert!(config.packing_options().is_err());

        config.packing.edge_border = 31;
        assert!(config.packing_options().is_ok());
    }

    #[test]
    fn zero_max_size_is_invalid() {
        let mut config = AtlasConfig::from_toml_str(r#"name = "ui""#).unwrap();
        config.packing.max_size = (0, 1024);

        assert!(config.packer::<()>().is_err());
    }

    #[test]
    fn missing_folder_is_not_found() {
        let folder = std::env::temp_dir().join("texpack-config-test-does-not-exist");

        let err = AtlasConfig::read_from_folder(&folder).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn reads_from_folder() {
        let folder = std::env::temp_dir().join(format!("texpack-config-test-{}", std::process::id()));
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(CONFIG_FILENAME), "name = \"from-disk\"\n").unwrap();

        let config = AtlasConfig::read_from_folder_or_file(&folder).unwrap();
        assert_eq!(config.name, "from-disk");
        assert_eq!(config.file_path, folder.join(CONFIG_FILENAME));

        fs::remove_dir_all(&folder).unwrap();
    }
}
