use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "fops";
const ENV_PREFIX: &str = "FOPS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Docker {
    pub binary: String,
}

impl Default for Docker {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Repository prefix of every tag, e.g. `local` in `local/php-cli:8.3`.
    pub registry: String,
    pub dockerfile: String,
    /// Build argument that receives the tool version.
    pub build_arg: String,
    /// Tag scanned after a build. Deliberately independent of the tool version.
    pub scan_tag: String,
    /// Mount point of the working directory inside `run` containers.
    pub workdir: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            registry: "local".to_owned(),
            dockerfile: "Dockerfile".to_owned(),
            build_arg: "FOPS_IMAGE_VERSION".to_owned(),
            scan_tag: "dev".to_owned(),
            workdir: "/app".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Lint {
    pub image: String,
}

impl Default for Lint {
    fn default() -> Self {
        Self {
            image: "hadolint/hadolint".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Scan {
    pub image: String,
    pub severity: String,
    pub skip_dirs: String,
    pub cache_volume: String,
    pub cache_dir: String,
    pub docker_socket: String,
    pub exit_code: i32,
    pub ignore_unfixed: bool,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            image: "aquasec/trivy".to_owned(),
            severity: "HIGH,CRITICAL".to_owned(),
            skip_dirs: "/root/.composer".to_owned(),
            cache_volume: "/tmp/trivy-cache".to_owned(),
            cache_dir: "/tmp/trivy/".to_owned(),
            docker_socket: "/var/run/docker.sock".to_owned(),
            exit_code: 1,
            ignore_unfixed: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub docker: Docker,
    pub image: ImageSettings,
    pub lint: Lint,
    pub scan: Scan,
}

impl Settings {
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Merge in the configuration file. An explicitly requested file must exist,
        // the default one is optional.
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        // Add in settings from the environment (with a prefix of FOPS).
        // Eg.. `FOPS_SCAN__SEVERITY=CRITICAL fops build ...` sets `scan.severity`.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        // Deserialize (and thus freeze) the entire configuration.
        builder.build()?.try_deserialize()
    }
}
