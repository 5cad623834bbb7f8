use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::kubernetes::model::LabelKeys;
use crate::midi::model::{Channel, DataByte};

// Command line

#[derive(Debug, clap::Parser)]
#[command(about = "Scale cluster workloads with a MIDI control surface.")]
pub struct Args {
    /// YAML configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "cloud-control.yaml")]
    pub config: PathBuf,
    #[arg(long, value_enum)]
    pub orchestrator: Option<OrchestratorKind>,
    #[arg(long)]
    pub namespace: Option<String>,
    /// Substring of the MIDI port name.
    #[arg(long)]
    pub controller: Option<String>,
    /// Log MIDI output instead of talking to the device.
    #[arg(long)]
    pub dry_run: bool,
}

// YAML specific configuration

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorKind {
    #[default]
    Kubernetes,
    Openshift,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub orchestrator: OrchestratorKind,
    /// Namespace for Kubernetes, project for OpenShift.
    pub namespace: String,
    pub context: Option<String>,
    pub master: Option<String>,
    pub accept_invalid_certs: bool,
    pub labels: LabelKeys,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        ClusterSettings {
            orchestrator: OrchestratorKind::default(),
            namespace: "default".into(),
            context: None,
            master: None,
            accept_invalid_certs: true,
            labels: LabelKeys::default(),
        }
    }
}

/// Knob value to replica count.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(try_from = "ScaleKeys")]
pub enum ScaleTransform {
    /// `value / divisor + offset`
    Divisor { divisor: NonZeroU32, offset: u32 },
    /// `floor(value * factor) + offset`
    Factor { factor: f64, offset: u32 },
}

/// `scale` section as written. A `divisor` selects integer division.
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScaleKeys {
    factor: Option<f64>,
    divisor: Option<u32>,
    offset: u32,
}

impl TryFrom<ScaleKeys> for ScaleTransform {
    type Error = ConfigError;

    fn try_from(keys: ScaleKeys) -> Result<Self, Self::Error> {
        match (keys.factor, keys.divisor) {
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousScale),
            (None, Some(divisor)) => NonZeroU32::new(divisor)
                .map(|divisor| ScaleTransform::Divisor {
                    divisor,
                    offset: keys.offset,
                })
                .ok_or(ConfigError::ZeroScaleDivisor),
            (factor, None) => Ok(ScaleTransform::Factor {
                factor: factor.unwrap_or(DEFAULT_SCALE_FACTOR),
                offset: keys.offset,
            }),
        }
    }
}

const DEFAULT_SCALE_FACTOR: f64 = 0.1;

impl Default for ScaleTransform {
    fn default() -> Self {
        ScaleTransform::Factor {
            factor: DEFAULT_SCALE_FACTOR,
            offset: 0,
        }
    }
}

impl ScaleTransform {
    pub fn replicas(&self, value: DataByte) -> u32 {
        let value = u32::from(value.as_u8());
        match *self {
            ScaleTransform::Divisor { divisor, offset } => {
                (value / divisor.get()).saturating_add(offset)
            }
            ScaleTransform::Factor { factor, offset } => {
                let scaled = (f64::from(value) * factor).floor();
                // `as` saturates, factor is validated to be non-negative.
                (scaled as u32).saturating_add(offset)
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColorPalette {
    pub off: DataByte,
    pub enabled: DataByte,
    pub disabled: DataByte,
    pub failure: DataByte,
    pub cursor_active: DataByte,
    pub cursor_idle: DataByte,
}

impl Default for ColorPalette {
    // Launch Control LED velocities.
    fn default() -> Self {
        ColorPalette {
            off: DataByte::lit(12),
            enabled: DataByte::lit(60),
            disabled: DataByte::lit(63),
            failure: DataByte::lit(15),
            cursor_active: DataByte::lit(15),
            cursor_idle: DataByte::lit(13),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub controller_name: String,
    #[serde(flatten)]
    pub cluster: ClusterSettings,
    /// Channel carrying slots 0-7, the other one carries 8-15.
    pub primary_channel: Channel,
    pub scale: ScaleTransform,
    pub reconnect_delay_ms: u64,
    pub color_palette: Arc<ColorPalette>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            controller_name: "Launch Control".into(),
            cluster: ClusterSettings::default(),
            primary_channel: Channel::Factory,
            scale: ScaleTransform::default(),
            reconnect_delay_ms: 1000,
            color_palette: Arc::new(ColorPalette::default()),
        }
    }
}

impl Settings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    fn override_with(mut self, args: &Args) -> Settings {
        if let Some(orchestrator) = args.orchestrator {
            self.cluster.orchestrator = orchestrator;
        }
        if let Some(namespace) = &args.namespace {
            self.cluster.namespace = namespace.clone();
        }
        if let Some(controller) = &args.controller {
            self.controller_name = controller.clone();
        }
        self
    }

    fn validate(self) -> Result<Settings, ConfigError> {
        if let ScaleTransform::Factor { factor, .. } = self.scale {
            if !factor.is_finite() || factor < 0.0 {
                return Err(ConfigError::InvalidScaleFactor(factor));
            }
        }
        if self.cluster.labels.enabled.is_empty() || self.cluster.labels.index.is_empty() {
            return Err(ConfigError::EmptyLabelKey);
        }
        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("scale factor must be a finite, non-negative number. Got: {0}.")]
    InvalidScaleFactor(f64),
    #[error("label keys must not be empty")]
    EmptyLabelKey,
    #[error("scale takes either a factor or a divisor, not both")]
    AmbiguousScale,
    #[error("scale divisor must not be zero")]
    ZeroScaleDivisor,
}

pub fn load(args: &Args) -> anyhow::Result<Settings> {
    let settings = if args.config.exists() {
        load_from_yaml(&args.config)?
    } else {
        tracing::info!(path = %args.config.display(), "no configuration file, using defaults");
        Settings::default()
    };
    Ok(settings.override_with(args).validate()?)
}

pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> anyhow::Result<Settings> {
    let conf_file = std::fs::File::open(path)?;
    let yaml_value: serde_yaml::Value = serde_yaml::from_reader(conf_file)?;
    from_yaml_value(yaml_value)
}

fn from_yaml_value(mut yaml_value: serde_yaml::Value) -> anyhow::Result<Settings> {
    // Workaround for merge anchors.
    // https://github.com/dtolnay/serde-yaml/issues/317
    yaml_value.apply_merge()?;
    Ok(serde_yaml::from_value(yaml_value)?)
}
