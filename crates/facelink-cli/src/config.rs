use anyhow::{bail, Context, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use facelink_core::{IdentityRegistry, RecognitionSettings, RegistryEntry};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DEFAULT_WARMUP_FRAMES: usize = 4;

/// Client configuration, loaded once at startup from a TOML file with
/// `FACELINK_*` environment overrides.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the recognition service, without trailing slash.
    pub service_endpoint: String,
    pub settings: RecognitionSettings,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Frames discarded after the stream starts, while exposure settles.
    pub warmup_frames: usize,
    pub registry: IdentityRegistry,
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    service_endpoint: Option<String>,
    model_name: Option<String>,
    detector_backend: Option<String>,
    distance_metric: Option<String>,
    anti_spoofing: Option<bool>,
    camera_device: Option<String>,
    warmup_frames: Option<usize>,
    #[serde(default, rename = "identity")]
    identities: Vec<IdentityEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentityEntry {
    label: String,
    reference: Option<String>,
    /// Image file, relative to the config file's directory.
    reference_file: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, else `$FACELINK_CONFIG`, else the XDG default.
    ///
    /// An explicitly named file must exist; a missing default file just
    /// means defaults plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    fn load_with_env<E>(path: Option<&Path>, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env("FACELINK_CONFIG").map(PathBuf::from));

        let (file, path) = match explicit {
            Some(path) => (read_config_file(&path)?, path),
            None => {
                let path = default_config_path(&env);
                if path.exists() {
                    (read_config_file(&path)?, path)
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    (ConfigFile::default(), path)
                }
            }
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::resolve(file, base_dir, &env)
    }

    fn resolve(
        file: ConfigFile,
        base_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let service_endpoint = env("FACELINK_SERVICE_ENDPOINT")
            .or(file.service_endpoint)
            .map(|e| e.trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .context(
                "no recognition service endpoint configured \
                 (set service_endpoint or FACELINK_SERVICE_ENDPOINT)",
            )?;

        let defaults = RecognitionSettings::default();
        let settings = RecognitionSettings {
            model_name: env("FACELINK_MODEL_NAME")
                .or(file.model_name)
                .unwrap_or(defaults.model_name),
            detector_backend: env("FACELINK_DETECTOR_BACKEND")
                .or(file.detector_backend)
                .unwrap_or(defaults.detector_backend),
            distance_metric: env("FACELINK_DISTANCE_METRIC")
                .or(file.distance_metric)
                .unwrap_or(defaults.distance_metric),
            anti_spoofing: env("FACELINK_ANTI_SPOOFING")
                .map(|v| v == "1")
                .or(file.anti_spoofing)
                .unwrap_or(defaults.anti_spoofing),
        };

        let camera_device = env("FACELINK_CAMERA_DEVICE")
            .or(file.camera_device)
            .unwrap_or_else(|| "/dev/video0".to_string());

        let warmup_frames = env("FACELINK_WARMUP_FRAMES")
            .and_then(|v| v.parse().ok())
            .or(file.warmup_frames)
            .unwrap_or(DEFAULT_WARMUP_FRAMES);

        let registry = build_registry(file.identities, base_dir)?;

        Ok(Self {
            service_endpoint,
            settings,
            camera_device,
            warmup_frames,
            registry,
        })
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
}

fn default_config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("facelink")
        .join("config.toml")
}

fn build_registry(identities: Vec<IdentityEntry>, base_dir: &Path) -> Result<IdentityRegistry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(identities.len());

    for identity in identities {
        if !seen.insert(identity.label.clone()) {
            bail!("duplicate identity label {:?}", identity.label);
        }

        let reference = match (identity.reference, identity.reference_file) {
            (Some(_), Some(_)) => bail!(
                "identity {:?} sets both reference and reference_file",
                identity.label
            ),
            (Some(reference), None) => reference,
            (None, Some(file)) => read_reference_file(&base_dir.join(file))?,
            (None, None) => String::new(),
        };

        entries.push(RegistryEntry::new(identity.label, reference));
    }

    Ok(IdentityRegistry::new(entries))
}

/// Read an image file and wrap it as a base64 data URL.
fn read_reference_file(path: &Path) -> Result<String> {
    let format = image::ImageFormat::from_path(path)
        .with_context(|| format!("unrecognized reference image format {}", path.display()))?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read reference image {}", path.display()))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        BASE64_STANDARD.encode(bytes)
    ))
}
