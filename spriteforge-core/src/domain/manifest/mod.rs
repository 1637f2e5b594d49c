// spriteforge-core/src/domain/manifest/mod.rs

pub mod hash;
pub mod lock;
pub mod validate;

pub use hash::manifest_hash;
pub use lock::LockFile;
pub use validate::validate_manifest;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The Manifest represents the complete declared intent of one production
/// run: who the character is, which move to animate, and how strictly the
/// auditor judges each candidate. Immutable once a run has started.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Manifest {
    pub identity: MoveIdentity,
    pub inputs: ManifestInputs,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub auditor: AuditorConfig,
    #[serde(default)]
    pub retry: RetryOverrides,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MoveIdentity {
    pub character: String,
    /// Lowercase move id ("idle", "walk_cycle"). Becomes the atlas folder
    /// prefix, so it is restricted to `[a-z_]+`.
    #[serde(rename = "move")]
    pub move_id: String,
    pub version: String,
    pub frame_count: u32,
    #[serde(default)]
    pub is_loop: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ManifestInputs {
    /// The master anchor image. Identity truth for every frame.
    pub anchor: PathBuf,
    #[serde(default)]
    pub style_refs: Vec<PathBuf>,
    #[serde(default)]
    pub pose_refs: Vec<PathBuf>,
    #[serde(default)]
    pub guides: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeneratorConfig {
    pub backend: String,
    pub model: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_frame: u32,
    pub prompts: PromptTemplates,
    /// Accepted structurally but always overridden to 1.0 by the adapter.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// API key may be inlined for air-gapped setups; redacted in every
    /// persisted artifact. Prefer the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Attempt 1 uses the deterministic CRC32 seed; later attempts randomize.
    #[default]
    FixedThenRandom,
    AlwaysRandom,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromptTemplates {
    pub master: String,
    #[serde(default)]
    pub variation: String,
    #[serde(default)]
    pub lock: String,
    #[serde(default)]
    pub negative: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CanvasConfig {
    #[serde(default = "default_generation_size")]
    pub generation_size: u32,
    #[serde(default = "default_target_size")]
    pub target_size: u32,
    #[serde(default)]
    pub downsample_method: DownsampleMethod,
    #[serde(default)]
    pub alignment: AlignmentConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            generation_size: default_generation_size(),
            target_size: default_target_size(),
            downsample_method: DownsampleMethod::default(),
            alignment: AlignmentConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownsampleMethod {
    /// The only method that introduces no new colors.
    #[default]
    Nearest,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlignmentConfig {
    #[serde(default = "default_true")]
    pub vertical_lock: bool,
    #[serde(default = "default_root_zone_ratio")]
    pub root_zone_ratio: f64,
    #[serde(default = "default_max_shift_x")]
    pub max_shift_x: u32,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            vertical_lock: true,
            root_zone_ratio: default_root_zone_ratio(),
            max_shift_x: default_max_shift_x(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditorConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub weights: MetricWeights,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            weights: MetricWeights::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Thresholds {
    #[serde(default = "default_identity_min")]
    pub identity_min: f64,
    #[serde(default = "default_palette_min")]
    pub palette_min: f64,
    #[serde(default = "default_alpha_artifact_max")]
    pub alpha_artifact_max: f64,
    #[serde(default = "default_baseline_drift_max")]
    pub baseline_drift_max: u32,
    #[serde(default = "default_composite_min")]
    pub composite_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            identity_min: default_identity_min(),
            palette_min: default_palette_min(),
            alpha_artifact_max: default_alpha_artifact_max(),
            baseline_drift_max: default_baseline_drift_max(),
            composite_min: default_composite_min(),
        }
    }
}

/// Relative weights of the soft metrics inside the composite score.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MetricWeights {
    #[serde(default = "default_w_identity")]
    pub identity: f64,
    #[serde(default = "default_w_palette")]
    pub palette: f64,
    #[serde(default = "default_w_baseline")]
    pub baseline: f64,
    #[serde(default = "default_w_alpha")]
    pub alpha: f64,
    #[serde(default = "default_w_noise")]
    pub noise: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            identity: default_w_identity(),
            palette: default_w_palette(),
            baseline: default_w_baseline(),
            alpha: default_w_alpha(),
            noise: default_w_noise(),
        }
    }
}

/// Optional per-reason ladder overrides. Keys are reason codes, values are
/// ordered action names replacing the built-in ladder for that reason.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RetryOverrides {
    #[serde(default)]
    pub ladder: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExportConfig {
    /// Operator additions to the packer command line. Flags colliding with
    /// the locked set are dropped at invocation time.
    #[serde(default)]
    pub packer_flags: Vec<String>,
}

// --- DEFAULTS ---

fn default_mode() -> String {
    "edit".to_string()
}
fn default_max_attempts() -> u32 {
    6
}
fn default_generation_size() -> u32 {
    512
}
fn default_target_size() -> u32 {
    128
}
fn default_true() -> bool {
    true
}
fn default_root_zone_ratio() -> f64 {
    0.25
}
fn default_max_shift_x() -> u32 {
    8
}
fn default_identity_min() -> f64 {
    0.85
}
fn default_palette_min() -> f64 {
    0.90
}
fn default_alpha_artifact_max() -> f64 {
    0.20
}
fn default_baseline_drift_max() -> u32 {
    4
}
fn default_composite_min() -> f64 {
    0.70
}
fn default_w_identity() -> f64 {
    0.40
}
fn default_w_palette() -> f64 {
    0.25
}
fn default_w_baseline() -> f64 {
    0.15
}
fn default_w_alpha() -> f64 {
    0.10
}
fn default_w_noise() -> f64 {
    0.10
}
