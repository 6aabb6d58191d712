use anyhow::Context;
use seiscore::prelude::{
    BeamConfig, BeamMethod, CoordinateSystem, CorrectionVelocity, FkConfig, FkMethod,
    SlownessGrid, TimestampConvention,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Workflow parameters as stored in the YAML config files.
///
/// Method, timestamp, and coordinate tags stay strings here and are parsed
/// into the closed enums once, when the plan is resolved.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub method: String,
    pub win_len: f64,
    pub win_frac: f64,
    pub frqlow: f64,
    pub frqhigh: f64,
    pub slowness_max: f64,
    pub slowness_step: f64,
    pub semb_thres: f64,
    pub vel_thres: f64,
    pub nthroot: u32,
    pub timestamp: String,
    pub coordinate_system: String,
    pub correct_3dplane: bool,
    pub static_3d: bool,
    pub correction_velocity: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            method: "FK".into(),
            win_len: 4.0,
            win_frac: 0.5,
            frqlow: 2.0,
            frqhigh: 8.0,
            slowness_max: 0.2,
            slowness_step: 0.02,
            semb_thres: -1e9,
            vel_thres: -1e9,
            nthroot: 4,
            timestamp: "julsec".into(),
            coordinate_system: "xy".into(),
            correct_3dplane: false,
            static_3d: false,
            correction_velocity: 4.0,
        }
    }
}

/// Fully parsed analysis plan, ready for the core entry points.
#[derive(Clone, Debug)]
pub enum AnalysisPlan {
    FrequencyDomain(FkConfig),
    TimeDomain(BeamConfig),
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(method: &str, win_len: f64, slowness_max: f64, slowness_step: f64) -> Self {
        Self {
            method: method.to_string(),
            win_len,
            slowness_max,
            slowness_step,
            ..Self::default()
        }
    }

    /// Parses the string tags and binds the analysis window, rejecting
    /// unknown tags before any data work.
    pub fn resolve(&self, stime: f64, etime: f64) -> anyhow::Result<AnalysisPlan> {
        let grid = SlownessGrid::symmetric(self.slowness_max, self.slowness_step);
        let timestamp: TimestampConvention = self
            .timestamp
            .parse()
            .with_context(|| format!("timestamp convention '{}'", self.timestamp))?;
        let coordinate_system: CoordinateSystem = self
            .coordinate_system
            .parse()
            .with_context(|| format!("coordinate system '{}'", self.coordinate_system))?;
        let vel_cor = CorrectionVelocity::Uniform(self.correction_velocity);

        if let Ok(method) = self.method.parse::<FkMethod>() {
            return Ok(AnalysisPlan::FrequencyDomain(FkConfig {
                grid,
                win_len: self.win_len,
                win_frac: self.win_frac,
                frqlow: self.frqlow,
                frqhigh: self.frqhigh,
                semb_thres: self.semb_thres,
                vel_thres: self.vel_thres,
                stime,
                etime,
                method,
                coordinate_system,
                timestamp,
                correct_3dplane: self.correct_3dplane,
                static_3d: self.static_3d,
                vel_cor,
            }));
        }

        let method = self
            .method
            .parse::<BeamMethod>()
            .with_context(|| format!("analysis method '{}'", self.method))?;
        Ok(AnalysisPlan::TimeDomain(BeamConfig {
            grid,
            win_len: self.win_len,
            win_frac: self.win_frac,
            frqlow: self.frqlow,
            frqhigh: self.frqhigh,
            stime,
            etime,
            method,
            nthroot: self.nthroot,
            coordinate_system,
            timestamp,
            correct_3dplane: self.correct_3dplane,
            static_3d: self.static_3d,
            vel_cor,
        }))
    }
}
