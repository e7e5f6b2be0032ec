//! Top-level stitching configuration.

use building_registration::{EstimationMethod, IcpParams};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::extract::{DEFAULT_SAMPLING_SPACING, MIN_SAMPLING_SPACING};
use crate::{AssemblyParams, FrameParams, FramePolicy, ModelError, ModelResult, QualityParams};

/// Every setting used by [`BuildingRegistration`](crate::BuildingRegistration).
///
/// # Example
///
/// ```
/// use building_model::{FramePolicy, StitchConfig};
///
/// let config = StitchConfig::default()
///     .with_sampling_spacing(0.05)
///     .with_frame_policy(FramePolicy::PoseGraph);
///
/// assert!(config.validate().is_ok());
/// assert!(StitchConfig::default().with_sampling_spacing(0.0).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StitchConfig {
    /// Distance between surface samples.
    pub sampling_spacing: f64,
    /// Pairwise registration settings.
    ///
    /// Every preset steps point-to-plane: extracted clouds are regular grids
    /// with exact normals, and point-to-point steps stall on them once
    /// in-plane neighbors pair up.
    pub icp: IcpParams,
    /// Global frame settings.
    pub frame: FrameParams,
    /// Quality assessment settings.
    pub quality: QualityParams,
    /// Metric settings.
    pub assembly: AssemblyParams,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            sampling_spacing: DEFAULT_SAMPLING_SPACING,
            icp: IcpParams::default().with_method(EstimationMethod::PointToPlane),
            frame: FrameParams::default(),
            quality: QualityParams::default(),
            assembly: AssemblyParams::default(),
        }
    }
}

impl StitchConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Coarser sampling and fewer ICP iterations.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            sampling_spacing: 0.2,
            icp: IcpParams::fast().with_method(EstimationMethod::PointToPlane),
            ..Self::default()
        }
    }

    /// Denser sampling, point-to-plane ICP and pose-graph refinement.
    #[must_use]
    pub fn high_quality() -> Self {
        Self {
            sampling_spacing: 0.05,
            icp: IcpParams::high_quality(),
            frame: FrameParams::pose_graph(),
            ..Self::default()
        }
    }

    /// Sets the sampling spacing.
    #[must_use]
    pub const fn with_sampling_spacing(mut self, spacing: f64) -> Self {
        self.sampling_spacing = spacing;
        self
    }

    /// Sets the ICP parameters.
    #[must_use]
    pub fn with_icp(mut self, icp: IcpParams) -> Self {
        self.icp = icp;
        self
    }

    /// Sets the frame parameters.
    #[must_use]
    pub fn with_frame(mut self, frame: FrameParams) -> Self {
        self.frame = frame;
        self
    }

    /// Sets only the frame policy.
    #[must_use]
    pub const fn with_frame_policy(mut self, policy: FramePolicy) -> Self {
        self.frame.policy = policy;
        self
    }

    /// Sets the quality parameters.
    #[must_use]
    pub const fn with_quality(mut self, quality: QualityParams) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the assembly parameters.
    #[must_use]
    pub const fn with_assembly(mut self, assembly: AssemblyParams) -> Self {
        self.assembly = assembly;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] for an out-of-range value,
    /// including a sampling spacing below [`MIN_SAMPLING_SPACING`], or
    /// [`ModelError::Registration`] for invalid ICP parameters.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.sampling_spacing.is_finite() || self.sampling_spacing < MIN_SAMPLING_SPACING {
            return Err(ModelError::InvalidConfig(format!(
                "sampling_spacing must be at least {MIN_SAMPLING_SPACING}, got {}",
                self.sampling_spacing
            )));
        }
        self.icp.validate()?;
        self.frame.validate()?;
        self.quality.validate()?;
        self.assembly.validate()
    }
}
