//! Iterative Closest Point (ICP) registration of two room point clouds.
//!
//! ICP iteratively refines the alignment between two point sets by:
//! 1. Finding closest point correspondences
//! 2. Measuring the RMS error over those correspondences
//! 3. Stopping when the error no longer changes, otherwise estimating an
//!    incremental rigid transform and folding it into the accumulated one
//!
//! Degenerate input never fails: without correspondences the error is
//! `+inf`, the step is the identity and the loop converges on the spot.

use std::fmt;
use std::time::{Duration, Instant};

use building_types::PointCloud;
use nalgebra::Point3;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    estimate_transform, CancellationToken, Correspondence, EstimationMethod, NeighborSearch,
    RegistrationError, RegistrationResult, RigidTransform, TargetIndex,
};

/// Parameters for ICP registration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct IcpParams {
    /// Maximum number of iterations (default: 50).
    pub max_iterations: u32,
    /// Convergence threshold on the change of RMS error between two
    /// iterations (default: 0.001).
    pub convergence_threshold: f64,
    /// Points farther than this from every target point get no
    /// correspondence (default: 1.0).
    pub max_correspondence_distance: f64,
    /// Error at which confidence reaches zero (default: 1.0).
    pub max_error: f64,
    /// Fraction of source points used, taken at a regular stride
    /// (0.0-1.0, default: 1.0 = no subsampling).
    pub subsample_ratio: f64,
    /// Initial transform guess (default: identity).
    pub initial_transform: RigidTransform,
    /// Error metric minimized per step (default: point-to-point).
    pub method: EstimationMethod,
    /// Nearest-neighbor strategy (default: automatic).
    pub search: NeighborSearch,
    /// Wall-clock budget for one registration (default: unlimited).
    pub time_budget: Option<Duration>,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            convergence_threshold: 0.001,
            max_correspondence_distance: 1.0,
            max_error: 1.0,
            subsample_ratio: 1.0,
            initial_transform: RigidTransform::identity(),
            method: EstimationMethod::PointToPoint,
            search: NeighborSearch::Auto,
            time_budget: None,
        }
    }
}

impl IcpParams {
    /// Creates new ICP parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters for quick previews: fewer iterations, half the points.
    #[must_use]
    pub fn fast() -> Self {
        Self::new()
            .with_max_iterations(20)
            .with_convergence_threshold(0.005)
            .with_subsample_ratio(0.5)
    }

    /// Parameters for final models: more iterations, tighter convergence,
    /// point-to-plane steps.
    #[must_use]
    pub fn high_quality() -> Self {
        Self::new()
            .with_max_iterations(100)
            .with_convergence_threshold(1e-5)
            .with_method(EstimationMethod::PointToPlane)
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the convergence threshold.
    #[must_use]
    pub const fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Sets the maximum correspondence distance.
    #[must_use]
    pub const fn with_max_correspondence_distance(mut self, distance: f64) -> Self {
        self.max_correspondence_distance = distance;
        self
    }

    /// Sets the error at which confidence reaches zero.
    #[must_use]
    pub const fn with_max_error(mut self, max_error: f64) -> Self {
        self.max_error = max_error;
        self
    }

    /// Sets the subsample ratio (0.0-1.0).
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // clamp is not const fn
    pub fn with_subsample_ratio(mut self, ratio: f64) -> Self {
        self.subsample_ratio = ratio.clamp(0.01, 1.0);
        self
    }

    /// Sets the initial transform guess.
    #[must_use]
    pub const fn with_initial_transform(mut self, transform: RigidTransform) -> Self {
        self.initial_transform = transform;
        self
    }

    /// Sets the estimation method.
    #[must_use]
    pub const fn with_method(mut self, method: EstimationMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the nearest-neighbor strategy.
    #[must_use]
    pub const fn with_search(mut self, search: NeighborSearch) -> Self {
        self.search = search;
        self
    }

    /// Sets the wall-clock budget.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidParameter`] naming the first
    /// out-of-range field.
    pub fn validate(&self) -> RegistrationResult<()> {
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be positive"));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(invalid("convergence_threshold must be finite and non-negative"));
        }
        if self.max_correspondence_distance.is_nan() || self.max_correspondence_distance <= 0.0 {
            return Err(invalid("max_correspondence_distance must be positive"));
        }
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(invalid("max_error must be finite and positive"));
        }
        if !(self.subsample_ratio > 0.0 && self.subsample_ratio <= 1.0) {
            return Err(invalid("subsample_ratio must be in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> RegistrationError {
    RegistrationError::InvalidParameter(message.to_string())
}

/// Why a registration stopped without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopReason {
    /// `max_iterations` iterations ran.
    IterationLimit,
    /// The cancellation token was triggered.
    Cancelled,
    /// The wall-clock budget ran out.
    TimeBudgetExhausted,
}

/// State of the ICP loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IcpState {
    /// Still refining.
    Iterating,
    /// The error change dropped below the convergence threshold.
    Converged,
    /// Stopped early; the accumulated transform is still reported.
    MaxIterationsReached(StopReason),
}

impl IcpState {
    /// Whether the loop reached convergence.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Result of ICP registration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IcpResult {
    /// Transform mapping source points into the target frame.
    pub transform: RigidTransform,
    /// RMS distance over the final correspondences (`+inf` when none).
    pub rms_error: f64,
    /// Confidence in [0, 1] derived from `rms_error`.
    pub confidence: f64,
    /// Number of iterations performed.
    pub iterations: u32,
    /// Terminal state, never [`IcpState::Iterating`].
    pub state: IcpState,
    /// Number of correspondences behind `rms_error`.
    pub correspondence_count: usize,
    /// Number of source points used after subsampling.
    pub source_count: usize,
}

impl IcpResult {
    /// Whether the loop converged.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.state.is_converged()
    }

    /// Share of used source points that found a correspondence.
    #[must_use]
    pub fn overlap_ratio(&self) -> f64 {
        if self.source_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.correspondence_count as f64 / self.source_count as f64;
        ratio
    }
}

impl fmt::Display for IcpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ICP: {:?} after {} iterations, RMS {:.6}, confidence {:.3}, {}/{} matched",
            self.state,
            self.iterations,
            self.rms_error,
            self.confidence,
            self.correspondence_count,
            self.source_count
        )
    }
}

/// Maps a residual error to a confidence in [0, 1].
///
/// `confidence = max(0, 1 - min(error, max_error) / max_error)`. A
/// non-finite error or a non-positive `max_error` gives 0.
///
/// # Example
///
/// ```
/// use building_registration::confidence_from_error;
///
/// assert!((confidence_from_error(0.25, 1.0) - 0.75).abs() < 1e-12);
/// assert_eq!(confidence_from_error(3.0, 1.0), 0.0);
/// assert_eq!(confidence_from_error(f64::INFINITY, 1.0), 0.0);
/// ```
#[must_use]
pub fn confidence_from_error(error: f64, max_error: f64) -> f64 {
    if !error.is_finite() || !max_error.is_finite() || max_error <= 0.0 {
        return 0.0;
    }
    (1.0 - error.min(max_error) / max_error).max(0.0)
}

/// Registers `source` onto `target` with ICP.
///
/// Never fails: empty clouds or missing overlap yield the identity transform
/// with infinite error and zero confidence.
///
/// # Example
///
/// ```
/// use building_registration::{register, IcpParams};
/// use building_types::PointCloud;
/// use nalgebra::{Point3, Vector3};
///
/// let points = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
///     Point3::new(1.0, 1.0, 1.0),
/// ];
/// let normals = vec![Vector3::z(); points.len()];
/// let target = PointCloud::new(0, points.clone(), normals.clone()).unwrap();
/// let shifted = points.iter().map(|p| p + Vector3::new(0.1, 0.0, 0.0)).collect();
/// let source = PointCloud::new(1, shifted, normals).unwrap();
///
/// let result = register(&source, &target, &IcpParams::default());
/// assert!(result.converged());
/// assert!((result.transform.translation.x + 0.1).abs() < 1e-6);
/// ```
#[must_use]
pub fn register(source: &PointCloud, target: &PointCloud, params: &IcpParams) -> IcpResult {
    register_with_cancellation(source, target, params, None)
}

/// Registers `source` onto `target`, checking `cancel` once per iteration.
///
/// A cancelled or over-budget run stops as
/// [`IcpState::MaxIterationsReached`] with the matching [`StopReason`] and
/// reports the transform accumulated so far.
#[must_use]
pub fn register_with_cancellation(
    source: &PointCloud,
    target: &PointCloud,
    params: &IcpParams,
    cancel: Option<&CancellationToken>,
) -> IcpResult {
    let start = Instant::now();
    let source_points = subsample(source.points(), params.subsample_ratio);
    let index = TargetIndex::build(
        target.points(),
        params.max_correspondence_distance,
        params.search,
    );

    let mut transform = params.initial_transform;
    let mut previous_error = f64::INFINITY;
    let mut current_error = f64::INFINITY;
    let mut correspondence_count = 0;
    let mut iterations = 0;
    let mut state = IcpState::Iterating;

    while state == IcpState::Iterating {
        if let Some(reason) = stop_reason(iterations, params, cancel, start) {
            state = IcpState::MaxIterationsReached(reason);
            break;
        }
        iterations += 1;

        let correspondences = match_points(&index, &source_points, &transform);
        current_error = rms_error(&correspondences);
        correspondence_count = correspondences.len();

        debug!(
            iteration = iterations,
            rms_error = current_error,
            correspondences = correspondence_count,
            "ICP iteration"
        );

        if has_converged(previous_error, current_error, params.convergence_threshold) {
            state = IcpState::Converged;
            break;
        }

        let step = estimate_transform(&correspondences, target.normals(), params.method);
        transform = step.compose(&transform);
        previous_error = current_error;
    }

    if let IcpState::MaxIterationsReached(reason) = state {
        // The last step moved the transform after its error was measured
        let correspondences = match_points(&index, &source_points, &transform);
        current_error = rms_error(&correspondences);
        correspondence_count = correspondences.len();

        match reason {
            StopReason::Cancelled => info!(
                source_room = source.room_index(),
                target_room = target.room_index(),
                iterations,
                "ICP cancelled"
            ),
            StopReason::IterationLimit | StopReason::TimeBudgetExhausted => warn!(
                source_room = source.room_index(),
                target_room = target.room_index(),
                iterations,
                rms_error = current_error,
                ?reason,
                "ICP stopped before converging"
            ),
        }
    }

    let result = IcpResult {
        transform,
        rms_error: current_error,
        confidence: confidence_from_error(current_error, params.max_error),
        iterations,
        state,
        correspondence_count,
        source_count: source_points.len(),
    };

    debug!(
        source_room = source.room_index(),
        target_room = target.room_index(),
        elapsed_ms = start.elapsed().as_millis(),
        "{result}"
    );

    result
}

fn stop_reason(
    iterations: u32,
    params: &IcpParams,
    cancel: Option<&CancellationToken>,
    start: Instant,
) -> Option<StopReason> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Some(StopReason::Cancelled);
    }
    if params
        .time_budget
        .is_some_and(|budget| start.elapsed() >= budget)
    {
        return Some(StopReason::TimeBudgetExhausted);
    }
    if iterations >= params.max_iterations {
        return Some(StopReason::IterationLimit);
    }
    None
}

fn match_points(
    index: &TargetIndex<'_>,
    source_points: &[Point3<f64>],
    transform: &RigidTransform,
) -> Vec<Correspondence> {
    index.correspondences(&transform.transform_points(source_points))
}

/// Two equal errors (including two infinities) count as no change.
#[allow(clippy::float_cmp)]
fn has_converged(previous: f64, current: f64, threshold: f64) -> bool {
    previous == current || (previous - current).abs() < threshold
}

fn rms_error(correspondences: &[Correspondence]) -> f64 {
    if correspondences.is_empty() {
        return f64::INFINITY;
    }
    let sum_sq: f64 = correspondences.iter().map(|c| c.distance * c.distance).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = correspondences.len() as f64;
    (sum_sq / n).sqrt()
}

/// Gets source points, optionally subsampled.
fn subsample(points: &[Point3<f64>], ratio: f64) -> Vec<Point3<f64>> {
    if ratio >= 1.0 || ratio.is_nan() || ratio <= 0.0 {
        points.to_vec()
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let step = (1.0 / ratio).ceil() as usize;
        points.iter().step_by(step.max(1)).copied().collect()
    }
}
