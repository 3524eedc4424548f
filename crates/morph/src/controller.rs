use crate::reconcile::{AttributeBuffer, MorphError, Reconciled};
use serde::{Deserialize, Serialize};

/// Curve applied to the time progress before it reaches the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// `1 - (1 - t)^2`: fast start, gentle landing.
    Power1Out,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    /// Seconds for one transition.
    pub duration: f32,
    pub easing: Easing,
}

impl MorphConfig {
    /// Reject durations the ramp cannot finish on.
    pub fn validate(&self) -> Result<(), MorphError> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(MorphError::InvalidConfig(format!(
                "duration must be finite and non-negative, got {}",
                self.duration
            )));
        }
        Ok(())
    }
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            duration: 3.0,
            easing: Easing::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphState {
    Idle,
    Transitioning,
}

/// Where the "current" positions come from.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Shape(String),
    /// Shape captured mid-transition when a new target interrupted it.
    Snapshot(AttributeBuffer),
}

/// Drives interpolation between reconciled morph targets.
///
/// Exposes two equal-length position buffers and a progress scalar; the
/// renderer blends them. An interrupting [`MorphController::go_to`] freezes
/// the interpolated shape into a controller-owned buffer and restarts from
/// there, so neither handed-out buffer changes under an in-flight blend.
#[derive(Debug, Clone)]
pub struct MorphController {
    targets: Reconciled,
    config: MorphConfig,
    state: MorphState,
    current: Source,
    target: String,
    elapsed: f64,
    progress: f32,
}

impl MorphController {
    /// Start idle on `initial`, with progress 0 and current == target.
    pub fn new(
        targets: Reconciled,
        initial: &str,
        config: MorphConfig,
    ) -> Result<Self, MorphError> {
        config.validate()?;
        if targets.get(initial).is_none() {
            return Err(MorphError::UnknownTarget(initial.to_string()));
        }
        Ok(Self {
            targets,
            config,
            state: MorphState::Idle,
            current: Source::Shape(initial.to_string()),
            target: initial.to_string(),
            elapsed: 0.0,
            progress: 0.0,
        })
    }

    /// Begin a transition to `name`. Returns `false` when `name` is already
    /// the pending target, leaving state untouched.
    pub fn go_to(&mut self, name: &str) -> Result<bool, MorphError> {
        if self.targets.get(name).is_none() {
            return Err(MorphError::UnknownTarget(name.to_string()));
        }
        if self.target == name {
            return Ok(false);
        }

        self.current = match self.state {
            MorphState::Idle => Source::Shape(std::mem::take(&mut self.target)),
            MorphState::Transitioning => Source::Snapshot(self.interpolated()),
        };
        tracing::debug!(
            to = name,
            interrupted = self.state == MorphState::Transitioning,
            "morph transition started"
        );
        self.target = name.to_string();
        self.state = MorphState::Transitioning;
        self.elapsed = 0.0;
        self.progress = 0.0;
        Ok(true)
    }

    /// Advance the transition by `dt` seconds of simulated time.
    pub fn advance(&mut self, dt: f32) {
        if self.state != MorphState::Transitioning {
            return;
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += f64::from(dt);
        let duration = f64::from(self.config.duration);
        // Frame deltas like 1/60 are inexact; finish within a few ulps of the end.
        if self.elapsed >= duration * (1.0 - 4.0 * f64::from(f32::EPSILON)) {
            self.progress = 1.0;
            self.state = MorphState::Idle;
            self.current = Source::Shape(self.target.clone());
            tracing::debug!(shape = %self.target, "morph transition finished");
        } else {
            let ramp = (self.elapsed / duration) as f32;
            self.progress = ramp.max(self.progress).min(1.0);
        }
    }

    pub fn state(&self) -> MorphState {
        self.state
    }

    /// Linear time progress in `[0, 1]`.
    pub fn raw_progress(&self) -> f32 {
        self.progress
    }

    /// Eased progress for the renderer.
    pub fn progress(&self) -> f32 {
        self.config.easing.apply(self.progress)
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    /// Name of the current shape; `None` while starting from a snapshot.
    pub fn current_name(&self) -> Option<&str> {
        match &self.current {
            Source::Shape(name) => Some(name),
            Source::Snapshot(_) => None,
        }
    }

    pub fn current_positions(&self) -> &AttributeBuffer {
        match &self.current {
            Source::Shape(name) => self.shape(name),
            Source::Snapshot(buffer) => buffer,
        }
    }

    pub fn target_positions(&self) -> &AttributeBuffer {
        self.shape(&self.target)
    }

    pub fn sizes(&self) -> &[f32] {
        self.targets.sizes()
    }

    pub fn targets(&self) -> &Reconciled {
        &self.targets
    }

    pub fn config(&self) -> &MorphConfig {
        &self.config
    }

    /// The blend the renderer displays right now.
    pub fn interpolated(&self) -> AttributeBuffer {
        let from = self.current_positions();
        // Reconciled targets and snapshots share one shape, so lerp cannot fail.
        from.lerp(self.target_positions(), self.progress())
            .unwrap_or_else(|_| from.clone())
    }

    fn shape(&self, name: &str) -> &AttributeBuffer {
        // Names are validated before they are stored.
        match self.targets.get(name) {
            Some(buffer) => buffer,
            None => unreachable!("morph target '{name}' was validated on entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use glam::Vec3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn targets() -> Reconciled {
        let mut sets = BTreeMap::new();
        sets.insert(
            "X".to_string(),
            AttributeBuffer::from_points(&[Vec3::ZERO, Vec3::X]),
        );
        sets.insert(
            "Y".to_string(),
            AttributeBuffer::from_points(&[Vec3::splat(4.0), Vec3::Y * 4.0]),
        );
        sets.insert(
            "Z".to_string(),
            AttributeBuffer::from_points(&[Vec3::Z * 8.0, Vec3::Z * 8.0]),
        );
        reconcile(&sets, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    fn controller(duration: f32) -> MorphController {
        let config = MorphConfig {
            duration,
            ..MorphConfig::default()
        };
        MorphController::new(targets(), "X", config).unwrap()
    }

    #[test]
    fn go_to_current_is_noop() {
        let mut c = controller(3.0);
        assert!(!c.go_to("X").unwrap());
        assert_eq!(c.state(), MorphState::Idle);
        assert_eq!(c.raw_progress(), 0.0);
        assert_eq!(c.current_name(), Some("X"));
        assert_eq!(c.target_name(), "X");
    }

    #[test]
    fn transition_reaches_one_after_duration() {
        let mut c = controller(3.0);
        assert!(c.go_to("Y").unwrap());
        assert_eq!(c.state(), MorphState::Transitioning);
        assert_eq!(c.raw_progress(), 0.0);
        assert_eq!(c.current_name(), Some("X"));

        let mut last = 0.0;
        for _ in 0..5 {
            c.advance(0.5);
            assert!(c.raw_progress() >= last);
            assert!(c.raw_progress() < 1.0);
            last = c.raw_progress();
        }
        c.advance(0.5);
        assert_eq!(c.raw_progress(), 1.0);
        assert_eq!(c.state(), MorphState::Idle);
        assert_eq!(c.current_name(), Some("Y"));
    }

    #[test]
    fn frame_rate_steps_finish_on_the_last_frame() {
        for duration in [1.0_f32, 3.0] {
            let mut c = controller(duration);
            c.go_to("Y").unwrap();
            let frames = (duration * 60.0) as usize;
            let mut last = 0.0;
            for frame in 1..=frames {
                assert_eq!(c.state(), MorphState::Transitioning, "finished early at frame {frame}");
                c.advance(1.0 / 60.0);
                assert!(c.raw_progress() >= last);
                last = c.raw_progress();
            }
            assert_eq!(c.state(), MorphState::Idle, "duration {duration}");
            assert_eq!(c.raw_progress(), 1.0);
            assert_eq!(c.current_name(), Some("Y"));
        }
    }

    #[test]
    fn invalid_duration_is_rejected() {
        for duration in [f32::NAN, f32::INFINITY, -1.0] {
            let config = MorphConfig {
                duration,
                ..MorphConfig::default()
            };
            assert!(config.validate().is_err());
            assert!(matches!(
                MorphController::new(targets(), "X", config),
                Err(MorphError::InvalidConfig(_))
            ));
        }
        assert!(MorphConfig::default().validate().is_ok());
    }

    #[test]
    fn progress_is_time_driven() {
        let mut a = controller(1.0);
        let mut b = controller(1.0);
        a.go_to("Y").unwrap();
        b.go_to("Y").unwrap();
        a.advance(0.5);
        for _ in 0..4 {
            b.advance(0.125);
        }
        assert_eq!(a.raw_progress(), b.raw_progress());
    }

    #[test]
    fn repeated_go_to_pending_target_is_noop() {
        let mut c = controller(2.0);
        c.go_to("Y").unwrap();
        c.advance(0.5);
        let before = c.raw_progress();
        assert!(!c.go_to("Y").unwrap());
        assert_eq!(c.raw_progress(), before);
        assert_eq!(c.state(), MorphState::Transitioning);
    }

    #[test]
    fn interrupt_restarts_from_displayed_shape() {
        let mut c = controller(2.0);
        c.go_to("Y").unwrap();
        c.advance(1.0);
        let displayed = c.interpolated();

        assert!(c.go_to("Z").unwrap());
        assert_eq!(c.raw_progress(), 0.0);
        assert_eq!(c.current_name(), None);
        assert_eq!(c.current_positions(), &displayed);
        assert_eq!(c.target_positions(), c.targets().get("Z").unwrap());
        // no visual jump at the moment of interruption
        assert_eq!(c.interpolated(), displayed);

        c.advance(2.0);
        assert_eq!(c.state(), MorphState::Idle);
        assert_eq!(c.current_name(), Some("Z"));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let mut c = controller(1.0);
        assert_eq!(c.go_to("W"), Err(MorphError::UnknownTarget("W".into())));
        assert!(matches!(
            MorphController::new(targets(), "W", MorphConfig::default()),
            Err(MorphError::UnknownTarget(_))
        ));
    }

    #[test]
    fn buffers_share_length_and_sizes() {
        let c = controller(1.0);
        assert_eq!(c.current_positions().count(), c.target_positions().count());
        assert_eq!(c.sizes().len(), c.targets().count());
    }

    #[test]
    fn power1_out_eases_progress() {
        let config = MorphConfig {
            duration: 1.0,
            easing: Easing::Power1Out,
        };
        let mut c = MorphController::new(targets(), "X", config).unwrap();
        c.go_to("Y").unwrap();
        c.advance(0.5);
        assert_eq!(c.raw_progress(), 0.5);
        assert_eq!(c.progress(), 0.75);
    }

    #[test]
    fn zero_duration_completes_on_first_advance() {
        let mut c = controller(0.0);
        c.go_to("Y").unwrap();
        c.advance(0.0);
        assert_eq!(c.state(), MorphState::Idle);
        assert_eq!(c.raw_progress(), 1.0);
    }

    #[test]
    fn config_parses_easing_names() {
        let c: MorphConfig = serde_yaml::from_str("duration: 1.5\neasing: power1_out\n").unwrap();
        assert_eq!(c.duration, 1.5);
        assert_eq!(c.easing, Easing::Power1Out);
    }
}
