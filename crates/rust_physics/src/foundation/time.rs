//! Fixed-timestep bookkeeping
//!
//! Physics always advances in constant increments; the render loop feeds in
//! whatever frame time it measured and asks how many steps to run.

/// Accumulates variable frame time into fixed physics steps
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: f32,
    accumulator: f32,
    max_steps_per_frame: u32,
    total_steps: u64,
}

impl FixedTimestep {
    /// Create an accumulator for the given step length in seconds
    pub fn new(step: f32) -> Self {
        Self {
            step,
            accumulator: 0.0,
            max_steps_per_frame: 8,
            total_steps: 0,
        }
    }

    /// Limit how many steps a single long frame may trigger
    #[must_use]
    pub fn with_max_steps_per_frame(mut self, max_steps: u32) -> Self {
        self.max_steps_per_frame = max_steps.max(1);
        self
    }

    /// Add elapsed frame time and return how many fixed steps are due
    ///
    /// Time beyond `max_steps_per_frame` steps is dropped so a stalled frame
    /// cannot snowball into ever longer catch-up frames.
    pub fn advance(&mut self, frame_time: f32) -> u32 {
        if !frame_time.is_finite() || frame_time <= 0.0 {
            return 0;
        }

        self.accumulator += frame_time;
        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps_per_frame {
            self.accumulator -= self.step;
            steps += 1;
        }

        if steps == self.max_steps_per_frame && self.accumulator >= self.step {
            log::debug!(
                "Dropping {:.3}s of physics time after {} catch-up steps",
                self.accumulator,
                steps
            );
            self.accumulator %= self.step;
        }

        self.total_steps += u64::from(steps);
        steps
    }

    /// Fixed step length in seconds
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Fraction of a step left in the accumulator, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }

    /// Steps taken since creation
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Whole steps per second (the stacking-penalty window)
    pub fn steps_per_second(&self) -> u32 {
        steps_per_second(self.step)
    }
}

/// Whole steps per second for a step length, never less than one
pub fn steps_per_second(step: f32) -> u32 {
    if step > 0.0 && step.is_finite() {
        (1.0 / step).round().max(1.0) as u32
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut timestep = FixedTimestep::new(0.02);
        assert_eq!(timestep.advance(0.01), 0);
        assert_eq!(timestep.advance(0.015), 1);
        assert_eq!(timestep.total_steps(), 1);
    }

    #[test]
    fn test_long_frame_is_capped() {
        let mut timestep = FixedTimestep::new(0.02).with_max_steps_per_frame(4);
        assert_eq!(timestep.advance(1.0), 4);
        assert!(timestep.alpha() < 1.0);
    }

    #[test]
    fn test_steps_per_second() {
        assert_eq!(steps_per_second(0.02), 50);
        assert_eq!(steps_per_second(0.0), 1);
        assert_eq!(steps_per_second(5.0), 1);
    }
}
