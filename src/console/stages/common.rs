/// Convert decibels to linear amplitude.
#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at -200 dB for silence.
#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    20.0 * lin.max(1e-10).log10()
}

/// Calculate a one-pole smoothing coefficient from a time constant in milliseconds.
///
/// Returns `exp(-1 / (sample_rate * time_ms * 0.001))`.
/// Useful for attack/release envelopes.
#[inline]
pub fn calculate_coefficient(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (sample_rate * 0.001 * time_ms)).exp()
}

/// Zero out values small enough to fall into the subnormal range on decay.
#[inline]
pub fn flush_denormal(value: f32) -> f32 {
    if value.abs() < 1e-20 { 0.0 } else { value }
}

/// One-pole envelope follower with configurable attack and release coefficients.
#[derive(Clone, Debug)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl EnvelopeFollower {
    /// Create from pre-computed coefficients.
    pub const fn new(attack_coeff: f32, release_coeff: f32) -> Self {
        Self {
            envelope: 0.0,
            attack_coeff,
            release_coeff,
        }
    }

    /// Create from attack/release times in milliseconds.
    pub fn from_ms(attack_ms: f32, release_ms: f32, sample_rate: f32) -> Self {
        Self::new(
            calculate_coefficient(attack_ms, sample_rate),
            calculate_coefficient(release_ms, sample_rate),
        )
    }

    pub const fn value(&self) -> f32 {
        self.envelope
    }

    pub const fn reset(&mut self) {
        self.envelope = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = flush_denormal(coeff.mul_add(self.envelope, (1.0 - coeff) * abs_input));
        self.envelope
    }
}

/// Linear per-sample ramp toward a target value.
///
/// The ramp lands exactly on the target once its steps run out, so a settled
/// smoother reports the target bit-for-bit.
#[derive(Clone, Debug)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    steps_left: u32,
    ramp_len: u32,
}

impl LinearSmoother {
    pub const fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            steps_left: 0,
            ramp_len: 0,
        }
    }

    /// Set the ramp length from a duration in milliseconds.
    pub fn set_ramp_ms(&mut self, ramp_ms: f32, sample_rate: f32) {
        self.ramp_len = (ramp_ms * 0.001 * sample_rate).round().max(0.0) as u32;
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_len == 0 {
            self.snap();
        } else {
            self.steps_left = self.ramp_len;
            self.step = (self.target - self.current) / self.ramp_len as f32;
        }
    }

    /// Jump straight to the target, abandoning any ramp in progress.
    pub const fn snap(&mut self) {
        self.current = self.target;
        self.steps_left = 0;
        self.step = 0.0;
    }

    pub const fn target(&self) -> f32 {
        self.target
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn is_settled(&self) -> bool {
        self.steps_left == 0
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.steps_left > 0 {
            self.steps_left -= 1;
            self.current = if self.steps_left == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }
}
