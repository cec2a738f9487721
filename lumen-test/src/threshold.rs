/// Every threshold must hold for an image comparison to pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn check(self, pool: &mut nv_flip::FlipPool) -> bool {
        // An empty set would pass anything.
        let mut all_passed = !self.thresholds.is_empty();
        // Every check runs so all results get printed.
        for check in self.thresholds {
            all_passed &= check.check(pool);
        }
        all_passed
    }
}

/// A bound on the FLIP error pool of a comparison.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Threshold {
    Mean(f32),
    Max(f32),
    Percentile { percentile: f32, threshold: f32 },
}

impl Threshold {
    fn report(name: &str, value: f32, limit: f32) -> bool {
        let within = value <= limit;
        println!(
            "    Expected {} ({:.6}) to be under expected maximum ({}): {}",
            name,
            value,
            limit,
            if within { "PASS" } else { "FAIL" }
        );
        within
    }

    fn check(&self, pool: &mut nv_flip::FlipPool) -> bool {
        match *self {
            Self::Mean(v) => Self::report("Mean", pool.mean(), v),
            Self::Max(v) => Self::report("Max", pool.max_value(), v),
            Self::Percentile { percentile, threshold } => Self::report(
                &format!("{}%", percentile * 100.0),
                pool.get_percentile(percentile, true),
                threshold,
            ),
        }
    }
}

impl From<Threshold> for ThresholdSet {
    fn from(threshold: Threshold) -> Self {
        Self {
            thresholds: vec![threshold],
        }
    }
}

impl From<&[Threshold]> for ThresholdSet {
    fn from(thresholds: &[Threshold]) -> Self {
        Self {
            thresholds: thresholds.into(),
        }
    }
}
