/// ReplayGain 1.0 reference level in dB SPL
pub const DEFAULT_TARGET_DB: f64 = 89.0;

/// Tracks scanned in parallel unless configured otherwise
pub const DEFAULT_JOBS: usize = 16;

/// Frames decoded per read; also the cancellation granularity
pub const DEFAULT_BLOCK_FRAMES: usize = 2000;

/// What a per-track fatal error does to the rest of the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Only the failing track is marked failed
    #[default]
    Isolate,
    /// The failing worker also raises the abort signal
    AbortScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub target_db: f64,
    pub jobs: usize,
    pub block_frames: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_db: DEFAULT_TARGET_DB,
            jobs: DEFAULT_JOBS,
            block_frames: DEFAULT_BLOCK_FRAMES,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_target_db(mut self, target_db: f64) -> Self {
        self.target_db = target_db;
        self
    }

    /// Concurrency bound; zero is treated as one.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
