#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub workers: usize,
    pub idle_workers: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub rejected_jobs: usize,
    pub evicted_workers: usize,
}

impl PoolMetrics {
    pub fn busy_workers(&self) -> usize {
        self.workers.saturating_sub(self.idle_workers)
    }

    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.busy_workers() as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_jobs + self.failed_jobs;
        if total == 0 {
            return 1.0;
        }
        self.completed_jobs as f64 / total as f64
    }
}



#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferMetrics {
    pub allocations: usize,
    pub reused: usize,
    pub discarded: usize,
}

impl BufferMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.allocations + self.reused;
        if total == 0 {
            return 0.0;
        }
        self.reused as f64 / total as f64
    }
}
