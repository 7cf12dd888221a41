//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Imports
//==================================================================================================
use ::anyhow::{
    Context,
    Result,
};
use mem_lib::ProcessId;
use task_lib::Workload;
use ram_lib::Memory;
use replacer_lib::{
    PolicyState,
    Replacement,
};
use disk_lib::{
    DiskPolicy,
    DiskScheduler,
    SEEK_TIME_PER_TRACK_MICROS,
};
use mmu_lib::MMU;

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::Instant,
};
use tokio::sync::mpsc;

use log::{
    debug,
    info,
};

//==================================================================================================
// Aliases
//==================================================================================================
pub type PolicyPair = (DiskPolicy, Replacement);

//==================================================================================================
// Structures
//==================================================================================================
/// Scalar parameters of a simulation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    pub total_frames		: usize,
    pub page_size		: u64,
    pub frames_per_process	: usize,
    /// Lookahead window of OPT (X)
    pub lookahead		: usize,
    pub min_free_pool		: usize,
    pub max_free_pool		: usize,
    pub process_count		: usize,
    pub max_disk_track		: u64,
    pub disk_queue_capacity	: usize,
    /// Working set window (Δ)
    pub working_set_window	: usize,
}

/// Outcome of one (disk policy, replacement policy) run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunStatistics {
    pub disk_policy		: DiskPolicy,
    pub replacement		: Replacement,
    pub references		: u64,
    pub faults_per_process	: BTreeMap<ProcessId, u64>,
    pub total_seek_distance	: u64,
    pub seek_operations		: u64,
    /// Only filled under the working set policy.
    pub working_set_min_max	: BTreeMap<ProcessId, (u64, u64)>,
}

/// Results of a sweep. `runs` holds every pair completed before `failure`, in sweep order.
#[derive(Debug)]
pub struct SweepReport {
    pub runs		: Vec<RunStatistics>,
    pub failure		: Option<anyhow::Error>,
}

/// Replays a static workload under every policy pair.
#[derive(Clone, Debug)]
pub struct Experiment {
    config		: SimConfig,
    workload		: Arc<Workload>,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl SimConfig {
    pub fn validate(&self) -> Result<()> {
	if self.total_frames == 0 {
	    return Err(anyhow::anyhow!("total frame count must be positive"));
	}
	if self.page_size == 0 {
	    return Err(anyhow::anyhow!("page size must be positive"));
	}
	if self.frames_per_process == 0 || self.frames_per_process > self.total_frames {
	    return Err(anyhow::anyhow!(
		"frames per process ({}) must be within 1..={}",
		self.frames_per_process,
		self.total_frames,
	    ));
	}
	if self.min_free_pool > self.max_free_pool || self.max_free_pool > self.total_frames {
	    return Err(anyhow::anyhow!(
		"free pool bounds ({}, {}) must satisfy min <= max <= {}",
		self.min_free_pool,
		self.max_free_pool,
		self.total_frames,
	    ));
	}
	if self.disk_queue_capacity == 0 {
	    return Err(anyhow::anyhow!("disk queue capacity must be positive"));
	}
	if self.working_set_window == 0 {
	    return Err(anyhow::anyhow!("working set window must be positive"));
	}
	Ok(())
    }
}

impl RunStatistics {
    pub fn total_faults(&self) -> u64 {
	self.faults_per_process.values().sum()
    }

    pub fn average_seek_distance(&self) -> Option<f64> {
	if self.seek_operations == 0 {
	    return None;
	}
	Some(self.total_seek_distance as f64 / self.seek_operations as f64)
    }

    pub fn seek_time_micros(&self) -> u64 {
	self.total_seek_distance.saturating_mul(SEEK_TIME_PER_TRACK_MICROS)
    }

    pub fn pair_name(&self) -> String {
	format!("{} + {}", self.disk_policy, self.replacement)
    }
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
	self.failure.is_none()
    }
}

impl Experiment {
    /// Creates a new `Experiment` over `workload`.
    ///
    /// # Returns
    ///
    /// * `Err(..)` - if `config` is invalid;
    pub fn new(config: SimConfig, workload: Workload) -> Result<Self> {
	config.validate()?;
	if workload.len() != config.process_count {
	    log::warn!(
		"[VM] Configuration declares {} processes, workload has {}",
		config.process_count,
		workload.len(),
	    );
	}
	debug!(
	    "[VM] Creating experiment: {} processes, {} references",
	    workload.len(),
	    workload.workload_total_references(),
	);

	Ok(Self {
	    config,
	    workload: Arc::new(workload),
	})
    }

    pub fn config(&self) -> &SimConfig {
	&self.config
    }

    pub fn workload(&self) -> &Workload {
	&self.workload
    }

    /// Every pair in sweep order: disk policies outer, replacement policies inner.
    pub fn pairs() -> Vec<PolicyPair> {
	DiskPolicy::ALL
	    .iter()
	    .flat_map(|&disk| Replacement::ALL.iter().map(move |&replacement| (disk, replacement)))
	    .collect()
    }

    /// Creates the frame and page tables of this workload.
    pub fn memory(&self) -> Memory {
	Memory::new(self.config.total_frames, &self.workload)
    }

    /// Replays the whole workload, process by process, under one pair. `memory` is reset before
    /// the replay.
    pub fn run_pair(&self, memory: &mut Memory, pair: PolicyPair) -> Result<RunStatistics> {
	let (disk_policy, replacement) = pair;
	let start = Instant::now();

	let replacer = PolicyState::new(
	    replacement,
	    self.config.total_frames,
	    self.config.lookahead,
	    self.config.working_set_window,
	);
	let disk = DiskScheduler::new(
	    disk_policy,
	    self.config.disk_queue_capacity,
	    self.config.total_frames,
	);
	let mut mmu = MMU::new(
	    memory,
	    replacer,
	    disk,
	    self.config.page_size,
	    self.config.frames_per_process,
	);

	for process in self.workload.workload_processes() {
	    mmu.run_process(process)
		.with_context(|| format!("run {} + {}", disk_policy, replacement))?;
	}

	let stats = RunStatistics {
	    disk_policy,
	    replacement,
	    references: mmu.references(),
	    faults_per_process: mmu.faults().clone(),
	    total_seek_distance: mmu.disk().total_seek_distance(),
	    seek_operations: mmu.disk().seek_operations(),
	    working_set_min_max: mmu.replacer().working_set_bounds().clone(),
	};
	info!(
	    "[VM] {} finished in {:?}: {} faults, {} tracks",
	    stats.pair_name(),
	    start.elapsed(),
	    stats.total_faults(),
	    stats.total_seek_distance,
	);

	Ok(stats)
    }

    /// Runs `pairs` one after another on a single frame table. Stops at the first failure.
    pub fn sweep_pairs(&self, pairs: &[PolicyPair]) -> SweepReport {
	let mut memory = self.memory();
	let mut runs = Vec::with_capacity(pairs.len());

	for &pair in pairs {
	    match self.run_pair(&mut memory, pair) {
		Ok(stats) => runs.push(stats),
		Err(err) => {
		    return SweepReport { runs, failure: Some(err) };
		},
	    }
	}

	SweepReport { runs, failure: None }
    }

    /// Runs all 18 pairs sequentially.
    pub fn sweep(&self) -> SweepReport {
	self.sweep_pairs(&Self::pairs())
    }

    /// Runs every pair of `pairs` on its own blocking task with private tables. The report is
    /// identical to [`Experiment::sweep_pairs`].
    pub async fn sweep_pairs_concurrent(&self, pairs: &[PolicyPair]) -> SweepReport {
	let (transmitter, mut receiver) = mpsc::channel(pairs.len().max(1));

	for (slot, &pair) in pairs.iter().enumerate() {
	    let experiment = self.clone();
	    let transmitter = transmitter.clone();
	    tokio::task::spawn_blocking(move || {
		let mut memory = experiment.memory();
		let outcome = experiment.run_pair(&mut memory, pair);
		if transmitter.blocking_send((slot, outcome)).is_err() {
		    debug!("[VM] Receiver dropped before {} + {} reported", pair.0, pair.1);
		}
	    });
	}
	drop(transmitter);

	let mut outcomes: Vec<Option<Result<RunStatistics>>> = pairs.iter().map(|_| None).collect();
	while let Some((slot, outcome)) = receiver.recv().await {
	    outcomes[slot] = Some(outcome);
	}

	let mut runs = Vec::with_capacity(pairs.len());
	for (outcome, &(disk, replacement)) in outcomes.into_iter().zip(pairs.iter()) {
	    match outcome {
		Some(Ok(stats)) => runs.push(stats),
		Some(Err(err)) => return SweepReport { runs, failure: Some(err) },
		None => {
		    return SweepReport {
			runs,
			failure: Some(anyhow::anyhow!("run {} + {} did not report", disk, replacement)),
		    };
		},
	    }
	}

	SweepReport { runs, failure: None }
    }

    pub async fn sweep_concurrent(&self) -> SweepReport {
	self.sweep_pairs_concurrent(&Self::pairs()).await
    }
}

//==================================================================================================
// Tests
//==================================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use mem_lib::SimError;
    use rand::{
	rngs::StdRng,
	Rng,
	SeedableRng,
    };
    use task_lib::Process;

    fn config(total_frames: usize, frames_per_process: usize) -> SimConfig {
	SimConfig {
	    total_frames,
	    page_size: 100,
	    frames_per_process,
	    lookahead: 4,
	    min_free_pool: 0,
	    max_free_pool: total_frames,
	    process_count: 2,
	    max_disk_track: 200,
	    disk_queue_capacity: 4,
	    working_set_window: 3,
	}
    }

    fn random_workload(seed: u64) -> Workload {
	let mut rng = StdRng::seed_from_u64(seed);
	let processes = (1..=2)
	    .map(|pid| {
		let pages = rng.gen_range(3..10u64);
		let tracks = (0..pages).map(|_| rng.gen_range(0..=200)).collect();
		let refs = (0..80).map(|_| rng.gen_range(0..pages * 100)).collect();
		Process::new(pid, tracks, refs)
	    })
	    .collect();
	Workload::new(processes)
    }

    #[test]
    fn sweep_covers_every_pair() {
	let experiment = Experiment::new(config(4, 3), random_workload(1)).unwrap();
	let report = experiment.sweep();
	assert!(report.is_complete());
	assert_eq!(report.runs.len(), 18);

	let pairs: Vec<PolicyPair> = report.runs.iter().map(|r| (r.disk_policy, r.replacement)).collect();
	assert_eq!(pairs, Experiment::pairs());
	assert_eq!(pairs[0], (DiskPolicy::Fifo, Replacement::Lifo));
	assert_eq!(pairs[17], (DiskPolicy::Scan, Replacement::WorkingSet));

	for run in report.runs.iter() {
	    assert_eq!(run.references, 160);
	    assert_eq!(run.seek_operations, run.total_faults());
	    if run.replacement == Replacement::WorkingSet {
		assert_eq!(run.working_set_min_max.len(), 2);
		assert!(run.working_set_min_max.values().all(|&(min, max)| min >= 1 && min <= max && max <= 3));
	    } else {
		assert!(run.working_set_min_max.is_empty());
	    }
	}
    }

    #[test]
    fn replaying_a_pair_is_deterministic() {
	let experiment = Experiment::new(config(3, 3), random_workload(9)).unwrap();
	let mut memory = experiment.memory();
	for pair in Experiment::pairs() {
	    let first = experiment.run_pair(&mut memory, pair).unwrap();
	    let second = experiment.run_pair(&mut memory, pair).unwrap();
	    assert_eq!(first, second);
	    assert_eq!(format!("{:?}", first), format!("{:?}", second));
	}
    }

    #[test]
    fn lru_scenario_counts_five_faults() {
	let workload = Workload::new(vec![Process::new(1, vec![10, 20, 30], vec![0, 100, 200, 0, 100])]);
	let mut cfg = config(2, 2);
	cfg.process_count = 1;
	let experiment = Experiment::new(cfg, workload).unwrap();
	let mut memory = experiment.memory();
	let stats = experiment.run_pair(&mut memory, (DiskPolicy::Fifo, Replacement::Lru)).unwrap();

	assert_eq!(stats.faults_per_process.get(&1), Some(&5));
	// 0 -> 10 -> 20 -> 30 -> 10 -> 20
	assert_eq!(stats.total_seek_distance, 10 + 10 + 10 + 20 + 10);
	assert_eq!(stats.average_seek_distance(), Some(12.0));
	assert_eq!(stats.seek_time_micros(), 60 * SEEK_TIME_PER_TRACK_MICROS);
    }

    #[test]
    fn opt_looks_ahead_on_the_lru_scenario() {
	// 2 evicts page 1 (needed after 0), then 0 hits: one fault fewer than LRU
	let workload = Workload::new(vec![Process::new(1, vec![10, 20, 30], vec![0, 100, 200, 0, 100])]);
	let mut cfg = config(2, 2);
	cfg.process_count = 1;
	let experiment = Experiment::new(cfg, workload).unwrap();
	let mut memory = experiment.memory();
	let opt = experiment.run_pair(&mut memory, (DiskPolicy::Fifo, Replacement::Opt)).unwrap();
	let lru = experiment.run_pair(&mut memory, (DiskPolicy::Fifo, Replacement::Lru)).unwrap();
	assert_eq!(opt.total_faults(), 4);
	assert_eq!(lru.total_faults(), 5);
    }

    #[test]
    fn failure_names_pair_and_process() {
	let workload = Workload::new(vec![
	    Process::new(1, vec![0; 2], vec![0, 100]),
	    Process::new(2, vec![0; 2], vec![0, 950]),
	]);
	let experiment = Experiment::new(config(2, 2), workload).unwrap();
	let report = experiment.sweep();

	assert!(report.runs.is_empty());
	let failure = report.failure.unwrap();
	assert!(format!("{:#}", failure).contains("FIFO + LIFO"));
	assert_eq!(
	    failure.downcast_ref::<SimError>(),
	    Some(&SimError::PageOutOfRange { process: 2, address: 950, page: 9, page_count: 2 }),
	);
    }

    #[test]
    fn process_without_faults_reports_zero() {
	let workload = Workload::new(vec![
	    Process::new(1, vec![10], vec![0]),
	    Process::new(2, vec![20], vec![]),
	]);
	let experiment = Experiment::new(config(2, 1), workload).unwrap();
	let mut memory = experiment.memory();
	let stats = experiment.run_pair(&mut memory, (DiskPolicy::Fifo, Replacement::Lru)).unwrap();

	assert_eq!(stats.faults_per_process.get(&1), Some(&1));
	assert_eq!(stats.faults_per_process.get(&2), Some(&0));
	assert_eq!(stats.total_faults(), 1);
    }

    #[test]
    fn seek_time_saturates() {
	let stats = RunStatistics {
	    disk_policy: DiskPolicy::Scan,
	    replacement: Replacement::Lfu,
	    references: 1,
	    faults_per_process: BTreeMap::from([(1, 1)]),
	    total_seek_distance: u64::MAX / 2,
	    seek_operations: 1,
	    working_set_min_max: BTreeMap::new(),
	};
	assert_eq!(stats.seek_time_micros(), u64::MAX);
    }

    #[test]
    fn invalid_configuration_is_rejected() {
	assert!(Experiment::new(config(2, 3), random_workload(1)).is_err());
	let mut cfg = config(4, 2);
	cfg.page_size = 0;
	assert!(cfg.validate().is_err());
	let mut cfg = config(4, 2);
	cfg.min_free_pool = 3;
	cfg.max_free_pool = 2;
	assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn concurrent_sweep_matches_sequential() {
	let experiment = Experiment::new(config(5, 3), random_workload(5)).unwrap();
	let sequential = experiment.sweep();
	let concurrent = experiment.sweep_concurrent().await;
	assert!(concurrent.is_complete());
	assert_eq!(sequential.runs, concurrent.runs);
    }
}
