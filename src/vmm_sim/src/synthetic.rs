//==================================================================================================
// Imports
//==================================================================================================
use mem_lib::{
    Address,
    ProcessId,
};
use task_lib::{
    Process,
    Workload,
};
use vm_lib::SimConfig;
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};

//==================================================================================================
// Constants
//==================================================================================================
const PAGE_SIZE: u64 = 512;
const MAX_DISK_TRACK: u64 = 199;

//==================================================================================================
// Functions
//==================================================================================================
/// Builds a reproducible random workload and a configuration sized for it.
///
/// # Arguments
/// * `seed`       - Seed of the generator; equal seeds give equal workloads;
/// * `processes`  - Number of processes;
/// * `references` - References per process;
/// * `pages`      - Pages per process;
pub fn generate(seed: u64, processes: usize, references: usize, pages: usize) -> (SimConfig, Workload) {
    let mut rng = StdRng::seed_from_u64(seed);
    let address_space = pages as u64 * PAGE_SIZE;

    let workload = Workload::new(
	(1..=processes as ProcessId)
	    .map(|pid| {
		let tracks: Vec<Address> = (0..pages)
		    .map(|_| rng.gen_range(0..=MAX_DISK_TRACK))
		    .collect();
		let trace: Vec<Address> = (0..references)
		    .map(|_| rng.gen_range(0..address_space))
		    .collect();
		Process::new(pid, tracks, trace)
	    })
	    .collect(),
    );

    let frames_per_process = (pages / 2).max(1);
    let total_frames = frames_per_process * 2;
    let config = SimConfig {
	total_frames,
	page_size: PAGE_SIZE,
	frames_per_process,
	lookahead: frames_per_process,
	min_free_pool: 1,
	max_free_pool: total_frames,
	process_count: processes,
	max_disk_track: MAX_DISK_TRACK,
	disk_queue_capacity: 1,
	working_set_window: frames_per_process,
    };

    (config, workload)
}

//==================================================================================================
// Tests
//==================================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_workload() {
	let (config, first) = generate(3, 2, 50, 6);
	let (_, second) = generate(3, 2, 50, 6);
	assert_eq!(first, second);
	assert!(config.validate().is_ok());
	assert_eq!(first.workload_total_references(), 100);
    }

    #[test]
    fn references_stay_inside_the_address_space() {
	let (config, workload) = generate(8, 3, 100, 4);
	for process in workload.workload_processes() {
	    assert_eq!(process.process_page_count(), 4);
	    assert!(process.process_references().iter().all(|&a| a / config.page_size < 4));
	    assert!(process.process_disk_addresses().iter().all(|&t| t <= config.max_disk_track));
	}
    }
}
