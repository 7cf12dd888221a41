//==================================================================================================
// Imports
//==================================================================================================
use vm_lib::{
    RunStatistics,
    SimConfig,
};

//==================================================================================================
// Functions
//==================================================================================================
pub fn header(config: &SimConfig) -> String {
    format!(
	"Total Page Frames: {}\n\
	 Page Size: {}\n\
	 Page Frames Per Process: {}\n\
	 Lookahead Window Size: {}\n\
	 Working Set Window: {}\n\
	 Min Free Pool Size: {}\n\
	 Max Free Pool Size: {}\n\
	 Number of Processes: {}\n\
	 Largest-numbered Track: {}\n\
	 Disk Queue Capacity: {}\n",
	config.total_frames,
	config.page_size,
	config.frames_per_process,
	config.lookahead,
	config.working_set_window,
	config.min_free_pool,
	config.max_free_pool,
	config.process_count,
	config.max_disk_track,
	config.disk_queue_capacity,
    )
}

/// Text block of one policy pair.
pub fn run(stats: &RunStatistics) -> String {
    let mut out = format!("---- {} ----\n", stats.pair_name());
    for (pid, faults) in stats.faults_per_process.iter() {
	out.push_str(&format!("Process {}: {} faults\n", pid, faults));
    }
    out.push_str(&format!("TOTAL FAULTS: {} ({} references)\n", stats.total_faults(), stats.references));
    out.push_str(&format!(
	"Seek: {} operations, {} tracks, {} us\n",
	stats.seek_operations,
	stats.total_seek_distance,
	stats.seek_time_micros(),
    ));
    if let Some(average) = stats.average_seek_distance() {
	out.push_str(&format!("Average seek: {:.2} tracks/operation\n", average));
    }
    for (pid, (min, max)) in stats.working_set_min_max.iter() {
	out.push_str(&format!("Process {} working set: MIN {} MAX {}\n", pid, min, max));
    }
    out
}

/// One CSV line per pair: pair, total faults, seek operations, seek distance.
pub fn summary(runs: &[RunStatistics]) -> String {
    let lines = runs.iter().map(|stats| {
	format!(
	    "{},{},{},{}\n",
	    stats.pair_name(),
	    stats.total_faults(),
	    stats.seek_operations,
	    stats.total_seek_distance,
	)
    });
    std::iter::once(String::from("pair,faults,seek_operations,seek_distance\n"))
	.chain(lines)
	.collect()
}

//==================================================================================================
// Tests
//==================================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use disk_lib::DiskPolicy;
    use replacer_lib::Replacement;
    use std::collections::BTreeMap;

    #[test]
    fn run_block_lists_processes_and_working_sets() {
	let stats = RunStatistics {
	    disk_policy: DiskPolicy::Sstf,
	    replacement: Replacement::WorkingSet,
	    references: 10,
	    faults_per_process: BTreeMap::from([(1, 3), (2, 4)]),
	    total_seek_distance: 70,
	    seek_operations: 7,
	    working_set_min_max: BTreeMap::from([(1, (1, 3))]),
	};
	let text = run(&stats);
	assert!(text.starts_with("---- SSTF + WS ----"));
	assert!(text.contains("Process 2: 4 faults"));
	assert!(text.contains("TOTAL FAULTS: 7"));
	assert!(text.contains("Average seek: 10.00"));
	assert!(text.contains("Process 1 working set: MIN 1 MAX 3"));
	assert_eq!(summary(&[stats]).lines().nth(1), Some("SSTF + WS,7,7,70"));
    }

    #[test]
    fn run_block_lists_processes_without_faults() {
	let stats = RunStatistics {
	    disk_policy: DiskPolicy::Fifo,
	    replacement: Replacement::Lru,
	    references: 1,
	    faults_per_process: BTreeMap::from([(1, 1), (2, 0)]),
	    total_seek_distance: 5,
	    seek_operations: 1,
	    working_set_min_max: BTreeMap::new(),
	};
	let text = run(&stats);
	assert!(text.contains("Process 2: 0 faults"));
	assert!(!text.contains("working set"));
	assert_eq!(summary(&[]), "pair,faults,seek_operations,seek_distance\n");
    }
}
