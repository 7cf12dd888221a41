//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Imports
//==================================================================================================
use mem_lib::{
    FrameId,
    PageNumber,
    ProcessId,
    Reference,
    SimError,
};
use task_lib::Process;
use ram_lib::Memory;
use replacer_lib::PolicyState;
use disk_lib::{
    DiskRequest,
    DiskScheduler,
};
use std::collections::BTreeMap;
use log::debug;

//==================================================================================================
// Structures
//==================================================================================================
/// Resolves references of one run against its frame table, replacement policy and disk.
pub struct MMU<'m> {
    memory		: &'m mut Memory,
    replacer		: PolicyState,
    disk		: DiskScheduler,
    page_size		: u64,
    frames_per_process	: usize,

    faults		: BTreeMap<ProcessId, u64>,
    references		: u64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TranslateResult {
    Hit(FrameId),
    Fault(PageNumber),
}

/// Outcome of one reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Hit(FrameId),
    Fault {
	frame: FrameId,
	evicted: Option<(ProcessId, PageNumber)>,
    },
}

//==================================================================================================
// Implementations
//==================================================================================================
impl<'m> MMU<'m> {
    /// Takes `memory` for the duration of a run. The frame table and every page table are reset
    /// first, so no state leaks from a previous run.
    ///
    /// # Arguments
    ///
    /// * `memory`             - Frame and page tables, reused across runs;
    /// * `replacer`           - Fresh policy state of this run;
    /// * `disk`               - Fresh disk scheduler of this run;
    /// * `page_size`          - Bytes per page;
    /// * `frames_per_process` - Frames a process may own before it must replace its own pages;
    pub fn new(
	memory: &'m mut Memory,
	replacer: PolicyState,
	disk: DiskScheduler,
	page_size: u64,
	frames_per_process: usize,
    ) -> Self {
	debug!(
	    "[MMU] Creating MMU ({} + {}, page size {}, quota {})",
	    disk.policy(),
	    replacer.replacement(),
	    page_size,
	    frames_per_process,
	);
	memory.reset();
	// every process reports a count, even one that never faults
	let faults = memory.processes().map(|process| (process, 0)).collect();

	Self {
	    memory,
	    replacer,
	    disk,
	    page_size,
	    frames_per_process,
	    faults,
	    references: 0,
	}
    }

    /// Looks `reference` up in its page table.
    ///
    /// # Returns
    ///
    /// * `Err(SimError::PageOutOfRange)` - if the address lies past the declared pages;
    pub fn translate(&self, reference: &Reference) -> Result<TranslateResult, SimError> {
	let process = reference.reference_process();
	let page = reference.page_number(self.page_size);

	match self.memory.resident(process, page) {
	    Ok(Some(frame)) => Ok(TranslateResult::Hit(frame)),
	    Ok(None) => Ok(TranslateResult::Fault(page)),
	    Err(SimError::PageOutOfRange { page_count, .. }) => Err(SimError::PageOutOfRange {
		process,
		address: reference.reference_virtual_address(),
		page,
		page_count,
	    }),
	    Err(err) => Err(err),
	}
    }

    /// Replays the `index`-th reference of `process`.
    pub fn access(&mut self, process: &Process, index: usize) -> Result<Access, SimError> {
	let pid = process.process_pid();
	let Some(reference) = process.process_reference(index) else {
	    return Err(SimError::TraceExhausted { process: pid, index });
	};
	self.references += 1;

	let page = reference.page_number(self.page_size);
	match self.translate(&reference)? {
	    TranslateResult::Hit(frame) => {
		self.replacer.record_reference(pid, page);
		self.memory.touch(frame);
		self.replacer.on_access(frame);
		Ok(Access::Hit(frame))
	    },
	    TranslateResult::Fault(page) => {
		self.replacer.record_reference(pid, page);
		*self.faults.entry(pid).or_insert(0) += 1;

		let upcoming = process.process_upcoming_pages(index, self.replacer.lookahead(), self.page_size);
		self.handle_page_fault(pid, page, &upcoming)
	    },
	}
    }

    /// Brings `page` of `process` in, evicting one of the process' own pages when it is at its
    /// quota or when no frame is free.
    pub fn handle_page_fault(
	&mut self,
	process: ProcessId,
	page: PageNumber,
	upcoming: &[PageNumber],
    ) -> Result<Access, SimError> {
	// Nothing is mutated until the page, the target frame and the disk request are accepted.
	let disk_address = self.memory.disk_address(process, page)?;
	let at_quota = self.memory.owned_by(process) >= self.frames_per_process;
	let (frame, victim) = match self.memory.find_free_frame() {
	    Some(frame) if !at_quota => (frame, None),
	    _ => {
		let victim = self.replacer.select_victim(process, &*self.memory, upcoming)?;
		(victim, Some(victim))
	    },
	};
	self.disk.enqueue(DiskRequest {
	    process,
	    page,
	    target_frame: frame,
	    disk_address,
	})?;

	let evicted = match victim {
	    Some(victim) => {
		let evicted = self.memory.evict(victim)?;
		self.replacer.on_evict(victim);
		debug!(
		    "[MMU] {} evicted process {} page {} from frame {}",
		    self.replacer.replacement(),
		    evicted.0,
		    evicted.1,
		    victim,
		);
		Some(evicted)
	    },
	    None => None,
	};
	self.service_disk()?;

	Ok(Access::Fault { frame, evicted })
    }

    /// Releases every frame of `process` once its trace is over.
    pub fn finish_process(&mut self, process: ProcessId) -> Result<(), SimError> {
	let frames = self.memory.release_process(process)?;
	self.replacer.on_exit(process, &frames);
	debug!("[MMU] Process {} exited, released frames {:?}", process, frames);
	Ok(())
    }

    /// Replays the full trace of `process`, then releases its frames.
    pub fn run_process(&mut self, process: &Process) -> Result<(), SimError> {
	for index in 0..process.process_references().len() {
	    self.access(process, index)?;
	}
	self.finish_process(process.process_pid())
    }

    pub fn memory(&self) -> &Memory {
	&*self.memory
    }

    pub fn replacer(&self) -> &PolicyState {
	&self.replacer
    }

    pub fn disk(&self) -> &DiskScheduler {
	&self.disk
    }

    pub fn faults(&self) -> &BTreeMap<ProcessId, u64> {
	&self.faults
    }

    pub fn references(&self) -> u64 {
	self.references
    }

    // Requests are serviced synchronously: every page is resident before the next reference.
    fn service_disk(&mut self) -> Result<(), SimError> {
	for done in self.disk.run_all() {
	    let request = done.request;
	    self.memory.assign(request.process, request.page, request.target_frame)?;
	    self.replacer.on_assign(request.target_frame);
	    self.replacer.on_access(request.target_frame);
	}
	Ok(())
    }
}

//==================================================================================================
// Tests
//==================================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use disk_lib::DiskPolicy;
    use rand::{
	rngs::StdRng,
	Rng,
	SeedableRng,
    };
    use replacer_lib::Replacement;
    use task_lib::Workload;

    const PAGE: u64 = 100;

    fn trace(pages: &[u64]) -> Vec<u64> {
	pages.iter().map(|p| p * PAGE).collect()
    }

    fn mmu(memory: &mut Memory, replacement: Replacement, frames: usize, quota: usize) -> MMU<'_> {
	MMU::new(
	    memory,
	    PolicyState::new(replacement, frames, 3, 3),
	    DiskScheduler::new(DiskPolicy::Fifo, 4, frames),
	    PAGE,
	    quota,
	)
    }

    #[test]
    fn lru_thrashes_with_two_frames() {
	// 0 F, 1 F, 2 F (evicts 0), 0 F (evicts 1), 1 F (evicts 2)
	let process = Process::new(1, vec![5, 6, 7], trace(&[0, 1, 2, 0, 1]));
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(2, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lru, 2, 2);

	let mut evictions = Vec::new();
	for index in 0..5 {
	    if let Access::Fault { evicted: Some((_, page)), .. } = mmu.access(&process, index).unwrap() {
		evictions.push(page);
	    }
	}
	assert_eq!(mmu.faults().get(&1), Some(&5));
	assert_eq!(evictions, vec![0, 1, 2]);
    }

    #[test]
    fn hits_do_not_fault() {
	let process = Process::new(1, vec![5, 6], trace(&[0, 0, 1, 0, 1]));
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(2, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lru, 2, 2);

	assert_eq!(mmu.access(&process, 0), Ok(Access::Fault { frame: 0, evicted: None }));
	assert_eq!(mmu.access(&process, 1), Ok(Access::Hit(0)));
	mmu.run_process(&process).unwrap();
	// the replay above restarts the trace: pages 0 and 1 are already resident
	assert_eq!(mmu.faults().get(&1), Some(&2));
	assert_eq!(mmu.references(), 7);
	assert_eq!(mmu.memory().free_count(), 2);
    }

    #[test]
    fn seek_follows_disk_addresses() {
	let process = Process::new(1, vec![40, 10], trace(&[0, 1, 0]));
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(2, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lru, 2, 2);
	mmu.run_process(&process).unwrap();

	assert_eq!(mmu.disk().seek_operations(), 2);
	assert_eq!(mmu.disk().total_seek_distance(), 40 + 30);
    }

    #[test]
    fn quota_forces_local_replacement() {
	let process = Process::new(1, vec![0; 3], trace(&[0, 1, 2]));
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(4, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lifo, 4, 2);
	for index in 0..3 {
	    mmu.access(&process, index).unwrap();
	}
	assert_eq!(mmu.memory().owned_by(1), 2);
	assert_eq!(mmu.memory().resident(1, 1), Ok(None));
	assert_eq!(mmu.memory().resident(1, 2), Ok(Some(1)));
    }

    #[test]
    fn out_of_range_address_is_fatal() {
	let process = Process::new(4, vec![0; 2], vec![0x10, 2 * PAGE + 1]);
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(2, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lru, 2, 2);

	assert_eq!(
	    mmu.run_process(&process),
	    Err(SimError::PageOutOfRange { process: 4, address: 2 * PAGE + 1, page: 2, page_count: 2 }),
	);
    }

    #[test]
    fn failed_fault_keeps_resident_pages() {
	let process = Process::new(1, vec![5, 6], trace(&[0]));
	let workload = Workload::new(vec![process.clone()]);
	let mut memory = Memory::new(1, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lru, 1, 1);
	mmu.access(&process, 0).unwrap();

	assert!(matches!(
	    mmu.handle_page_fault(1, 7, &[]),
	    Err(SimError::PageOutOfRange { process: 1, page: 7, .. }),
	));
	assert_eq!(mmu.memory().resident(1, 0), Ok(Some(0)));
	assert_eq!(mmu.disk().pending(), 0);
	assert_eq!(mmu.disk().seek_operations(), 1);
	assert!(mmu.memory().check_invariants().is_ok());
    }

    #[test]
    fn idle_processes_count_zero_faults() {
	let busy = Process::new(1, vec![5], trace(&[0, 0]));
	let idle = Process::new(2, vec![6], vec![]);
	let workload = Workload::new(vec![busy.clone(), idle.clone()]);
	let mut memory = Memory::new(2, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Lfu, 2, 1);
	assert_eq!(mmu.faults().get(&2), Some(&0));

	mmu.run_process(&busy).unwrap();
	mmu.run_process(&idle).unwrap();
	assert_eq!(mmu.faults().get(&1), Some(&1));
	assert_eq!(mmu.faults().get(&2), Some(&0));
	assert_eq!(mmu.faults().len(), 2);
    }

    #[test]
    fn no_victim_when_table_held_by_others() {
	let first = Process::new(1, vec![0; 2], vec![]);
	let second = Process::new(2, vec![0; 2], trace(&[0]));
	let workload = Workload::new(vec![first, second.clone()]);
	let mut memory = Memory::new(1, &workload);
	let mut mmu = mmu(&mut memory, Replacement::Mru, 1, 1);
	mmu.memory.assign(1, 0, 0).unwrap();

	assert_eq!(
	    mmu.access(&second, 0),
	    Err(SimError::NoVictim { process: 2, policy: "MRU" }),
	);
    }

    #[test]
    fn random_traces_keep_tables_consistent() {
	let mut rng = StdRng::seed_from_u64(42);
	let processes: Vec<Process> = (1..=3)
	    .map(|pid| {
		let pages = rng.gen_range(2..8u64);
		let tracks = (0..pages).map(|_| rng.gen_range(0..200)).collect();
		let refs = (0..60).map(|_| rng.gen_range(0..pages * PAGE)).collect();
		Process::new(pid, tracks, refs)
	    })
	    .collect();
	let workload = Workload::new(processes.clone());

	for replacement in Replacement::ALL {
	    let mut memory = Memory::new(3, &workload);
	    let mut mmu = mmu(&mut memory, replacement, 3, 3);
	    for process in processes.iter() {
		let mut faults = 0;
		for index in 0..process.process_references().len() {
		    let fresh = mmu.translate(&process.process_reference(index).unwrap()).unwrap();
		    let access = mmu.access(process, index).unwrap();
		    match (fresh, access) {
			(TranslateResult::Hit(frame), Access::Hit(hit)) => assert_eq!(frame, hit),
			(TranslateResult::Fault(_), Access::Fault { .. }) => faults += 1,
			other => panic!("lookup and access disagree: {:?}", other),
		    }
		    assert_eq!(mmu.faults().get(&process.process_pid()), Some(&faults));
		    assert!(mmu.memory().check_invariants().is_ok());
		}
		mmu.finish_process(process.process_pid()).unwrap();
	    }
	}
    }
}
