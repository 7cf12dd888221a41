//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Imports
//==================================================================================================
use mem_lib::{
    Address,
    FrameId,
    PageNumber,
    ProcessId,
    SimError,
};
use task_lib::Workload;
use std::collections::BTreeMap;
use log::debug;

//==================================================================================================
// Structures
//==================================================================================================
/// A physical frame slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub owner			: Option<(ProcessId, PageNumber)>,
    pub access_count		: u64,
    pub last_disk_address	: Option<Address>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame_number	: Option<FrameId>,
    pub disk_address	: Address,
}

/// Page table of a single process. Its length is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
}

/// Frame table shared by every process plus each process' page table.
#[derive(Clone, Debug)]
pub struct Memory {
    frames		: Vec<Frame>,
    page_tables		: BTreeMap<ProcessId, PageTable>,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl PageTable {
    pub fn new(disk_addresses: &[Address]) -> Self {
	let entries = disk_addresses
	    .iter()
	    .map(|&disk_address| PageTableEntry { frame_number: None, disk_address })
	    .collect();
	Self { entries }
    }

    pub fn entry(&self, page: PageNumber) -> Option<&PageTableEntry> {
	self.entries.get(page)
    }

    pub fn len(&self) -> usize {
	self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
	self.entries.is_empty()
    }

    fn entry_mut(&mut self, page: PageNumber) -> Option<&mut PageTableEntry> {
	self.entries.get_mut(page)
    }
}

impl Memory {
    /// Creates the frame table and one page table per process of `workload`. Every frame starts
    /// free and every page unresident.
    pub fn new (total_frames: usize, workload: &Workload) -> Self {
	debug!(
	    "[RAM] Creating frame table with {} frames for {} processes",
	    total_frames,
	    workload.len(),
	);

	let page_tables = workload
	    .workload_processes()
	    .iter()
	    .map(|p| (p.process_pid(), PageTable::new(p.process_disk_addresses())))
	    .collect();

	Self {
	    frames: vec![Frame::default(); total_frames],
	    page_tables,
	}
    }

    /// Frees every frame and marks every page unresident. Disk addresses are kept.
    pub fn reset(&mut self) {
	for frame in self.frames.iter_mut() {
	    *frame = Frame::default();
	}
	for table in self.page_tables.values_mut() {
	    for entry in table.entries.iter_mut() {
		entry.frame_number = None;
	    }
	}
    }

    pub fn total_frames(&self) -> usize {
	self.frames.len()
    }

    pub fn frame(&self, frame: FrameId) -> Option<&Frame> {
	self.frames.get(frame)
    }

    pub fn page_table(&self, process: ProcessId) -> Option<&PageTable> {
	self.page_tables.get(&process)
    }

    /// Processes with a page table, ascending.
    pub fn processes(&self) -> impl Iterator<Item = ProcessId> + '_ {
	self.page_tables.keys().copied()
    }

    /// Frame currently holding `page` of `process`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - if the page is not resident (a fault);
    /// * `Err(..)`  - if the process is unknown or `page` is past the end of its page table;
    pub fn resident(&self, process: ProcessId, page: PageNumber) -> Result<Option<FrameId>, SimError> {
	Ok(self.entry(process, page)?.frame_number)
    }

    pub fn disk_address(&self, process: ProcessId, page: PageNumber) -> Result<Address, SimError> {
	Ok(self.entry(process, page)?.disk_address)
    }

    /// First free frame by lowest index.
    pub fn find_free_frame(&self) -> Option<FrameId> {
	self.frames.iter().position(|f| f.owner.is_none())
    }

    pub fn free_count(&self) -> usize {
	self.frames.iter().filter(|f| f.owner.is_none()).count()
    }

    pub fn owned_count(&self) -> usize {
	self.frames.len() - self.free_count()
    }

    /// Frames owned by `process`, ascending.
    pub fn frames_of(&self, process: ProcessId) -> Vec<FrameId> {
	self.frames
	    .iter()
	    .enumerate()
	    .filter(|(_, f)| matches!(f.owner, Some((p, _)) if p == process))
	    .map(|(id, _)| id)
	    .collect()
    }

    pub fn owned_by(&self, process: ProcessId) -> usize {
	self.frames
	    .iter()
	    .filter(|f| matches!(f.owner, Some((p, _)) if p == process))
	    .count()
    }

    /// Places `page` of `process` into the free `frame`. The placement counts as one access.
    pub fn assign(&mut self, process: ProcessId, page: PageNumber, frame: FrameId) -> Result<(), SimError> {
	let total_frames = self.frames.len();
	let disk_address = {
	    let entry = self.entry(process, page)?;
	    if let Some(current) = entry.frame_number {
		return Err(SimError::Inconsistent {
		    frame: current,
		    detail: format!("process {} page {} is already resident", process, page),
		});
	    }
	    entry.disk_address
	};

	let slot = self.frames
	    .get_mut(frame)
	    .ok_or(SimError::FrameOutOfRange { process, frame, total_frames })?;
	if let Some(owner) = slot.owner {
	    return Err(SimError::FrameNotFree { frame, owner });
	}
	*slot = Frame {
	    owner: Some((process, page)),
	    access_count: 1,
	    last_disk_address: Some(disk_address),
	};

	if let Some(entry) = self.entry_mut(process, page) {
	    entry.frame_number = Some(frame);
	}
	debug!("[RAM] Assigned frame {} to process {} page {}", frame, process, page);
	Ok(())
    }

    /// Releases `frame` and invalidates the page table entry that pointed at it.
    ///
    /// # Returns
    ///
    /// * The `(process, page)` that owned the frame.
    pub fn evict(&mut self, frame: FrameId) -> Result<(ProcessId, PageNumber), SimError> {
	let (process, page) = self.frames
	    .get(frame)
	    .and_then(|slot| slot.owner)
	    .ok_or(SimError::FrameNotOwned { frame })?;

	// Both sides change only once the mapping is known to agree.
	match self.entry_mut(process, page) {
	    Some(entry) if entry.frame_number == Some(frame) => {
		entry.frame_number = None;
	    },
	    _ => {
		return Err(SimError::Inconsistent {
		    frame,
		    detail: format!("owner process {} page {} does not map it", process, page),
		});
	    },
	}
	if let Some(slot) = self.frames.get_mut(frame) {
	    slot.owner = None;
	    slot.access_count = 0;
	}

	debug!("[RAM] Evicted frame {} (process {} page {})", frame, process, page);
	Ok((process, page))
    }

    /// Counts a hit on `frame`.
    pub fn touch(&mut self, frame: FrameId) {
	if let Some(slot) = self.frames.get_mut(frame) {
	    slot.access_count += 1;
	}
    }

    /// Returns every frame of `process` to the free pool.
    ///
    /// # Returns
    ///
    /// * The frames released, ascending.
    pub fn release_process(&mut self, process: ProcessId) -> Result<Vec<FrameId>, SimError> {
	let frames = self.frames_of(process);
	for &frame in frames.iter() {
	    self.evict(frame)?;
	}
	Ok(frames)
    }

    /// Verifies that owned frames and resident page table entries match one to one.
    pub fn check_invariants(&self) -> Result<(), SimError> {
	let mut mapped: Vec<Option<(ProcessId, PageNumber)>> = vec![None; self.frames.len()];

	for (&process, table) in self.page_tables.iter() {
	    for (page, entry) in table.entries.iter().enumerate() {
		let Some(frame) = entry.frame_number else { continue };
		let slot = mapped.get_mut(frame).ok_or(SimError::FrameOutOfRange {
		    process,
		    frame,
		    total_frames: self.frames.len(),
		})?;
		if let Some(other) = slot {
		    return Err(SimError::Inconsistent {
			frame,
			detail: format!(
			    "mapped by process {} page {} and process {} page {}",
			    other.0, other.1, process, page,
			),
		    });
		}
		*slot = Some((process, page));
	    }
	}

	for (frame, (slot, expected)) in self.frames.iter().zip(mapped.iter()).enumerate() {
	    if slot.owner != *expected {
		return Err(SimError::Inconsistent {
		    frame,
		    detail: format!("owner {:?} but page tables say {:?}", slot.owner, expected),
		});
	    }
	}

	if self.free_count() + self.owned_count() != self.frames.len() {
	    return Err(SimError::Inconsistent {
		frame: self.frames.len(),
		detail: "free and owned frames do not add up".to_string(),
	    });
	}

	Ok(())
    }

    fn entry(&self, process: ProcessId, page: PageNumber) -> Result<&PageTableEntry, SimError> {
	let table = self.page_tables
	    .get(&process)
	    .ok_or(SimError::UnknownProcess { process })?;
	table.entry(page).ok_or(SimError::PageOutOfRange {
	    process,
	    address: 0,
	    page,
	    page_count: table.len(),
	})
    }

    fn entry_mut(&mut self, process: ProcessId, page: PageNumber) -> Option<&mut PageTableEntry> {
	self.page_tables.get_mut(&process)?.entry_mut(page)
    }
}
