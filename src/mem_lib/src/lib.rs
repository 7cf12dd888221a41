//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Imports
//==================================================================================================
use std::fmt;

//==================================================================================================
// Aliases
//==================================================================================================
pub type ProcessId = u32;
pub type PageNumber = usize;
pub type FrameId = usize;
/// Virtual addresses and disk tracks share the same integer domain.
pub type Address = u64;

//==================================================================================================
// Structures
//==================================================================================================
/// Represents a single memory reference issued by a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reference
{
    process		: ProcessId,
    virtual_address	: Address,
}

//==================================================================================================
// Enum
//==================================================================================================
/// Fatal conditions of a simulation run. None of these are recoverable: the run that raised one
/// is aborted and its statistics are discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimError {
    /// A reference maps past the end of the process' page table.
    PageOutOfRange {
	process: ProcessId,
	address: Address,
	page: PageNumber,
	page_count: usize,
    },
    /// A frame index outside the frame table.
    FrameOutOfRange {
	process: ProcessId,
	frame: FrameId,
	total_frames: usize,
    },
    /// The replacement policy was asked for a victim but the process owns no frame.
    NoVictim {
	process: ProcessId,
	policy: &'static str,
    },
    /// `assign` on a frame that is still owned.
    FrameNotFree {
	frame: FrameId,
	owner: (ProcessId, PageNumber),
    },
    /// `evict` on a frame that is already free.
    FrameNotOwned {
	frame: FrameId,
    },
    UnknownProcess {
	process: ProcessId,
    },
    /// A reference index past the end of the process' trace.
    TraceExhausted {
	process: ProcessId,
	index: usize,
    },
    DiskQueueFull {
	process: ProcessId,
	capacity: usize,
    },
    /// Frame table and page tables disagree.
    Inconsistent {
	frame: FrameId,
	detail: String,
    },
}

//==================================================================================================
// Implementations
//==================================================================================================
impl Reference {
    pub fn new (
	process: ProcessId,
	virtual_address: Address,
    ) -> Self {
	Self {
	    process,
	    virtual_address,
	}
    }

    pub fn reference_process(&self) -> ProcessId {
	self.process
    }

    pub fn reference_virtual_address(&self) -> Address {
	self.virtual_address
    }

    /// Page holding this reference (`virtual_address / page_size`).
    pub fn page_number(&self, page_size: u64) -> PageNumber {
	page_number_of(self.virtual_address, page_size)
    }
}

/// Integer division of an address by the page size.
///
/// # Panics
///
/// * If `page_size` is zero. Configurations are validated before any address is translated.
pub fn page_number_of(virtual_address: Address, page_size: u64) -> PageNumber {
    (virtual_address / page_size) as PageNumber
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    SimError::PageOutOfRange { process, address, page, page_count } => write!(
		f,
		"process {} referenced address {:#x} (page {}) but only declares {} pages",
		process, address, page, page_count,
	    ),
	    SimError::FrameOutOfRange { process, frame, total_frames } => write!(
		f,
		"disk request of process {} targets frame {} outside a table of {} frames",
		process, frame, total_frames,
	    ),
	    SimError::NoVictim { process, policy } => write!(
		f,
		"{} has no victim: process {} owns no frame",
		policy, process,
	    ),
	    SimError::FrameNotFree { frame, owner } => write!(
		f,
		"frame {} is still owned by process {} page {}",
		frame, owner.0, owner.1,
	    ),
	    SimError::FrameNotOwned { frame } => write!(f, "frame {} is not owned", frame),
	    SimError::UnknownProcess { process } => write!(f, "unknown process {}", process),
	    SimError::TraceExhausted { process, index } => write!(
		f,
		"process {} has no reference #{}",
		process, index,
	    ),
	    SimError::DiskQueueFull { process, capacity } => write!(
		f,
		"disk queue full ({} requests) while serving process {}",
		capacity, process,
	    ),
	    SimError::Inconsistent { frame, detail } => write!(
		f,
		"frame {} inconsistent: {}",
		frame, detail,
	    ),
	}
    }
}

impl std::error::Error for SimError {}
