//==================================================================================================
// Configuration
//==================================================================================================
#![deny(clippy::all)]

//==================================================================================================
// Imports
//==================================================================================================
use mem_lib::{
    page_number_of,
    Address,
    PageNumber,
    ProcessId,
    Reference,
};
use log::debug;

//==================================================================================================
// Structures
//==================================================================================================
/// Represents a Process of the workload: its address space on disk and the trace it replays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process
{
    /// Process unique identifier (private field)
    pid			: ProcessId,
    /// Disk track holding each page, indexed by page number (private field)
    disk_addresses	: Vec<Address>,
    /// Ordered virtual addresses referenced by the process (private field)
    references		: Vec<Address>,
}

/// The static input of a simulation: every process, kept sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload
{
    processes		: Vec<Process>,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl Process
{
    /// Creates a new Process instance.
    ///
    /// # Arguments
    /// * `pid`            - The unique identifier of a Process;
    /// * `disk_addresses` - The disk track of every page, its length is the page count;
    /// * `references`     - The virtual addresses referenced, in order;
    ///
    /// # Returns
    /// * A new `Process` instance
    pub fn new(pid: ProcessId, disk_addresses: Vec<Address>, references: Vec<Address>) -> Self
    {
	debug!(
	    "Creating Process ({}) with {} pages and {} references",
	    pid,
	    disk_addresses.len(),
	    references.len(),
	);

	Self {
	    pid,
	    disk_addresses,
	    references,
	}
    }

    /// Returns Process' `pid`
    pub fn process_pid(&self) -> ProcessId
    {
	self.pid
    }

    /// Returns the declared number of pages (fixed length of the page table).
    pub fn process_page_count(&self) -> usize
    {
	self.disk_addresses.len()
    }

    pub fn process_disk_addresses(&self) -> &[Address]
    {
	&self.disk_addresses
    }

    /// Returns the disk track of `page`, if the page is declared.
    pub fn process_disk_address(&self, page: PageNumber) -> Option<Address>
    {
	self.disk_addresses.get(page).copied()
    }

    pub fn process_references(&self) -> &[Address]
    {
	&self.references
    }

    /// Returns the `index`-th reference of the trace.
    pub fn process_reference(&self, index: usize) -> Option<Reference>
    {
	self.references
	    .get(index)
	    .map(|&address| Reference::new(self.pid, address))
    }

    /// Returns the pages referenced right after `index`, at most `window` of them.
    ///
    /// # Arguments
    /// * `index`     - Position of the current reference; it is not part of the result;
    /// * `window`    - How many future references are visible;
    /// * `page_size` - Page size used to map addresses to pages;
    pub fn process_upcoming_pages(&self, index: usize, window: usize, page_size: u64) -> Vec<PageNumber>
    {
	self.references
	    .iter()
	    .skip(index + 1)
	    .take(window)
	    .map(|&address| page_number_of(address, page_size))
	    .collect()
    }
}

impl Workload
{
    pub fn new(mut processes: Vec<Process>) -> Self
    {
	processes.sort_by_key(|p| p.pid);
	Self { processes }
    }

    pub fn workload_processes(&self) -> &[Process]
    {
	&self.processes
    }

    pub fn workload_process(&self, pid: ProcessId) -> Option<&Process>
    {
	self.processes
	    .binary_search_by_key(&pid, |p| p.pid)
	    .ok()
	    .map(|idx| &self.processes[idx])
    }

    /// Total number of references over every process.
    pub fn workload_total_references(&self) -> usize
    {
	self.processes.iter().map(|p| p.references.len()).sum()
    }

    pub fn is_empty(&self) -> bool
    {
	self.processes.is_empty()
    }

    pub fn len(&self) -> usize
    {
	self.processes.len()
    }
}
