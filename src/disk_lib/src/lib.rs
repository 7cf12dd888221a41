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
use log::debug;
use std::{
    collections::VecDeque,
    fmt,
    str::FromStr,
};

//==================================================================================================
// Constants
//==================================================================================================
/// Linear seek model: cost of moving the head by one track.
pub const SEEK_TIME_PER_TRACK_MICROS: u64 = 100;

//==================================================================================================
// Enum
//==================================================================================================
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiskPolicy {
    Fifo,
    /// Shortest seek time first.
    Sstf,
    /// One ascending sweep, no reversal.
    Scan,
}

//==================================================================================================
// Structures
//==================================================================================================
/// A page fetch issued by the fault handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiskRequest {
    pub process		: ProcessId,
    pub page		: PageNumber,
    pub target_frame	: FrameId,
    pub disk_address	: Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServicedRequest {
    pub request		: DiskRequest,
    pub new_head	: Address,
    pub seek_distance	: u64,
}

/// Owns the pending queue and the head position of one run.
#[derive(Clone, Debug)]
pub struct DiskScheduler {
    policy		: DiskPolicy,
    // (arrival sequence, request)
    queue		: VecDeque<(u64, DiskRequest)>,
    capacity		: usize,
    total_frames	: usize,
    next_seq		: u64,

    head		: Address,
    seek_distance	: u64,
    seek_operations	: u64,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl DiskPolicy {
    pub const ALL: [DiskPolicy; 3] = [
	DiskPolicy::Fifo,
	DiskPolicy::Sstf,
	DiskPolicy::Scan,
    ];

    pub fn name(&self) -> &'static str {
	match self {
	    DiskPolicy::Fifo => "FIFO",
	    DiskPolicy::Sstf => "SSTF",
	    DiskPolicy::Scan => "SCAN",
	}
    }

    /// Position in `queue` of the request to service next from `head`.
    fn select(&self, queue: &VecDeque<(u64, DiskRequest)>, head: Address) -> Option<usize> {
	match self {
	    DiskPolicy::Fifo => {
		queue.iter()
		    .enumerate()
		    .min_by_key(|(_, (seq, _))| *seq)
		    .map(|(idx, _)| idx)
	    },
	    DiskPolicy::Sstf => {
		queue.iter()
		    .enumerate()
		    .min_by_key(|(_, (seq, r))| (r.disk_address.abs_diff(head), *seq))
		    .map(|(idx, _)| idx)
	    },
	    DiskPolicy::Scan => {
		queue.iter()
		    .enumerate()
		    .min_by_key(|(_, (seq, r))| (r.disk_address, *seq))
		    .map(|(idx, _)| idx)
	    },
	}
    }
}

impl fmt::Display for DiskPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	f.write_str(self.name())
    }
}

impl FromStr for DiskPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
	DiskPolicy::ALL
	    .iter()
	    .copied()
	    .find(|p| p.name().eq_ignore_ascii_case(s))
	    .ok_or(format!("invalid disk policy: {}", s))
    }
}

impl DiskScheduler {
    /// Creates an empty scheduler with the head parked at track 0.
    ///
    /// # Arguments
    /// * `policy`       - Ordering applied to the pending queue;
    /// * `capacity`     - Maximum pending requests;
    /// * `total_frames` - Size of the frame table, bounds `target_frame`;
    pub fn new(policy: DiskPolicy, capacity: usize, total_frames: usize) -> Self {
	debug!(
	    "[DISK] Creating {} scheduler (queue of {}, {} frames)",
	    policy,
	    capacity,
	    total_frames,
	);

	Self {
	    policy,
	    queue: VecDeque::with_capacity(capacity),
	    capacity,
	    total_frames,
	    next_seq: 0,
	    head: 0,
	    seek_distance: 0,
	    seek_operations: 0,
	}
    }

    pub fn with_head(mut self, head: Address) -> Self {
	self.head = head;
	self
    }

    pub fn enqueue(&mut self, request: DiskRequest) -> Result<(), SimError> {
	if request.target_frame >= self.total_frames {
	    return Err(SimError::FrameOutOfRange {
		process: request.process,
		frame: request.target_frame,
		total_frames: self.total_frames,
	    });
	}
	if self.queue.len() >= self.capacity {
	    return Err(SimError::DiskQueueFull {
		process: request.process,
		capacity: self.capacity,
	    });
	}

	self.queue.push_back((self.next_seq, request));
	self.next_seq += 1;
	Ok(())
    }

    /// Services the request the policy picks from the current head, moving the head onto it.
    pub fn service_next(&mut self) -> Option<ServicedRequest> {
	let idx = self.policy.select(&self.queue, self.head)?;
	let (_, request) = self.queue.remove(idx)?;

	let seek_distance = request.disk_address.abs_diff(self.head);
	debug!(
	    "[DISK] {} process {} page {} -> frame {}: track {} to {} ({} tracks)",
	    self.policy,
	    request.process,
	    request.page,
	    request.target_frame,
	    self.head,
	    request.disk_address,
	    seek_distance,
	);
	self.head = request.disk_address;
	self.seek_distance += seek_distance;
	self.seek_operations += 1;

	Some(ServicedRequest {
	    request,
	    new_head: self.head,
	    seek_distance,
	})
    }

    /// Drains the queue in policy order.
    pub fn run_all(&mut self) -> Vec<ServicedRequest> {
	let mut serviced = Vec::with_capacity(self.queue.len());
	while let Some(done) = self.service_next() {
	    serviced.push(done);
	}
	serviced
    }

    pub fn policy(&self) -> DiskPolicy {
	self.policy
    }

    pub fn head(&self) -> Address {
	self.head
    }

    pub fn pending(&self) -> usize {
	self.queue.len()
    }

    pub fn total_seek_distance(&self) -> u64 {
	self.seek_distance
    }

    pub fn seek_operations(&self) -> u64 {
	self.seek_operations
    }
}

//==================================================================================================
// Tests
//==================================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn request(frame: FrameId, track: Address) -> DiskRequest {
	DiskRequest {
	    process: 1,
	    page: frame,
	    target_frame: frame,
	    disk_address: track,
	}
    }

    fn scheduler(policy: DiskPolicy, head: Address, tracks: &[Address]) -> DiskScheduler {
	let mut disk = DiskScheduler::new(policy, tracks.len(), tracks.len()).with_head(head);
	for (frame, &track) in tracks.iter().enumerate() {
	    disk.enqueue(request(frame, track)).unwrap();
	}
	disk
    }

    fn serviced_tracks(serviced: &[ServicedRequest]) -> Vec<Address> {
	serviced.iter().map(|s| s.request.disk_address).collect()
    }

    #[test]
    fn fifo_keeps_arrival_order() {
	let mut disk = scheduler(DiskPolicy::Fifo, 0, &[30, 10, 20, 10]);
	let serviced = disk.run_all();
	assert_eq!(serviced_tracks(&serviced), vec![30, 10, 20, 10]);
	assert_eq!(disk.total_seek_distance(), 30 + 20 + 10 + 10);
	assert_eq!(disk.seek_operations(), 4);
	assert_eq!(disk.pending(), 0);
    }

    #[test]
    fn sstf_nearest_first() {
	// |55-50| = 5, then from 55: |90-55| = 35 < |10-55| = 45
	let mut disk = scheduler(DiskPolicy::Sstf, 50, &[10, 90, 55]);
	let serviced = disk.run_all();
	assert_eq!(serviced_tracks(&serviced), vec![55, 90, 10]);
	assert_eq!(disk.total_seek_distance(), 5 + 35 + 80);
	assert_eq!(disk.head(), 10);
    }

    #[test]
    fn sstf_ties_go_to_earliest_arrival() {
	let mut disk = scheduler(DiskPolicy::Sstf, 50, &[60, 40]);
	let first = disk.service_next().map(|s| s.request.disk_address);
	assert_eq!(first, Some(60));
    }

    #[test]
    fn scan_is_non_decreasing() {
	let mut disk = scheduler(DiskPolicy::Scan, 70, &[90, 10, 55, 10, 200]);
	let tracks = serviced_tracks(&disk.run_all());
	assert_eq!(tracks, vec![10, 10, 55, 90, 200]);
	assert!(tracks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn service_reports_head_and_distance() {
	let mut disk = scheduler(DiskPolicy::Fifo, 5, &[12]);
	let done = disk.service_next();
	assert_eq!(done.map(|d| (d.new_head, d.seek_distance)), Some((12, 7)));
	assert!(disk.service_next().is_none());
    }

    #[test]
    fn enqueue_rejects_bad_requests() {
	let mut disk = DiskScheduler::new(DiskPolicy::Fifo, 1, 2);
	assert!(matches!(
	    disk.enqueue(request(2, 0)),
	    Err(SimError::FrameOutOfRange { frame: 2, total_frames: 2, .. }),
	));
	disk.enqueue(request(0, 0)).unwrap();
	assert_eq!(
	    disk.enqueue(request(1, 0)),
	    Err(SimError::DiskQueueFull { process: 1, capacity: 1 }),
	);
    }

    #[test]
    fn parse_names() {
	assert_eq!("sstf".parse::<DiskPolicy>(), Ok(DiskPolicy::Sstf));
	assert!("c-look".parse::<DiskPolicy>().is_err());
    }
}
