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
    SimError,
};
use ram_lib::Memory;
use log::debug;
use std::{
    collections::{
	BTreeMap,
	VecDeque,
    },
    fmt,
    str::FromStr,
};

//==================================================================================================
// Enum
//==================================================================================================
/// Page replacement strategies compared by the sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Replacement {
    Lifo,
    Lru,
    Mru,
    Lfu,
    /// Bounded lookahead over the process' own trace.
    Opt,
    WorkingSet,
}

//==================================================================================================
// Structures
//==================================================================================================
/// Auxiliary state of the active replacement policy for one run.
///
/// Ticks come from a run-wide logical clock advanced on every access, so "oldest" and "newest"
/// are well defined without wall-clock time.
#[derive(Clone, Debug)]
pub struct PolicyState {
    replacement		: Replacement,
    lookahead		: usize,
    window		: usize,

    clock		: u64,
    // Per frame, 0 when the frame holds nothing
    last_access		: Vec<u64>,
    assigned_at		: Vec<u64>,

    // Trailing references of each process, at most `window` long
    history		: BTreeMap<ProcessId, VecDeque<PageNumber>>,
    ws_bounds		: BTreeMap<ProcessId, (u64, u64)>,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl Replacement {
    pub const ALL: [Replacement; 6] = [
	Replacement::Lifo,
	Replacement::Lru,
	Replacement::Mru,
	Replacement::Lfu,
	Replacement::Opt,
	Replacement::WorkingSet,
    ];

    pub fn name(&self) -> &'static str {
	match self {
	    Replacement::Lifo => "LIFO",
	    Replacement::Lru => "LRU",
	    Replacement::Mru => "MRU",
	    Replacement::Lfu => "LFU",
	    Replacement::Opt => "OPT",
	    Replacement::WorkingSet => "WS",
	}
    }
}

impl fmt::Display for Replacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	f.write_str(self.name())
    }
}

impl FromStr for Replacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
	Replacement::ALL
	    .iter()
	    .copied()
	    .find(|r| r.name().eq_ignore_ascii_case(s))
	    .ok_or(format!("invalid replacement policy: {}", s))
    }
}

impl PolicyState {
    /// Creates fresh state for one run.
    ///
    /// # Arguments
    /// * `replacement`  - The policy in charge of selecting victims;
    /// * `total_frames` - Size of the frame table;
    /// * `lookahead`    - Future references visible to `Opt` (X);
    /// * `window`       - Working set window (Δ);
    pub fn new(
	replacement	: Replacement,
	total_frames	: usize,
	lookahead	: usize,
	window		: usize,
    ) -> Self {
	debug!(
	    "Creating {} policy state ({} frames, X = {}, delta = {})",
	    replacement,
	    total_frames,
	    lookahead,
	    window,
	);

	Self {
	    replacement,
	    lookahead,
	    window,
	    clock: 0,
	    last_access: vec![0; total_frames],
	    assigned_at: vec![0; total_frames],
	    history: BTreeMap::new(),
	    ws_bounds: BTreeMap::new(),
	}
    }

    pub fn replacement(&self) -> Replacement {
	self.replacement
    }

    /// Number of future references the policy wants to see when choosing a victim.
    pub fn lookahead(&self) -> usize {
	match self.replacement {
	    Replacement::Opt => self.lookahead,
	    _ => 0,
	}
    }

    /// Records that `process` referenced `page`, before the reference is resolved. Feeds the
    /// working set window and its (min, max) bounds.
    pub fn record_reference(&mut self, process: ProcessId, page: PageNumber) {
	if self.replacement != Replacement::WorkingSet {
	    return;
	}

	let history = self.history.entry(process).or_default();
	history.push_back(page);
	while history.len() > self.window {
	    history.pop_front();
	}

	let size = Self::distinct_pages(history) as u64;
	self.ws_bounds
	    .entry(process)
	    .and_modify(|(min, max)| {
		*min = (*min).min(size);
		*max = (*max).max(size);
	    })
	    .or_insert((size, size));
    }

    /// Called on every hit and every fresh placement of `frame`.
    pub fn on_access(&mut self, frame: FrameId) {
	self.clock += 1;
	if let Some(tick) = self.last_access.get_mut(frame) {
	    *tick = self.clock;
	}
    }

    /// Called once when `frame` receives a new page, before `on_access`.
    pub fn on_assign(&mut self, frame: FrameId) {
	if let Some(tick) = self.assigned_at.get_mut(frame) {
	    *tick = self.clock + 1;
	}
    }

    /// Called when `frame` loses its page.
    pub fn on_evict(&mut self, frame: FrameId) {
	if let Some(tick) = self.last_access.get_mut(frame) {
	    *tick = 0;
	}
	if let Some(tick) = self.assigned_at.get_mut(frame) {
	    *tick = 0;
	}
    }

    /// Called when `process` leaves the run.
    pub fn on_exit(&mut self, process: ProcessId, frames: &[FrameId]) {
	for &frame in frames {
	    self.on_evict(frame);
	}
	self.history.remove(&process);
    }

    /// Chooses the frame of `process` to evict.
    ///
    /// # Arguments
    /// * `process`  - The faulting process; only its frames are candidates;
    /// * `memory`   - Frame and page tables of the run;
    /// * `upcoming` - Pages the process references next (used by `Opt` only);
    ///
    /// # Returns
    ///
    /// * `Err(SimError::NoVictim)` - if the process owns no frame;
    pub fn select_victim(
	&self,
	process: ProcessId,
	memory: &Memory,
	upcoming: &[PageNumber],
    ) -> Result<FrameId, SimError> {
	// (frame, page), ascending frame id
	let candidates: Vec<(FrameId, PageNumber)> = memory
	    .frames_of(process)
	    .into_iter()
	    .filter_map(|frame| {
		memory.frame(frame)
		    .and_then(|f| f.owner)
		    .map(|(_, page)| (frame, page))
	    })
	    .collect();

	if candidates.is_empty() {
	    return Err(SimError::NoVictim { process, policy: self.replacement.name() });
	}

	let victim = match self.replacement {
	    Replacement::Lifo => {
		candidates.iter()
		    .map(|&(frame, _)| frame)
		    .max_by_key(|&frame| (self.assigned_at[frame], frame))
	    },
	    Replacement::Lru => self.least_recent(candidates.iter().map(|&(frame, _)| frame)),
	    Replacement::Mru => {
		candidates.iter()
		    .map(|&(frame, _)| frame)
		    .max_by_key(|&frame| (self.last_access[frame], frame))
	    },
	    Replacement::Lfu => {
		candidates.iter()
		    .map(|&(frame, _)| frame)
		    .min_by_key(|&frame| {
			let count = memory.frame(frame).map(|f| f.access_count).unwrap_or(0);
			(count, frame)
		    })
	    },
	    Replacement::Opt => Self::farthest_next_use(&candidates, upcoming),
	    Replacement::WorkingSet => {
		let recent = self.history.get(&process);
		let outside = candidates.iter()
		    .filter(|(_, page)| !recent.is_some_and(|h| h.contains(page)))
		    .map(|&(frame, _)| frame);
		self.least_recent(outside)
		    .or_else(|| self.least_recent(candidates.iter().map(|&(frame, _)| frame)))
	    },
	};

	let victim = victim.ok_or(SimError::NoVictim { process, policy: self.replacement.name() })?;
	debug!(
	    "[{}] Process {} victim frame {} among {:?}",
	    self.replacement,
	    process,
	    victim,
	    candidates,
	);
	Ok(victim)
    }

    /// Observed (min, max) working set size per process. Empty unless the policy is
    /// `WorkingSet`.
    pub fn working_set_bounds(&self) -> &BTreeMap<ProcessId, (u64, u64)> {
	&self.ws_bounds
    }

    fn least_recent(&self, frames: impl Iterator<Item = FrameId>) -> Option<FrameId> {
	frames.min_by_key(|&frame| (self.last_access[frame], frame))
    }

    fn farthest_next_use(candidates: &[(FrameId, PageNumber)], upcoming: &[PageNumber]) -> Option<FrameId> {
	// None sorts as "never", which beats any distance
	let next_use = |page: PageNumber| upcoming.iter().position(|&p| p == page);

	if let Some(&(frame, _)) = candidates.iter().find(|(_, page)| next_use(*page).is_none()) {
	    return Some(frame);
	}

	candidates.iter()
	    .map(|&(frame, page)| (frame, next_use(page).unwrap_or(usize::MAX)))
	    // lowest id wins ties: prefer larger distance, then smaller frame
	    .max_by_key(|&(frame, distance)| (distance, std::cmp::Reverse(frame)))
	    .map(|(frame, _)| frame)
    }

    fn distinct_pages(history: &VecDeque<PageNumber>) -> usize {
	let mut pages: Vec<PageNumber> = history.iter().copied().collect();
	pages.sort_unstable();
	pages.dedup();
	pages.len()
    }
}
