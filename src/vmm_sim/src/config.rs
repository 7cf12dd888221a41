//==================================================================================================
// Imports
//==================================================================================================
use ::anyhow::{
    Context,
    Result,
};
use mem_lib::{
    Address,
    ProcessId,
};
use task_lib::{
    Process,
    Workload,
};
use vm_lib::SimConfig;
use std::{
    collections::BTreeMap,
    path::Path,
};
use log::{
    debug,
    warn,
};

//==================================================================================================
// Structures
//==================================================================================================
/// Process being described while the file is read.
#[derive(Default)]
struct ProcessDraft {
    tracks: Vec<Option<Address>>,
    references: Vec<Address>,
}

/// Raw scalars as they appear in the file, before defaults are applied.
#[derive(Default)]
struct Scalars {
    values: BTreeMap<&'static str, u64>,
}

//==================================================================================================
// Implementations
//==================================================================================================
impl Scalars {
    const KEYS: [&'static str; 10] = ["tp", "ps", "r", "X", "min", "max", "k", "maxtrack", "y", "delta"];

    fn set(&mut self, key: &str, value: u64) -> bool {
	match Self::KEYS.iter().find(|&&k| k == key) {
	    Some(&k) => {
		debug!("Configuration: {} = {}", k, value);
		self.values.insert(k, value);
		true
	    },
	    None => false,
	}
    }

    fn required(&self, key: &str) -> Result<u64> {
	self.values
	    .get(key)
	    .copied()
	    .ok_or_else(|| anyhow::anyhow!("missing configuration key '{}'", key))
    }

    fn required_usize(&self, key: &str) -> Result<usize> {
	usize::try_from(self.required(key)?).with_context(|| format!("'{}' is too large", key))
    }

    fn into_config(self) -> Result<SimConfig> {
	let frames_per_process = self.required_usize("r")?;
	let working_set_window = match self.values.get("delta") {
	    Some(&delta) => usize::try_from(delta).context("'delta' is too large")?,
	    None => frames_per_process,
	};

	Ok(SimConfig {
	    total_frames: self.required_usize("tp")?,
	    page_size: self.required("ps")?,
	    frames_per_process,
	    lookahead: self.required_usize("X")?,
	    min_free_pool: self.required_usize("min")?,
	    max_free_pool: self.required_usize("max")?,
	    process_count: self.required_usize("k")?,
	    max_disk_track: self.required("maxtrack")?,
	    disk_queue_capacity: self.required_usize("y")?,
	    working_set_window,
	})
    }
}

/// Reads and parses a configuration file.
pub fn load(path: &Path) -> Result<(SimConfig, Workload)> {
    let text = std::fs::read_to_string(path)
	.with_context(|| format!("failed to read {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid configuration {}", path.display()))
}

/// Parses the text of a configuration file.
///
/// Scalars are `key value` lines. `pidN <count>` is followed by `<count>` lines of
/// `page track`, `pidN 0x<hex>` appends one reference and `pidN -1` closes the process.
pub fn parse(text: &str) -> Result<(SimConfig, Workload)> {
    let mut scalars = Scalars::default();
    let mut drafts: BTreeMap<ProcessId, ProcessDraft> = BTreeMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((number, raw)) = lines.next() {
	let line = raw.trim();
	if line.is_empty() || line.starts_with('/') || line.starts_with('*') || line.starts_with('#') {
	    continue;
	}
	let at = || format!("line {}: '{}'", number + 1, line);

	let mut tokens = line.split_whitespace();
	let key = tokens.next().unwrap_or_default();
	let value = tokens.next().ok_or_else(|| anyhow::anyhow!("missing value")).with_context(at)?;

	if let Some(pid) = key.strip_prefix("pid") {
	    let pid: ProcessId = pid.parse().with_context(|| format!("invalid process id in {}", at()))?;

	    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		let address = u64::from_str_radix(hex, 16).with_context(|| format!("invalid address in {}", at()))?;
		let draft = drafts
		    .get_mut(&pid)
		    .ok_or_else(|| anyhow::anyhow!("process {} referenced before it was declared", pid))
		    .with_context(at)?;
		draft.references.push(address);
		continue;
	    }

	    let count: i64 = value.parse().with_context(|| format!("invalid page count in {}", at()))?;
	    if count == -1 {
		debug!("End of data for process {}", pid);
		continue;
	    }
	    let count = usize::try_from(count).with_context(|| format!("negative page count in {}", at()))?;
	    if drafts.contains_key(&pid) {
		return Err(anyhow::anyhow!("process {} declared twice", pid)).with_context(at);
	    }

	    let mut draft = ProcessDraft { tracks: vec![None; count], references: Vec::new() };
	    for _ in 0..count {
		let (number, raw) = lines
		    .next()
		    .ok_or_else(|| anyhow::anyhow!("process {} ends before its {} pages", pid, count))?;
		let entry = || format!("line {}: '{}'", number + 1, raw.trim());
		let mut fields = raw.split_whitespace().map(str::parse::<u64>);
		let (Some(Ok(page)), Some(Ok(track))) = (fields.next(), fields.next()) else {
		    return Err(anyhow::anyhow!("expected '<page> <track>'")).with_context(entry);
		};
		let slot = usize::try_from(page)
		    .ok()
		    .and_then(|page| draft.tracks.get_mut(page))
		    .ok_or_else(|| anyhow::anyhow!("page {} outside the {} pages of process {}", page, count, pid))
		    .with_context(entry)?;
		*slot = Some(track);
	    }
	    drafts.insert(pid, draft);
	    continue;
	}

	let value: u64 = value.parse().with_context(|| format!("invalid value in {}", at()))?;
	if !scalars.set(key, value) {
	    return Err(anyhow::anyhow!("unknown configuration key '{}'", key)).with_context(at);
	}
    }

    let config = scalars.into_config()?;
    let mut processes = Vec::with_capacity(drafts.len());
    for (pid, draft) in drafts {
	let mut tracks = Vec::with_capacity(draft.tracks.len());
	for (page, track) in draft.tracks.into_iter().enumerate() {
	    let track = track.ok_or_else(|| anyhow::anyhow!("process {} page {} has no disk track", pid, page))?;
	    if track > config.max_disk_track {
		return Err(anyhow::anyhow!(
		    "process {} page {} sits on track {} beyond maxtrack {}",
		    pid,
		    page,
		    track,
		    config.max_disk_track,
		));
	    }
	    tracks.push(track);
	}
	if draft.references.is_empty() {
	    warn!("Process {} has no references", pid);
	}
	processes.push(Process::new(pid, tracks, draft.references));
    }

    if processes.len() != config.process_count {
	return Err(anyhow::anyhow!(
	    "k declares {} processes but {} were described",
	    config.process_count,
	    processes.len(),
	));
    }

    Ok((config, Workload::new(processes)))
}
