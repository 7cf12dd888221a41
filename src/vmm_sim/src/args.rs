//==================================================================================================
// Imports
//==================================================================================================
use ::anyhow::{
    Context,
    Result,
};
use disk_lib::DiskPolicy;
use replacer_lib::Replacement;

//==================================================================================================
// Enum
//==================================================================================================
/// Where the workload comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    ConfigFile(String),
    Synthetic {
	seed: u64,
    },
}

//==================================================================================================
// Structures
//==================================================================================================
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Args{
    /// Configuration file or synthetic seed
    source: Source,
    /// Run the policy pairs in parallel
    concurrent: bool,
    /// Restricts the sweep to one disk policy
    disk: Option<DiskPolicy>,
    /// Restricts the sweep to one replacement policy
    replacement: Option<Replacement>,
    /// Shape of a synthetic workload: processes, references and pages per process
    num_processes: usize,
    num_references: usize,
    num_pages: usize,
}

//==================================================================================================
// Implementation
//==================================================================================================
impl Args {
    const OPT_HELP: &'static str = "--help";
    const OPT_CONFIG: &'static str = "--config";
    const OPT_SYNTHETIC: &'static str = "--synthetic";
    const OPT_CONCURRENT: &'static str = "--concurrent";
    const OPT_DISK: &'static str = "--disk";
    const OPT_REPLACEMENT: &'static str = "--replacement";
    const OPT_PROCESSES: &'static str = "--processes";
    const OPT_REFERENCES: &'static str = "--references";
    const OPT_PAGES: &'static str = "--pages";

    /// Parses the command line. `Ok(None)` means help was requested.
    pub fn parse(args: Vec<String>) -> Result<Option<Self>> {
	let program = args.first().map(String::as_str).unwrap_or("vmm_sim");
	let mut source: Option<Source> = None;
	let mut concurrent = false;
	let mut disk = None;
	let mut replacement = None;
	let mut num_processes: usize = 4;
	let mut num_references: usize = 200;
	let mut num_pages: usize = 16;

	let mut i: usize = 1;
	while i < args.len() {
	    match args[i].as_str() {
		Self::OPT_HELP => {
		    Self::usage(program);
		    return Ok(None);
		}
		Self::OPT_CONCURRENT => {
		    concurrent = true;
		}
		Self::OPT_CONFIG => {
		    i += 1;
		    source = Some(Source::ConfigFile(Self::value(&args, i)?.to_string()));
		}
		Self::OPT_SYNTHETIC => {
		    i += 1;
		    let seed = Self::value(&args, i)?
			.parse::<u64>()
			.context("seed must be an unsigned integer")?;
		    source = Some(Source::Synthetic { seed });
		}
		Self::OPT_DISK => {
		    i += 1;
		    disk = Some(Self::value(&args, i)?.parse::<DiskPolicy>().map_err(anyhow::Error::msg)?);
		}
		Self::OPT_REPLACEMENT => {
		    i += 1;
		    replacement = Some(Self::value(&args, i)?.parse::<Replacement>().map_err(anyhow::Error::msg)?);
		}
		Self::OPT_PROCESSES => {
		    i += 1;
		    num_processes = Self::value(&args, i)?.parse::<usize>().context("invalid process count")?;
		}
		Self::OPT_REFERENCES => {
		    i += 1;
		    num_references = Self::value(&args, i)?.parse::<usize>().context("invalid reference count")?;
		}
		Self::OPT_PAGES => {
		    i += 1;
		    num_pages = Self::value(&args, i)?.parse::<usize>().context("invalid page count")?;
		}
		other => {
		    return Err(anyhow::anyhow!("invalid argument: {}", other));
		}
	    }

	    i += 1;
	}

	let source = source.ok_or_else(|| {
	    Self::usage(program);
	    anyhow::anyhow!("either {} or {} is required", Self::OPT_CONFIG, Self::OPT_SYNTHETIC)
	})?;
	if num_processes == 0 || num_pages == 0 {
	    return Err(anyhow::anyhow!("synthetic workloads need at least one process and one page"));
	}

	Ok(Some(Self {
	    source,
	    concurrent,
	    disk,
	    replacement,
	    num_processes,
	    num_references,
	    num_pages,
	}))
    }

    pub fn usage(program_name: &str) {
	println!(
	    "Usage: {} ({} <file> | {} <seed> [{} <n> {} <n> {} <n>]) [{}] [{} <FIFO|SSTF|SCAN>] [{} <LIFO|LRU|MRU|LFU|OPT|WS>]",
	    program_name,
	    Self::OPT_CONFIG,
	    Self::OPT_SYNTHETIC,
	    Self::OPT_PROCESSES,
	    Self::OPT_REFERENCES,
	    Self::OPT_PAGES,
	    Self::OPT_CONCURRENT,
	    Self::OPT_DISK,
	    Self::OPT_REPLACEMENT,
	);
    }

    fn value(args: &[String], i: usize) -> Result<&str> {
	args.get(i)
	    .map(String::as_str)
	    .ok_or_else(|| anyhow::anyhow!("missing value for {}", args[i - 1]))
    }

    pub fn source(&self) -> &Source {
	&self.source
    }

    pub fn concurrent(&self) -> bool {
	self.concurrent
    }

    pub fn disk(&self) -> Option<DiskPolicy> {
	self.disk
    }

    pub fn replacement(&self) -> Option<Replacement> {
	self.replacement
    }

    pub fn number_of_processes(&self) -> usize {
	self.num_processes
    }

    pub fn number_of_references(&self) -> usize {
	self.num_references
    }

    pub fn number_of_pages(&self) -> usize {
	self.num_pages
    }
}
