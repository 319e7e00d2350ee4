use regex::Regex;

/// One progress reading scraped from a line of compressor output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// First figure on the line; informational only
    pub chunk_kb: u64,

    /// Cumulative amount of input processed so far, in KiB
    pub current_kb: u64,

    /// Instantaneous throughput in KiB per second
    pub speed_kbps: u64,
}

/// Scrapes progress readings out of free-form compressor output.
///
/// MCM reports progress with lines such as:
///
/// ```text
/// 12345KB -> 6789KB 100KB/s
/// ```
///
/// The pattern may be surrounded by arbitrary text. Lines without it are plain
/// diagnostics; a miss is never an error.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    /// Regex for `<int>KB -> <int>KB <int>KB/s`
    progress_pattern: Regex,
}

impl ProgressParser {
    /// Create a new parser with the progress pattern compiled
    pub fn new() -> Self {
        Self {
            progress_pattern: Regex::new(r"(\d+)KB -> (\d+)KB (\d+)KB/s")
                .expect("Invalid progress regex"),
        }
    }

    /// Extract a progress sample from one output line, if it carries one
    pub fn parse_line(&self, line: &str) -> Option<ProgressSample> {
        let captures = self.progress_pattern.captures(line.trim())?;

        // Figures too large for u64 are treated as garbled output
        let chunk_kb = captures[1].parse().ok()?;
        let current_kb = captures[2].parse().ok()?;
        let speed_kbps = captures[3].parse().ok()?;

        Some(ProgressSample {
            chunk_kb,
            current_kb,
            speed_kbps,
        })
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new()
    }
}
