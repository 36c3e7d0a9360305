//! Workload output parsing.
//!
//! Small utilities for pulling metrics out of workload output files after a
//! run. Matching is line oriented.

use crate::error::DriverError;
use crate::process;
use crate::workload::Workload;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Scan `output_file` line by line and return the requested capture group of
/// the first matching line, parsed as a float. Lines that match but fail to
/// parse are skipped.
pub fn parse_output_float(
    output_file: &Path,
    pattern: &str,
    group: usize,
) -> Result<f64, DriverError> {
    if !output_file.exists() {
        return Err(DriverError::OutputMissing(output_file.to_path_buf()));
    }

    let re = Regex::new(pattern)?;
    let reader = BufReader::new(File::open(output_file)?);
    for line in reader.lines() {
        let line = line?;
        if let Some(caps) = re.captures(line.trim_end()) {
            if let Some(m) = caps.get(group) {
                if let Ok(value) = m.as_str().parse::<f64>() {
                    return Ok(value);
                }
            }
        }
    }

    Err(DriverError::PatternNotFound {
        pattern: pattern.to_string(),
        file: output_file.to_path_buf(),
    })
}

/// Elapsed wall-clock seconds reported by a cleanly-exited workload, read
/// from its canonical `elapsed_secs:` output line.
pub fn parse_elapsed(workload: &Workload) -> Result<f64, DriverError> {
    let status = workload
        .exit_status()
        .ok_or_else(|| DriverError::NotLaunched(workload.canonical_name()))?;
    if !status.success() {
        return Err(DriverError::WorkloadFailed {
            name: workload.canonical_name(),
            status: process::describe_status(status),
        });
    }
    let output = workload
        .output_file()
        .ok_or_else(|| DriverError::NotLaunched(workload.canonical_name()))?;
    parse_output_float(output, r"^elapsed_secs: ([0-9.]+)", 1)
}
