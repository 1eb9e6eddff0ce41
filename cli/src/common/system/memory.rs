//! # bucketzip Resource Report (`common::system::memory`)
//!
//! File: cli/src/common/system/memory.rs
//!
//! ## Overview
//!
//! This module makes the memory behaviour of the two pipelines observable.
//! `sample` reads the process-wide counters into a `ResourceSample`;
//! `MemoryReport` prints one CSV header and then one line per sample:
//!
//! ```text
//! #,Alloc,HeapAlloc,TotalAlloc,HeapObjects,Sys,NumGC
//! a.txt,14,14,96,0,9120,0
//! all.zip,15,15,113,0,9120,0
//! ```
//!
//! Every column except `NumGC` is divided by 1024. `Alloc` and `HeapAlloc`
//! are both the live heap bytes, `TotalAlloc` is the cumulative heap bytes,
//! `HeapObjects` the live allocation count, and `Sys` the virtual memory size
//! of the process as reported by `sysinfo`. Rust has no collector, so
//! `NumGC` is always 0; the column is kept so reports from both modes share
//! one schema.
//!
use super::alloc::heap_counters;
use std::io::Write;
use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;

/// Column names of the report, in output order.
pub const HEADER: [&str; 7] = ["#", "Alloc", "HeapAlloc", "TotalAlloc", "HeapObjects", "Sys", "NumGC"];

/// One set of memory counters, tagged with what was just processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSample {
    pub label: String,
    pub allocated_bytes: u64,
    pub heap_allocated_bytes: u64,
    pub cumulative_allocated_bytes: u64,
    pub live_heap_objects: u64,
    pub system_reserved_bytes: u64,
    pub gc_cycles: u32,
}

impl ResourceSample {
    /// Formats the sample as one report line (without newline).
    pub fn to_csv(&self) -> String {
        [
            self.label.clone(),
            to_kib(self.allocated_bytes),
            to_kib(self.heap_allocated_bytes),
            to_kib(self.cumulative_allocated_bytes),
            to_kib(self.live_heap_objects),
            to_kib(self.system_reserved_bytes),
            self.gc_cycles.to_string(),
        ]
        .join(",")
    }
}

fn to_kib(value: u64) -> String {
    (value / 1024).to_string()
}

/// Virtual memory size of this process, 0 if it cannot be inspected.
fn process_virtual_memory() -> u64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0;
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .map(|process| process.virtual_memory())
        .unwrap_or(0)
}

/// Samples the current process memory counters.
pub fn sample(label: &str) -> ResourceSample {
    let heap = heap_counters();
    ResourceSample {
        label: label.to_string(),
        allocated_bytes: heap.live_bytes,
        heap_allocated_bytes: heap.live_bytes,
        cumulative_allocated_bytes: heap.total_bytes,
        live_heap_objects: heap.live_allocs,
        system_reserved_bytes: process_virtual_memory(),
        gc_cycles: 0,
    }
}

/// # Memory Report (`MemoryReport`)
///
/// Writes the header once and one line per `snapshot` to `out` (stdout in
/// the binary). Write failures are logged and otherwise ignored.
pub struct MemoryReport<'a> {
    out: &'a mut dyn Write,
    header_emitted: bool,
    samples: usize,
}

impl<'a> MemoryReport<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self {
            out,
            header_emitted: false,
            samples: 0,
        }
    }

    /// Prints the column header. Only the first call has an effect.
    pub fn emit_header(&mut self) {
        if self.header_emitted {
            warn!("Resource report header already emitted; ignoring repeat");
            return;
        }
        self.header_emitted = true;
        self.write_line(&HEADER.join(","));
    }

    /// Samples the counters, prints them labelled with `label`, and returns
    /// the sample. Emits the header first if nobody has yet.
    pub fn snapshot(&mut self, label: &str) -> ResourceSample {
        if !self.header_emitted {
            self.emit_header();
        }
        let sample = sample(label);
        self.write_line(&sample.to_csv());
        self.samples += 1;
        sample
    }

    /// Number of sample lines printed so far.
    pub fn samples(&self) -> usize {
        self.samples
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            warn!("Failed to write resource report line: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_in_kibibytes() {
        let sample = ResourceSample {
            label: "a.txt".into(),
            allocated_bytes: 2048,
            heap_allocated_bytes: 2047,
            cumulative_allocated_bytes: 10 * 1024 * 1024,
            live_heap_objects: 4096,
            system_reserved_bytes: 1024,
            gc_cycles: 7,
        };
        assert_eq!(sample.to_csv(), "a.txt,2,1,10240,4,1,7");
    }

    #[test]
    fn test_header_then_samples() {
        let mut out = Vec::new();
        let mut report = MemoryReport::new(&mut out);
        report.emit_header();
        report.snapshot("a.txt");
        report.emit_header(); // ignored
        let last = report.snapshot("all.zip");
        assert_eq!(report.samples(), 2);
        assert_eq!(last.label, "all.zip");
        assert_eq!(last.gc_cycles, 0);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#,Alloc,HeapAlloc,TotalAlloc,HeapObjects,Sys,NumGC");
        assert!(lines[1].starts_with("a.txt,"));
        assert!(lines[2].starts_with("all.zip,"));
        assert!(lines[1..].iter().all(|l| l.split(',').count() == 7));
    }

    #[test]
    fn test_snapshot_without_header_emits_it() {
        let mut out = Vec::new();
        MemoryReport::new(&mut out).snapshot("x");
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("#,Alloc,"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_sample_reads_counters() {
        let sample = sample("c.txt");
        assert_eq!(sample.allocated_bytes, sample.heap_allocated_bytes);
        assert!(sample.cumulative_allocated_bytes >= sample.allocated_bytes);
    }
}
