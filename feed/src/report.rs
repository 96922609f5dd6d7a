//! Benchmark result summaries and CSV export.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// CSV header written by [`write_csv`].
pub const CSV_HEADER: &str = "Name,Ticks,Throughput_TPS,Latency_Mean,Latency_P50,Latency_P99,Latency_P999,Latency_Min,Latency_Max,Elapsed_Sec";

/// Outcome of one benchmark run. Latencies are in microseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkResults {
    pub name: String,
    pub ticks_processed: u64,
    /// Ticks per second
    pub throughput_tps: f64,
    pub latency_mean: f64,
    pub latency_p50: f64,
    pub latency_p99: f64,
    pub latency_p999: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub elapsed_seconds: f64,
}

impl fmt::Display for BenchmarkResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(f, "Ticks Processed:   {}", self.ticks_processed)?;
        writeln!(f, "Elapsed Time:      {:.6} seconds", self.elapsed_seconds)?;
        writeln!(f, "Throughput:        {} ticks/sec", self.throughput_tps as u64)?;
        writeln!(f, "Latency Statistics (microseconds):")?;
        writeln!(f, "  Mean:  {:.3} μs", self.latency_mean)?;
        writeln!(f, "  Min:   {:.3} μs", self.latency_min)?;
        writeln!(f, "  P50:   {:.3} μs", self.latency_p50)?;
        writeln!(f, "  P99:   {:.3} μs", self.latency_p99)?;
        writeln!(f, "  P999:  {:.3} μs", self.latency_p999)?;
        write!(f, "  Max:   {:.3} μs", self.latency_max)
    }
}

/// Writes `results` as CSV, header first, one row per result.
pub fn write_csv<W: Write>(mut writer: W, results: &[BenchmarkResults]) -> io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for r in results {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{}",
            csv_field(&r.name),
            r.ticks_processed,
            r.throughput_tps,
            r.latency_mean,
            r.latency_p50,
            r.latency_p99,
            r.latency_p999,
            r.latency_min,
            r.latency_max,
            r.elapsed_seconds
        )?;
    }
    writer.flush()
}

/// Creates (or truncates) `path` and writes `results` to it as CSV.
pub fn export_csv<P: AsRef<Path>>(path: P, results: &[BenchmarkResults]) -> io::Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), results)
}

/// Quotes a field if it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Lock-free vs mutex figures for one workload size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Lock-free throughput divided by mutex throughput.
    pub speedup: f64,
    /// Mutex P99 divided by lock-free P99.
    pub p99_improvement: f64,
}

impl Comparison {
    /// Ratios are 0.0 where the denominator is zero.
    pub fn new(lock_free: &BenchmarkResults, mutex: &BenchmarkResults) -> Self {
        Self {
            speedup: ratio(lock_free.throughput_tps, mutex.throughput_tps),
            p99_improvement: ratio(mutex.latency_p99, lock_free.latency_p99),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Speedup: {:.2}x faster", self.speedup)?;
        write!(f, "  Latency improvement: {:.2}x better P99", self.p99_improvement)
    }
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, tps: f64, p99: f64) -> BenchmarkResults {
        BenchmarkResults {
            name: name.to_string(),
            ticks_processed: 1000,
            throughput_tps: tps,
            latency_mean: 1.5,
            latency_p50: 1.0,
            latency_p99: p99,
            latency_p999: 9.0,
            latency_min: 0.5,
            latency_max: 12.0,
            elapsed_seconds: 0.25,
        }
    }

    #[test]
    fn test_csv_header_and_rows() {
        let results = vec![sample("Lock-Free SPSC (1000)", 4000.0, 2.0), sample("Mutex Queue (1000)", 2000.0, 8.0)];
        let mut out = Vec::new();
        write_csv(&mut out, &results).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "Lock-Free SPSC (1000),1000,4000,1.5,1,2,9,0.5,12,0.25");
        assert_eq!(lines[2], "Mutex Queue (1000),1000,2000,1.5,1,8,9,0.5,12,0.25");
    }

    #[test]
    fn test_csv_quotes_names_with_commas() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_empty_results_has_header_only() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_export_csv_to_file() {
        let path = std::env::temp_dir().join(format!("feed_report_{}.csv", std::process::id()));
        export_csv(&path, &[sample("run", 1.0, 1.0)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(CSV_HEADER));
        assert!(text.contains("run,1000,"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_export_csv_bad_path_errors() {
        let path = std::env::temp_dir().join("feed_no_such_dir").join("x").join("out.csv");
        assert!(export_csv(path, &[]).is_err());
    }

    #[test]
    fn test_display_contains_summary() {
        let text = sample("Lock-Free SPSC (1000)", 4000.0, 2.0).to_string();
        assert!(text.starts_with("=== Lock-Free SPSC (1000) ==="));
        assert!(text.contains("Ticks Processed:   1000"));
        assert!(text.contains("Throughput:        4000 ticks/sec"));
        assert!(text.contains("P99:   2.000 μs"));
    }

    #[test]
    fn test_comparison() {
        let lf = sample("lf", 4000.0, 2.0);
        let mx = sample("mx", 2000.0, 8.0);
        let cmp = Comparison::new(&lf, &mx);
        assert_eq!(cmp.speedup, 2.0);
        assert_eq!(cmp.p99_improvement, 4.0);
        assert!(cmp.to_string().contains("2.00x faster"));
    }

    #[test]
    fn test_comparison_zero_denominator() {
        let lf = sample("lf", 4000.0, 0.0);
        let mx = sample("mx", 0.0, 8.0);
        let cmp = Comparison::new(&lf, &mx);
        assert_eq!(cmp.speedup, 0.0);
        assert_eq!(cmp.p99_improvement, 0.0);
    }
}
