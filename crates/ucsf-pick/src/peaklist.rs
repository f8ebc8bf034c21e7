//! SPARKY peak list text format.
//!
//! ```text
//! Assignment   w1           w2           Data Height
//!
//!        ?-?   120.512      8.301               152340
//! ```

use crate::refine::RefinedPeak;
use std::fs;
use std::io;
use std::path::Path;

/// Placeholder assignment for an unassigned peak: `?` per axis joined by `-`.
fn assignment_token(ndim: usize) -> String {
    vec!["?"; ndim.max(1)].join("-")
}

/// Render a peak list. `heights`, when given, adds a `Data Height` column
/// with the heights truncated to integers.
pub fn format_peak_list(ndim: usize, peaks: &[Vec<f64>], heights: Option<&[f32]>) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<13}", "Assignment"));
    for i in 1..=ndim {
        out.push_str(&format!("{:<13}", format!("w{}", i)));
    }
    if heights.is_some() {
        out.push_str(&format!("{:<13}", "Data Height"));
    }
    out.push_str("\n\n");

    let token = assignment_token(ndim);
    for (i, peak) in peaks.iter().enumerate() {
        out.push_str(&format!("{:>10}   ", token));
        for shift in peak {
            out.push_str(&format!("{:<13.3}", shift));
        }
        if let Some(h) = heights.and_then(|h| h.get(i)) {
            out.push_str(&format!("{:>13}", *h as i64));
        }
        out.push('\n');
    }
    out
}

pub fn write_peak_list<P: AsRef<Path>>(
    path: P,
    ndim: usize,
    peaks: &[Vec<f64>],
    heights: Option<&[f32]>,
) -> io::Result<()> {
    fs::write(path.as_ref(), format_peak_list(ndim, peaks, heights))?;
    log::info!("Wrote {} peaks to {}", peaks.len(), path.as_ref().display());
    Ok(())
}

/// Write refined peaks with their heights.
pub fn write_refined<P: AsRef<Path>>(path: P, ndim: usize, peaks: &[RefinedPeak]) -> io::Result<()> {
    let shifts: Vec<Vec<f64>> = peaks.iter().map(|p| p.shifts.clone()).collect();
    let heights: Vec<f32> = peaks.iter().map(|p| p.height).collect();
    write_peak_list(path, ndim, &shifts, Some(&heights))
}

/// Parse shift tuples from peak list text. Fields 2 to `ndim + 1` of each
/// line are the shifts; lines where any of them fails to parse (headers,
/// blank lines, truncated rows) are skipped.
pub fn parse_peak_list(text: &str, ndim: usize) -> Vec<Vec<f64>> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < ndim + 1 {
                return None;
            }
            fields[1..=ndim]
                .iter()
                .map(|f| f.parse::<f64>().ok())
                .collect::<Option<Vec<f64>>>()
        })
        .collect()
}

pub fn read_peak_list<P: AsRef<Path>>(path: P, ndim: usize) -> io::Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path.as_ref())?;
    let peaks = parse_peak_list(&text, ndim);
    log::info!("{} peaks read from {}", peaks.len(), path.as_ref().display());
    Ok(peaks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_layout() {
        let text = format_peak_list(2, &[vec![120.5126, 8.3]], Some(&[152340.9]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Assignment   w1           w2           Data Height  ");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "       ?-?   120.513      8.300               152340");
    }

    #[test]
    fn test_format_without_heights() {
        let text = format_peak_list(3, &[vec![1.0, 2.0, 3.0]], None);
        assert!(!text.contains("Data Height"));
        assert!(text.lines().nth(2).unwrap().starts_with("     ?-?-?   1.000"));
    }

    #[test]
    fn test_negative_height_truncated_towards_zero() {
        let text = format_peak_list(1, &[vec![4.0]], Some(&[-7.9]));
        assert!(text.lines().nth(2).unwrap().ends_with("           -7"));
    }

    #[test]
    fn test_peak_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peaks.list");
        let peaks = vec![
            vec![118.23456, 7.98765, 55.5],
            vec![-1.0004, 0.0, 180.12349],
        ];
        write_peak_list(&path, 3, &peaks, Some(&[10.0, -20.0])).unwrap();

        let back = read_peak_list(&path, 3).unwrap();
        assert_eq!(back.len(), peaks.len());
        for (a, b) in back.iter().zip(&peaks) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() <= 0.0005 + 1e-9);
            }
        }
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let text = "Assignment w1 w2\n\n?-? 1.0 2.0\n?-? abc 2.0\n?-? 3.0\nA-B 4.5 5.5 100\n";
        assert_eq!(parse_peak_list(text, 2), vec![vec![1.0, 2.0], vec![4.5, 5.5]]);
    }
}
