//! Results output formatting (text report and CSV).

use crate::error::Result;
use crate::solver::RatingSolution;
use std::io::Write;

/// Write the classic console report.
///
/// Format:
/// ```text
/// Dallas power is 104.25
/// Denver power is 95.75
///
/// Jacobi's method took 12 iterations to complete with an error tolerance of 0.05
/// ```
pub fn write_report<W: Write>(names: &[String], solution: &RatingSolution, writer: &mut W) -> Result<()> {
    for (name, rating) in names.iter().zip(&solution.ratings) {
        writeln!(writer, "{} power is {}", name, rating)?;
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "Jacobi's method took {} iterations to complete with an error tolerance of {}",
        solution.rounds, solution.tolerance
    )?;
    Ok(())
}

/// Write ratings as CSV.
///
/// Format:
/// ```csv
/// Team,Rating
/// Dallas,104.25
/// Denver,95.75
/// # rounds,12
/// ```
///
/// Names containing commas or quotes are quoted.
pub fn write_csv<W: Write>(names: &[String], solution: &RatingSolution, writer: &mut W) -> Result<()> {
    writeln!(writer, "Team,Rating")?;
    for (name, rating) in names.iter().zip(&solution.ratings) {
        writeln!(writer, "{},{}", csv_field(name), rating)?;
    }
    writeln!(writer, "# rounds,{}", solution.rounds)?;
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution() -> RatingSolution {
        RatingSolution {
            ratings: vec![104.25, 95.75],
            rounds: 12,
            tolerance: 0.05,
            messages: 0,
        }
    }

    #[test]
    fn report_lists_every_entity_then_rounds() {
        let names = vec!["Dallas".to_string(), "Denver".to_string()];
        let mut out = Vec::new();
        write_report(&names, &solution(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Dallas power is 104.25\nDenver power is 95.75\n\n\
             Jacobi's method took 12 iterations to complete with an error tolerance of 0.05\n"
        );
    }

    #[test]
    fn csv_quotes_awkward_names() {
        let names = vec!["Washington, D.C.".to_string(), "The \"Bolts\"".to_string()];
        let mut out = Vec::new();
        write_csv(&names, &solution(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Team,Rating");
        assert_eq!(lines[1], "\"Washington, D.C.\",104.25");
        assert_eq!(lines[2], "\"The \"\"Bolts\"\"\",95.75");
        assert_eq!(lines[3], "# rounds,12");
    }
}
