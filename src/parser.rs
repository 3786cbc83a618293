//! Season file parser.
//!
//! Parses the names file and the results file into the season IR.
//!
//! # Supported syntax
//!
//! Names file, one entity per line. Blank lines are skipped and the ordinal
//! of each remaining line is the entity index:
//!
//! ```text
//! Arizona Cardinals
//! Atlanta Falcons
//! ```
//!
//! Results file, one game per line, 1-based entity indices:
//!
//! ```text
//! # home away home_score away_score
//! 1 2 24 17
//! 3 1 10 13
//! -1                      (optional end-of-data sentinel)
//! ```

use std::path::Path;

use nom::character::complete::{i64 as integer, space0, space1};
use nom::combinator::eof;
use nom::IResult;
use nom::Parser;

use crate::error::{RankingError, Result};
use crate::ir::{GameRecord, Season};

/// First field of a results line that ends the data.
const END_OF_DATA: i64 = -1;

/// Read and parse both season files.
///
/// An unreadable file is reported with its path, before anything else runs.
pub fn load(names_path: &Path, results_path: &Path) -> Result<Season> {
    let names = read_input(names_path)?;
    let results = read_input(results_path)?;
    parse(&names, &results)
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        RankingError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot read {}: {}", path.display(), e),
        ))
    })
}

/// Parse names and results text into a `Season`.
pub fn parse(names: &str, results: &str) -> Result<Season> {
    let names = parse_names(names);
    if names.is_empty() {
        return Err(RankingError::Parse("names file lists no entities".into()));
    }
    let games = parse_results(results, names.len())?;
    tracing::debug!(entities = names.len(), games = games.len(), "season parsed");
    Ok(Season { names, games })
}

/// Parse the names file. Each non-blank trimmed line is one name.
pub fn parse_names(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the results file for a season with `n_entities` entities.
///
/// Indices are converted from 1-based to 0-based and range-checked.
pub fn parse_results(input: &str, n_entities: usize) -> Result<Vec<GameRecord>> {
    let mut games = Vec::new();

    for (line_num, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();

        // Skip blank lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Ok((_, first)) = field(line) {
            if first == END_OF_DATA {
                break;
            }
        }

        let (home, away, home_score, away_score) =
            record(line).map_err(|e| parse_err(line_num, raw_line, &e))?;

        let home = entity_index(home, n_entities).map_err(|e| parse_err(line_num, raw_line, &e))?;
        let away = entity_index(away, n_entities).map_err(|e| parse_err(line_num, raw_line, &e))?;
        if home == away {
            return Err(parse_err(line_num, raw_line, "entity plays itself"));
        }

        games.push(GameRecord {
            home,
            away,
            home_score,
            away_score,
        });
    }

    Ok(games)
}

fn parse_err(line_num: usize, raw_line: &str, detail: &str) -> RankingError {
    RankingError::Parse(format!("line {}: {} in: {}", line_num + 1, detail, raw_line))
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

fn field(input: &str) -> IResult<&str, i64> {
    integer(input)
}

/// Parse a line like: home away home_score away_score
fn record(line: &str) -> std::result::Result<(i64, i64, i64, i64), String> {
    let (_, (home, _, away, _, home_score, _, away_score, _, _)) = (
        field, space1, field, space1, field, space1, field, space0, eof,
    )
        .parse(line)
        .map_err(|_| "expected four integers".to_string())?;
    Ok((home, away, home_score, away_score))
}

/// Convert a 1-based index from the file into a 0-based entity id.
fn entity_index(one_based: i64, n_entities: usize) -> std::result::Result<usize, String> {
    if one_based < 1 || one_based as u64 > n_entities as u64 {
        return Err(format!(
            "entity index {} out of range 1..={}",
            one_based, n_entities
        ));
    }
    Ok((one_based - 1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_skip_blank_lines_and_trim() {
        let names = parse_names("Alpha\n\n  Bravo  \nCharlie\n\n");
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn results_convert_to_zero_based() {
        let games = parse_results("1 2 24 17\n3 1 10 13\n", 3).unwrap();
        assert_eq!(
            games,
            vec![
                GameRecord { home: 0, away: 1, home_score: 24, away_score: 17 },
                GameRecord { home: 2, away: 0, home_score: 10, away_score: 13 },
            ]
        );
        assert_eq!(games[0].differential(), 7);
        assert_eq!(games[1].differential(), -3);
    }

    #[test]
    fn results_tolerate_tabs_comments_and_trailing_space() {
        let input = "# home away hs as\n1\t2\t3\t0   \n\n2 1 7 7\n";
        let games = parse_results(input, 2).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].differential(), 0);
    }

    #[test]
    fn sentinel_ends_the_data() {
        let input = "1 2 3 0\n-1\n2 1 99 0\n";
        let games = parse_results(input, 2).unwrap();
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = parse_results("1 5 3 0\n", 4).unwrap_err();
        match err {
            RankingError::Parse(msg) => {
                assert!(msg.contains("line 1"), "{msg}");
                assert!(msg.contains("out of range"), "{msg}");
            }
            other => panic!("expected Parse error, got {:?}", other),
        }
        assert!(parse_results("0 1 3 0\n", 4).is_err());
    }

    #[test]
    fn short_record_is_rejected() {
        let err = parse_results("1 2 3 0\n2 1 3\n", 2).unwrap_err();
        match err {
            RankingError::Parse(msg) => assert!(msg.starts_with("line 2"), "{msg}"),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse_results("1 2 3 0 extra\n", 2).is_err());
    }

    #[test]
    fn self_play_is_rejected() {
        assert!(parse_results("2 2 3 0\n", 2).is_err());
    }

    #[test]
    fn empty_names_file_is_rejected() {
        assert!(matches!(parse("\n\n", "1 2 3 0"), Err(RankingError::Parse(_))));
    }

    #[test]
    fn missing_file_names_the_path() {
        let missing = Path::new("definitely/not/here/teams.dat");
        let err = load(missing, missing).unwrap_err();
        match err {
            RankingError::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
                assert!(e.to_string().contains("teams.dat"));
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
