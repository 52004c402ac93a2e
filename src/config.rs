//! Engine configuration (spec.md §6, SPEC_FULL.md §A.3): the recognized UCI
//! option table, grounded in the teacher's `core/config.rs` layering of
//! "one struct holds every tunable, one function validates and applies a
//! single named option."
//!
//! `Config::set` is the *only* configuration entry point the core exposes;
//! the driver (out of scope) is responsible for turning `setoption` lines
//! into `(name, value)` pairs.

use crate::error::InvalidInput;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Transposition table size, MiB.
    pub hash_mb: usize,
    /// Worker count: 1 == main thread only, N == main + (N-1) helpers.
    pub threads: usize,
    pub multi_pv: usize,
    /// Milliseconds subtracted from time-control budgets (spec.md §6).
    pub move_overhead_ms: u64,
    pub ponder: bool,
    pub chess960: bool,
    /// White-relative draw-score offset, centipawns.
    pub contempt: i32,
    pub normalize_score: bool,
    pub show_wdl: bool,
    /// `None` means "use the embedded default network."
    pub eval_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hash_mb: 16,
            threads: 1,
            multi_pv: 1,
            move_overhead_ms: 10,
            ponder: false,
            chess960: false,
            contempt: 0,
            normalize_score: false,
            show_wdl: false,
            eval_file: None,
        }
    }
}

pub const MAX_HASH_MB: usize = 1 << 20; // 1 TiB ceiling, matches typical UCI spin bounds
pub const MAX_THREADS: usize = 1024;
pub const MAX_MULTI_PV: usize = 256;

impl Config {
    /// Applies one named option (spec.md §6's table). Unknown option names
    /// and out-of-range values are `InvalidInput`, never a panic.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), InvalidInput> {
        match name {
            "Hash" => {
                self.hash_mb = parse_range(value, 1, MAX_HASH_MB, name)?;
            }
            "Threads" => {
                self.threads = parse_range(value, 1, MAX_THREADS, name)?;
            }
            "MultiPV" => {
                self.multi_pv = parse_range(value, 1, MAX_MULTI_PV, name)?;
            }
            "MoveOverhead" => {
                self.move_overhead_ms = parse_range(value, 0, 10_000, name)?;
            }
            "Ponder" => {
                self.ponder = parse_bool(value, name)?;
            }
            "UCI_Chess960" => {
                self.chess960 = parse_bool(value, name)?;
            }
            "Contempt" => {
                self.contempt = parse_range::<i64>(value, -10_000, 10_000, name)? as i32;
            }
            "NormalizeScore" => {
                self.normalize_score = parse_bool(value, name)?;
            }
            "UCI_ShowWDL" => {
                self.show_wdl = parse_bool(value, name)?;
            }
            "EvalFile" => {
                self.eval_file = if value.is_empty() || value.eq_ignore_ascii_case("<empty>") {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            other => {
                return Err(InvalidInput::InvalidOption(format!("unrecognized option {other:?}")));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str, name: &str) -> Result<bool, InvalidInput> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(InvalidInput::InvalidOption(format!(
            "{name} expects true/false, got {value:?}"
        ))),
    }
}

fn parse_range<T>(value: &str, lo: T, hi: T, name: &str) -> Result<T, InvalidInput>
where
    T: std::str::FromStr + PartialOrd + Copy + std::fmt::Display,
{
    let parsed: T = value
        .parse()
        .map_err(|_| InvalidInput::InvalidOption(format!("{name} expects a number, got {value:?}")))?;
    if parsed < lo || parsed > hi {
        return Err(InvalidInput::InvalidOption(format!(
            "{name} value {parsed} out of range [{lo}, {hi}]"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_single_threaded_single_pv() {
        let cfg = Config::default();
        assert_eq!(cfg.threads, 1);
        assert_eq!(cfg.multi_pv, 1);
        assert!(cfg.eval_file.is_none());
    }

    #[test]
    fn hash_rejects_zero() {
        let mut cfg = Config::default();
        assert!(cfg.set("Hash", "0").is_err());
    }

    #[test]
    fn hash_applies_valid_value() {
        let mut cfg = Config::default();
        cfg.set("Hash", "256").unwrap();
        assert_eq!(cfg.hash_mb, 256);
    }

    #[test]
    fn unknown_option_is_invalid_input() {
        let mut cfg = Config::default();
        assert_eq!(
            cfg.set("NotARealOption", "1"),
            Err(InvalidInput::InvalidOption(
                "unrecognized option \"NotARealOption\"".to_string()
            ))
        );
    }

    #[test]
    fn contempt_accepts_negative_values() {
        let mut cfg = Config::default();
        cfg.set("Contempt", "-25").unwrap();
        assert_eq!(cfg.contempt, -25);
    }

    #[test]
    fn eval_file_none_resets_to_embedded_default() {
        let mut cfg = Config::default();
        cfg.set("EvalFile", "weights.nnue").unwrap();
        cfg.set("EvalFile", "<empty>").unwrap();
        assert!(cfg.eval_file.is_none());
    }
}
