//! Job backlog loading.
//!
//! The backlog is an externally supplied ordered text file with one
//! argument string per line. The dispatcher does not validate content
//! beyond non-emptiness: blank lines are skipped, everything else is
//! handed to the interpreter verbatim.

use std::path::Path;

use gpuq_core::{DispatchConfig, DispatchError, DispatchResult, JobSpec};

/// Read the ordered job backlog from a file
pub fn load_jobs(path: &Path, config: &DispatchConfig) -> DispatchResult<Vec<JobSpec>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DispatchError::Config(format!("Failed to read jobs file: {}", e)))?;
    Ok(parse_jobs(&content, config))
}

/// Build job specs from backlog content, composing each line with the
/// configured interpreter and entrypoint
pub fn parse_jobs(content: &str, config: &DispatchConfig) -> Vec<JobSpec> {
    let interpreter = config.interpreter.display().to_string();

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let args = match &config.entrypoint {
                Some(entrypoint) => format!("{} {}", entrypoint.display(), line),
                None => line.to_string(),
            };
            JobSpec::new(format!("job-{}", index), interpreter.as_str(), args)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_composes_entrypoint() {
        let config = DispatchConfig {
            interpreter: PathBuf::from("python3"),
            entrypoint: Some(PathBuf::from("train.py")),
            ..DispatchConfig::default()
        };

        let jobs = parse_jobs("--lr 0.1\n--lr 0.01\n", &config);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "job-0");
        assert_eq!(jobs[0].program, "python3");
        assert_eq!(jobs[0].args, "train.py --lr 0.1");
        assert_eq!(jobs[1].args, "train.py --lr 0.01");
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let config = DispatchConfig::default();
        let jobs = parse_jobs("--lr 0.1\n\n   \n--lr 0.01\n", &config);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].name, "job-1");
    }

    #[test]
    fn test_parse_without_entrypoint() {
        let config = DispatchConfig::default();
        let jobs = parse_jobs("run.py --seed 7", &config);
        assert_eq!(jobs[0].args, "run.py --seed 7");
    }

    #[test]
    fn test_parse_empty_content() {
        let config = DispatchConfig::default();
        assert!(parse_jobs("", &config).is_empty());
    }
}
