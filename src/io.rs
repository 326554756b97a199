use crate::error::ParameterError;
use colored::*;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DATA_PATH: &str = "./data";

pub const PRE_PROCESSING_PATH: &str = "./pre_processing";

pub const CASE_SETUP_FILE: &str = "case_setup.jou";

pub const POST_PROCESSING_PATH: &str = "./post_processing";

pub const PRESSURE_FILE: &str = "pressure.dat";

pub const VELOCITY_FILE: &str = "velocity.dat";

pub const RESIDUALS_FILE: &str = "residuals.dat";

pub const RESIDUALS_GRAPH_FILE: &str = "gr_residuals.gp";

pub const BENCHMARK_FILE: &str = "benchmark_elapsed_time.dat";

#[derive(Clone, Debug, PartialEq)]
pub enum WriteDataMode {
    Frequency(usize),

    ListOfSteps(Vec<usize>),
}

impl WriteDataMode {
    pub fn is_output_step(&self, time_step: usize) -> bool {
        match self {
            WriteDataMode::Frequency(n) => time_step % n == 0,
            WriteDataMode::ListOfSteps(list) => time_step == 0 || list.contains(&time_step),
        }
    }
}

impl FromStr for WriteDataMode {
    type Err = ParameterError;

    /// `frequency <n>` or `list <step> <step> ...`.
    fn from_str(mode: &str) -> Result<Self, ParameterError> {
        let invalid = || ParameterError::InvalidValue {
            key: "write_data_mode".to_string(),
            value: mode.to_string(),
        };
        let mut words = mode.split_whitespace();
        match words.next() {
            Some("frequency") => {
                let frequency = words
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|&n| n > 0)
                    .ok_or_else(invalid)?;
                Ok(WriteDataMode::Frequency(frequency))
            }
            Some("list") => {
                let list = words
                    .map(|step| step.parse::<usize>())
                    .collect::<Result<Vec<usize>, _>>()
                    .map_err(|_| invalid())?;
                Ok(WriteDataMode::ListOfSteps(list))
            }
            _ => Err(invalid()),
        }
    }
}

pub fn create_case_directories() -> io::Result<()> {
    for path_str in [DATA_PATH, PRE_PROCESSING_PATH, POST_PROCESSING_PATH] {
        let path = Path::new(path_str);
        if !path.exists() {
            println!("Creating the {} path.\n", path_str.yellow().bold());
            fs::create_dir_all(path)?;
        } else {
            println!("The {} path already exists.\n", path_str.yellow().bold());
        }
    }
    Ok(())
}

pub fn read_case_setup() -> io::Result<HashMap<String, String>> {
    let path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(extract_parameters(&contents))
}

pub fn write_case_setup(contents: &str) -> io::Result<()> {
    let path = Path::new(PRE_PROCESSING_PATH).join(CASE_SETUP_FILE);
    println!(
        "Writing the default case setup file: {}.\n",
        path.display().to_string().yellow().bold()
    );
    let mut file = File::create(path)?;
    write!(file, "{contents}")?;
    Ok(())
}

/// `key = value` lines; `#` starts a comment line.
pub fn extract_parameters(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect::<HashMap<String, String>>()
}

/// Appends one `step value value ...` row, writing the header on step 0.
pub fn append_table_row(
    path: &Path,
    time_step: usize,
    columns: &[(&str, f64)],
) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if time_step == 0 {
        write!(file, "{:>8}", "step")?;
        for (name, _) in columns {
            write!(file, " {:>16}", name)?;
        }
        writeln!(file)?;
    }
    write!(file, "{:>8}", time_step)?;
    for (_, value) in columns {
        write!(file, " {:>16.8e}", value)?;
    }
    writeln!(file)?;
    Ok(())
}

pub fn write_inside_loop_elapsed_time(
    elapsed_times: &[(&str, Duration)],
    time_step: usize,
) -> io::Result<()> {
    let path = Path::new(POST_PROCESSING_PATH).join(BENCHMARK_FILE);
    let columns: Vec<(&str, f64)> = elapsed_times
        .iter()
        .map(|(key, value)| (*key, value.as_secs_f64()))
        .collect();
    append_table_row(&path, time_step, &columns)
}
