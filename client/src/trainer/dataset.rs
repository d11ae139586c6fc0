use std::path::Path;

use ndarray::Array1;

use super::TrainerErr;

type Result<T> = std::result::Result<T, TrainerErr>;

/// A labeled dataset held fully in memory.
///
/// Loaded from a directory with one subdirectory per class, each holding
/// plain-text files of whitespace- or comma-separated floats, one sample
/// per file. Class indices follow the subdirectories' name order, and
/// labels are one-hot over them.
pub struct Dataset {
    pub samples: Vec<(Array1<f32>, Array1<f32>)>,
}

impl Dataset {
    pub fn load(dir: &Path, input_len: usize, classes: usize) -> Result<Self> {
        let mut class_dirs = Vec::new();
        for entry in read_dir(dir)? {
            let entry = entry.map_err(io_err)?;
            if entry.path().is_dir() {
                class_dirs.push(entry.path());
            }
        }
        class_dirs.sort();

        if class_dirs.len() != classes {
            return Err(TrainerErr::new(format!(
                "dataset has {} class directories, the model expects {classes}",
                class_dirs.len()
            )));
        }

        let mut samples = Vec::new();
        for (class_idx, class_dir) in class_dirs.iter().enumerate() {
            let mut label = Array1::zeros(classes);
            label[class_idx] = 1.0;

            let mut files = Vec::new();
            for entry in read_dir(class_dir)? {
                let entry = entry.map_err(io_err)?;
                if entry.path().is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();

            for file in files {
                let text = std::fs::read_to_string(&file).map_err(io_err)?;
                let values = parse_sample(&text, input_len, &file.display().to_string())?;
                samples.push((Array1::from_vec(values), label.clone()));
            }
        }

        if samples.is_empty() {
            return Err(TrainerErr::new("dataset contains no samples"));
        }

        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

fn read_dir(dir: &Path) -> Result<std::fs::ReadDir> {
    std::fs::read_dir(dir)
        .map_err(|e| TrainerErr::new(format!("cannot read dataset dir {}: {e}", dir.display())))
}

fn io_err(e: std::io::Error) -> TrainerErr {
    TrainerErr::new(format!("dataset io error: {e}"))
}

fn parse_sample(text: &str, input_len: usize, name: &str) -> Result<Vec<f32>> {
    let values: Vec<f32> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .map_err(|_| TrainerErr::new(format!("bad number {s:?} in sample {name}")))
        })
        .collect::<Result<_>>()?;

    if values.len() != input_len {
        return Err(TrainerErr::new(format!(
            "sample {name} has {} values, the model expects {input_len}",
            values.len()
        )));
    }

    Ok(values)
}
