use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the optimizer seeds the injected payload before the first iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializationMethod {
    /// Sample payload bytes from a weighted byte-frequency distribution.
    #[default]
    Weighted,
    /// Uniformly random payload bytes.
    Random,
    /// All-zero payload.
    Zeros,
}

impl InitializationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            InitializationMethod::Weighted => "weighted",
            InitializationMethod::Random => "random",
            InitializationMethod::Zeros => "zeros",
        }
    }
}

impl fmt::Display for InitializationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitializationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted" => Ok(InitializationMethod::Weighted),
            "random" => Ok(InitializationMethod::Random),
            "zeros" => Ok(InitializationMethod::Zeros),
            other => Err(format!(
                "Invalid initialization method '{other}'. Allowed: weighted, random, zeros"
            )),
        }
    }
}

/// Label pair used by the classifier collaborator.
///
/// Passed into every record explicitly so the core carries no global model
/// constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassLabels {
    pub benign: u32,
    pub malicious: u32,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self { benign: 0, malicious: 1 }
    }
}

impl ClassLabels {
    /// The label the search should steer towards: the opposite of the
    /// input's declared class.
    pub fn target_for(&self, input_benign: bool) -> u32 {
        if input_benign {
            self.malicious
        } else {
            self.benign
        }
    }
}

/// Per-sample configuration.
///
/// Every field has a default so partial YAML/JSON configs deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleOptions {
    /// Directory the adversarial copy is written into. Empty means the
    /// current working directory.
    pub output_dir: PathBuf,
    /// Iteration budget handed to the optimizer.
    pub max_iterations: u32,
    /// Number of payload bytes the optimizer may inject.
    pub payload_size: usize,
    pub initialization_method: InitializationMethod,
    /// Tolerance / step parameter for the optimizer.
    pub epsilon: f64,
    /// Declared class of the input: true when the input is benign.
    pub benign: bool,
    /// Replace an existing output file instead of refusing.
    pub allow_overwrite: bool,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::new(),
            max_iterations: 8,
            payload_size: 0,
            initialization_method: InitializationMethod::Weighted,
            epsilon: 1.0,
            benign: false,
            allow_overwrite: false,
        }
    }
}

impl SampleOptions {
    /// Builder-style helper to set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    pub fn with_benign(mut self, benign: bool) -> Self {
        self.benign = benign;
        self
    }
}
