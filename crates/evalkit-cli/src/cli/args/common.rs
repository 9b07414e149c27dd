//! Shared argument types used across multiple commands.

use clap::ValueEnum;
use evalkit_core::model::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum ValidateOutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

impl ValidateOutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Sarif => "sarif",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(clap::Args, Clone, Debug)]
pub struct ConfigArg {
    /// Root configuration file; `file://` references resolve against its directory
    #[arg(
        short = 'c',
        long,
        env = "EVALKIT_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,
}
