use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "windlight")]
#[command(about = "Compile Tailwind-style CSS and optimize it with Lightning CSS")]
pub struct Cli {
    /// Input CSS file [default: built-in `@import "tailwindcss";`]
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file [default: stdout]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base directory for resolving imports and scanning sources
    #[arg(long)]
    pub base: Option<PathBuf>,

    /// Path to config file (windlight.json or windlight.jsonc)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minify the output
    #[arg(long)]
    pub minify: bool,

    /// Skip the Lightning CSS pass
    #[arg(long)]
    pub disable_transforms: bool,

    /// Run the Lightning CSS pass twice
    #[arg(long)]
    pub transform_twice: bool,

    /// Rebuild whenever an input or scanned file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Log pipeline stages to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Whether any flag overrides transform options
    pub fn overrides_options(&self) -> bool {
        self.minify || self.disable_transforms || self.transform_twice
    }
}
