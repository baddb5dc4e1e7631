use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    /// Path to the settings file; defaults to the build-profile default.
    #[arg(long)]
    pub settings: Option<String>,
}
