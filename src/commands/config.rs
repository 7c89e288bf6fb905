use anyhow::Result;
use colored::Colorize;

use super::GlobalOpts;

/// Print the effective configuration with secrets redacted. Validation
/// problems are reported after the dump instead of hiding it.
pub fn run(global: &GlobalOpts) -> Result<()> {
    let config = crate::config::read(global.config.as_deref())?;
    print!("{}", serde_yaml::to_string(&config.redacted())?);

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "!!".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
