//! # photo-catalog CLI
//!
//! Command-line harness for the parallel job execution core.
//!
//! ## Usage
//! ```bash
//! photo-catalog init --name vacation --dir ~/Photos
//! photo-catalog submit scan --catalog <id> --watch
//! ```

mod cli;

use photo_catalog_jobs::Result;

fn main() -> Result<()> {
    cli::run()
}
