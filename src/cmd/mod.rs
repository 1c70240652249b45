//! CLI command implementations.
//!
//! | Module     | Commands handled            |
//! |------------|-----------------------------|
//! | `project`  | `Init`, `Status`, `Reset`   |
//! | `run`      | `Run`                       |
//! | `inspect`  | `Batches`, `Graph`          |
//! | `config`   | `Config`                    |

pub mod config;
pub mod inspect;
pub mod project;
pub mod run;

pub use config::cmd_config;
pub use inspect::{cmd_batches, cmd_graph};
pub use project::{cmd_init, cmd_reset, cmd_status};
pub use run::cmd_run;
