//! Subcommand definitions.

use clap::Subcommand;

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Supervise the IPsec daemon, control server and mesh daemon (default)
    Run,

    /// Exit non-zero unless the mesh daemon, swanctl and charon respond
    Healthcheck,

    /// Show the mesh backend state and peers
    Status,

    /// List loaded IPsec connections
    #[command(alias = "conns")]
    Connections,

    /// List established security associations
    Sas,

    /// Initiate one or more connections
    Start {
        #[arg(required = true, value_name = "CONNECTION")]
        connections: Vec<String>,
    },

    /// Terminate one or more connections
    Stop {
        #[arg(required = true, value_name = "CONNECTION")]
        connections: Vec<String>,
    },

    /// Reload the swanctl configuration file
    Reload,
}
