use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Load CSV files into the target table, one upstream partition per file
    Load {
        #[arg(long, help = "Job file path (JSON)")]
        config: String,

        #[arg(long, help = "Run CREATE TABLE IF NOT EXISTS before loading")]
        create_table: bool,

        #[arg(
            long,
            help = "If specified, writes the JSON report to this file instead of stdout"
        )]
        output: Option<String>,

        #[arg(required = true, help = "Input CSV files")]
        inputs: Vec<String>,
    },
    /// Print the CREATE TABLE statement for the job's columns
    Ddl {
        #[arg(long, help = "Job file path (JSON)")]
        config: String,
    },
    /// Check that the warehouse in the job file is reachable
    TestConn {
        #[arg(long, help = "Job file path (JSON)")]
        config: String,
    },
}
