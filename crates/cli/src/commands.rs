use clap::{Args, Subcommand};

#[derive(Subcommand)]
pub enum Commands {
    /// Load newline-delimited JSON rows into the target table
    Load {
        #[command(flatten)]
        options: OptionArgs,

        #[arg(long, help = "Input file with one JSON object per line")]
        input: String,

        #[arg(long, help = "Job identifier; generated when omitted")]
        job_id: Option<String>,

        #[arg(long, help = "Load label; generated from the job id when omitted")]
        label: Option<String>,

        #[arg(
            long,
            default_value_t = 1,
            help = "Writer tasks used when the write does not require a distribution"
        )]
        parallelism: usize,

        #[arg(
            long,
            help = "If specified, writes the JSON summary to this file instead of stdout"
        )]
        output: Option<String>,
    },
    /// Print the resolved load properties and write plan as JSON
    Describe {
        #[command(flatten)]
        options: OptionArgs,

        #[arg(
            long,
            help = "Input file whose first row provides the schema; falls back to the columns option"
        )]
        input: Option<String>,
    },
}

#[derive(Args)]
pub struct OptionArgs {
    #[arg(long, help = "File with one KEY=VALUE option per line")]
    pub options_file: Option<String>,

    #[arg(
        long = "option",
        short = 'o',
        value_name = "KEY=VALUE",
        help = "Connector option; repeatable and applied after the options file"
    )]
    pub options: Vec<String>,
}
