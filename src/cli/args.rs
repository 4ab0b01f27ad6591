use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "smartlock",
    version,
    about = "Run overlapping tasks against one key through a fair lock arbiter",
    long_about = None
)]
pub struct Args {
    /// Key the tasks contend for
    #[arg(short, long, default_value = "resourceName")]
    pub key: String,

    /// Number of tasks, submitted in order
    #[arg(short = 'n', long, default_value_t = 4)]
    pub tasks: usize,

    /// How long each task is willing to wait (e.g., 500ms, 2s)
    #[arg(short = 'w', long, value_name = "DURATION", default_value = "5s")]
    pub max_wait: String,

    /// How long each task holds the lock once granted
    #[arg(long, value_name = "DURATION", default_value = "1s")]
    pub hold: String,

    /// Lease on the remote lock
    #[arg(short, long, value_name = "DURATION", default_value = "10s")]
    pub lease: String,

    /// Prefix added to the key in the store
    #[arg(long, value_name = "PREFIX", default_value = "")]
    pub prefix: String,

    /// Use the Redis server at URL instead of an in-process store
    #[arg(long, value_name = "URL")]
    pub redis_url: Option<String>,

    /// Verbose output
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,
}
