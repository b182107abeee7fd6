use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    name = "shipwright",
    version,
    about = "Event-driven release automation bot for GitHub repositories",
    long_about = None
)]
pub struct Args {
    /// Address to bind the webhook server to
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the webhook server to
    #[clap(long, default_value_t = 3000)]
    pub port: u16,

    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Enable verbose output
    #[clap(long)]
    pub verbose: bool,
}

impl Args {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
