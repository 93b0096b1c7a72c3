use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "frag",
    about = "Typed fragments on multi-tenant managed objects: cookbook",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Platform configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create, filter, query, update and delete devices for each tenant
    Inventory(InventoryArgs),
    /// Compare a naive and a tagged round trip of polymorphic fragments
    Serialize(SerializeArgs),
    /// List subscribed tenants and run work for each of them
    Subscriptions(SubscriptionsArgs),
    /// Show the base URL and settings
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InventoryArgs {
    /// Only run for this tenant
    #[arg(short, long)]
    pub tenant: Option<String>,
    /// Manufacturer of the created devices
    #[arg(long, default_value = "Acme Corp")]
    pub manufacturer: String,
    /// Number of devices to create per tenant
    #[arg(long, default_value_t = 3)]
    pub count: usize,
}

#[derive(Args)]
pub struct SerializeArgs {
    /// Also decode a payload whose element type was never registered
    #[arg(long)]
    pub show_rejection: bool,
    /// Print the encoded payloads
    #[arg(long)]
    pub payloads: bool,
}

#[derive(Args)]
pub struct SubscriptionsArgs {
    /// Run each tenant on its own thread
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Show a single setting
    pub name: Option<String>,
}
