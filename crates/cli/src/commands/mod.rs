pub mod history;
pub mod sync;

use clap::Subcommand;
pub use history::HistoryArgs;
pub use sync::SyncArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send every record of a CSV or JSON file to the endpoint in batches.
    ///
    /// Example:
    ///   recsync sync users.csv --endpoint https://api.example.com/import -b 500
    ///   recsync sync events.json -b 100 -c 4 --json
    Sync(SyncArgs),

    /// Show past runs.
    History(HistoryArgs),
}
