pub use tokio::time::{Sleep, sleep};
