//! # vitalwatch-stream
//!
//! Block and event-log subscriptions on top of a supervised connection.
//!
//! ```no_run
//! use vitalwatch_rpc::{FailFast, Supervisor, WsConnector};
//! use vitalwatch_stream::EventSubscriber;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let (supervisor, handle) = Supervisor::new(WsConnector::new("ws://localhost:8545"), FailFast);
//! tokio::spawn(supervisor.run());
//!
//! let subscriber = EventSubscriber::new(handle);
//! let _blocks = subscriber
//!     .subscribe_blocks(|n: u64| async move {
//!         println!("block {n}");
//!         Ok::<_, vitalwatch_core::HandlerError>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod parse;
pub mod subscriber;

pub use error::StreamError;
pub use handler::{BlockHandler, LogHandler};
pub use subscriber::{EventSubscriber, Subscription};
