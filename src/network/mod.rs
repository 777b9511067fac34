//! Network Layer: Transfer Boundary
//!
//! Bulk-buffer send/receive di atas TCP. Codec tidak tahu apa-apa soal
//! socket; layer ini hanya memindahkan satu buffer utuh per connection.
//!
//! Fitur:
//! - Explicit transport context (tidak ada global init/shutdown)
//! - Accept loop non-blocking dengan mio, satu thread per connection
//! - TCP_NODELAY dan socket buffer sizing

mod connection;
mod server;
mod transport;

pub use connection::Connection;
pub use server::{Batch, ShutdownHandle, Sink, SinkStats, StatsSnapshot};
pub use transport::{Listener, TransportContext};
